//! Segments: named, permissioned ranges of guest address space.

use quarry_arch::{Addr, AccessType};

/// A named range of guest address space and the permissions it carries.
///
/// `Segment` is a plain value type: unlike the Python original it holds no
/// reference back to the memory that owns it. Operations that conceptually
/// belong to a segment (read, write, search, disassemble, dump to file) are
/// instead methods on the owning [`Segmented`]/`Memory` implementor that
/// take a segment name or a `&Segment`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Segment {
    name: String,
    start: Addr,
    size: u64,
    perms: AccessType,
}

impl Segment {
    /// Constructs a new segment description.
    #[must_use]
    pub fn new(name: impl Into<String>, start: Addr, size: u64, perms: AccessType) -> Self {
        Self {
            name: name.into(),
            start,
            size,
            perms,
        }
    }

    /// The segment's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Address of the first byte in the segment.
    #[must_use]
    pub fn start(&self) -> Addr {
        self.start
    }

    /// Size of the segment, in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Address one past the last byte in the segment.
    #[must_use]
    pub fn end(&self) -> Addr {
        self.start + self.size
    }

    /// Access permissions granted within the segment.
    #[must_use]
    pub fn perms(&self) -> AccessType {
        self.perms
    }

    /// Whether `address` falls within `[start, end)`.
    #[must_use]
    pub fn contains_address(&self, address: Addr) -> bool {
        (self.start..self.end()).contains(&address)
    }

    /// Whether `[start, start + size)` falls entirely within this segment.
    #[must_use]
    pub fn contains_range(&self, start: Addr, size: u64) -> bool {
        size == 0 && start == self.end() || (start >= self.start && start + size <= self.end())
    }

    /// Whether this segment overlaps or is immediately adjacent to `other`
    /// (touching ranges, e.g. `[0, 0x10)` and `[0x10, 0x20)`, count as
    /// adjacent).
    #[must_use]
    pub fn adjacent(&self, other: &Segment) -> bool {
        self.start <= other.end() && other.start <= self.end()
    }
}

/// Read-only access to a collection of non-overlapping, named segments.
pub trait Segmented {
    /// Looks up a segment by name.
    fn by_name(&self, name: &str) -> Option<&Segment>;

    /// Looks up the segment containing `address`, if any.
    fn by_address(&self, address: Addr) -> Option<&Segment>;

    /// Iterates over all segments whose permissions contain `perms`.
    fn with_perms(&self, perms: AccessType) -> Box<dyn Iterator<Item = &Segment> + '_> {
        Box::new(self.iter().filter(move |seg| seg.perms().contains(perms)))
    }

    /// Whether any segment contains `address`.
    fn contains(&self, address: Addr) -> bool {
        self.by_address(address).is_some()
    }

    /// Iterates over all segments.
    fn iter(&self) -> Box<dyn Iterator<Item = &Segment> + '_>;

    /// Number of segments.
    fn len(&self) -> usize {
        self.iter().count()
    }

    /// Whether there are no segments.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_address_is_half_open() {
        let seg = Segment::new("text", 0x1000, 0x10, AccessType::RX);
        assert!(seg.contains_address(0x1000));
        assert!(seg.contains_address(0x100f));
        assert!(!seg.contains_address(0x1010));
    }

    #[test]
    fn adjacent_detects_touching_ranges() {
        let a = Segment::new("a", 0, 0x10, AccessType::RW);
        let b = Segment::new("b", 0x10, 0x10, AccessType::RW);
        let c = Segment::new("c", 0x20, 0x10, AccessType::RW);
        assert!(a.adjacent(&b));
        assert!(!a.adjacent(&c));
    }

    #[test]
    fn contains_range_rejects_partial_overlap() {
        let seg = Segment::new("text", 0x1000, 0x10, AccessType::RX);
        assert!(seg.contains_range(0x1000, 0x10));
        assert!(seg.contains_range(0x1004, 0x4));
        assert!(!seg.contains_range(0x1008, 0x10));
    }
}
