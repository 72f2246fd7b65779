//! Creating and populating segments.

use quarry_arch::{Addr, AccessType};
use thiserror::Error;

use crate::config::Limits;
use crate::error::MappableError;
use crate::segment::{Segment, Segmented};

/// A memory that can have new segments created in it.
///
/// Implementors provide [`Mappable::insert`] (the raw "add a segment, or
/// fail if it collides with an existing one" primitive, grounded on the
/// source project's `DictSegmentMemory._add_segment`); everything else —
/// loading a byte buffer or file into a freshly mapped segment, or finding
/// free space for an anonymous allocation — is a default method built on
/// top of it and [`Mappable::write_segment_bytes`].
pub trait Mappable: Segmented {
    /// Configuration limits (page size, allocation placement) in effect.
    fn limits(&self) -> &Limits;

    /// Adds `segment` to this memory.
    ///
    /// # Errors
    ///
    /// Fails with [`MappableError::DuplicateName`] if a segment with the
    /// same name already exists, or [`MappableError::Overlap`] if the new
    /// segment's range overlaps an existing one.
    fn insert(&mut self, segment: Segment) -> Result<(), MappableError>;

    /// Writes `data` into the already-mapped segment `name`, starting at
    /// its first byte.
    ///
    /// # Errors
    ///
    /// Fails if `name` is not a mapped segment, or if `data` does not fit
    /// within it.
    fn write_segment_bytes(&mut self, name: &str, data: &[u8]) -> Result<(), MappableError>;

    /// Maps a new, zero-filled segment covering exactly `[start, start +
    /// size)`.
    ///
    /// Grounded on the source project's `BufferMemory.map`, which maps the
    /// requested range verbatim; only an engine-backed memory (the emulator)
    /// needs page-aligned mappings, and overrides this method to enforce
    /// that (spec section 4.4's last paragraph).
    ///
    /// # Errors
    ///
    /// Fails with [`MappableError::DuplicateName`] or
    /// [`MappableError::Overlap`] as per [`Mappable::insert`].
    fn map(
        &mut self,
        name: impl Into<String>,
        start: Addr,
        size: u64,
        perms: AccessType,
    ) -> Result<Segment, MappableError> {
        let segment = Segment::new(name, start, size, perms);
        self.insert(segment.clone())?;
        Ok(segment)
    }

    /// Maps a new segment sized exactly to `data` and writes `data` into
    /// it.
    ///
    /// # Errors
    ///
    /// Fails as per [`Mappable::map`], or if the write afterwards fails.
    fn load(
        &mut self,
        name: impl Into<String>,
        start: Addr,
        data: &[u8],
        perms: AccessType,
    ) -> Result<Segment, MappableError> {
        let name = name.into();
        let segment = Segment::new(name.clone(), start, data.len() as u64, perms);
        self.insert(segment.clone())?;
        self.write_segment_bytes(&name, data)?;
        Ok(segment)
    }

    /// Reads `path` into memory and maps it exactly like [`Mappable::load`].
    ///
    /// # Errors
    ///
    /// Fails with [`LoadFileError::Io`] if `path` cannot be read, or with
    /// [`LoadFileError::Map`] as per [`Mappable::load`].
    fn load_file(
        &mut self,
        name: impl Into<String>,
        start: Addr,
        path: &std::path::Path,
        perms: AccessType,
    ) -> Result<Segment, LoadFileError> {
        let data = std::fs::read(path)?;
        Ok(self.load(name, start, &data, perms)?)
    }

    /// Picks an address at or above [`Limits::min_alloc_address`] and past
    /// the end of every already-mapped segment, rounds it up to
    /// [`Limits::alloc_round_size`], and maps `size` bytes there.
    ///
    /// Grounded on the source project's `MappableMemory.allocate`: the
    /// candidate is always past the highest mapped segment's end, never a
    /// gap between two earlier ones, so this never reuses a hole freed by
    /// an unmapped segment.
    ///
    /// # Errors
    ///
    /// Fails as per [`Mappable::map`] in the unexpected case that the chosen
    /// address collides after all.
    fn allocate(&mut self, name: impl Into<String>, size: u64, perms: AccessType) -> Result<Segment, MappableError> {
        let min_address = self.limits().min_alloc_address;
        let max_end = self.iter().map(Segment::end).max().unwrap_or(0);
        let address = self.limits().round_alloc(min_address.max(max_end));
        self.map(name, address, size, perms)
    }
}

/// Failure to load a file into a freshly mapped segment.
#[derive(Debug, Error)]
pub enum LoadFileError {
    /// {0}
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// {0}
    #[error(transparent)]
    Map(#[from] MappableError),
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dict {
        segments: Vec<Segment>,
        data: std::collections::HashMap<String, Vec<u8>>,
        limits: Limits,
    }

    impl Dict {
        fn new() -> Self {
            Self {
                segments: Vec::new(),
                data: std::collections::HashMap::new(),
                limits: Limits::default(),
            }
        }
    }

    impl Segmented for Dict {
        fn by_name(&self, name: &str) -> Option<&Segment> {
            self.segments.iter().find(|s| s.name() == name)
        }

        fn by_address(&self, address: Addr) -> Option<&Segment> {
            self.segments.iter().find(|s| s.contains_address(address))
        }

        fn iter(&self) -> Box<dyn Iterator<Item = &Segment> + '_> {
            Box::new(self.segments.iter())
        }
    }

    impl Mappable for Dict {
        fn limits(&self) -> &Limits {
            &self.limits
        }

        fn insert(&mut self, segment: Segment) -> Result<(), MappableError> {
            if self.by_name(segment.name()).is_some() {
                return Err(MappableError::DuplicateName(segment.name().to_string()));
            }
            if let Some(existing) = self.segments.iter().find(|s| s.adjacent(&segment) && s.start() != segment.end() && segment.start() != s.end()) {
                return Err(MappableError::Overlap {
                    start: segment.start(),
                    end: segment.end(),
                    existing: existing.name().to_string(),
                });
            }
            self.data.insert(segment.name().to_string(), vec![0; segment.size() as usize]);
            self.segments.push(segment);
            Ok(())
        }

        fn write_segment_bytes(&mut self, name: &str, data: &[u8]) -> Result<(), MappableError> {
            let buf = self
                .data
                .get_mut(name)
                .ok_or_else(|| MappableError::NoSuchSegment(name.to_string()))?;
            buf[..data.len()].copy_from_slice(data);
            Ok(())
        }
    }

    #[test]
    fn map_covers_the_exact_requested_range() {
        let mut mem = Dict::new();
        let seg = mem.map("a", 0x1800, 0x100, AccessType::RW).unwrap();
        assert_eq!(seg.start(), 0x1800);
        assert_eq!(seg.size(), 0x100);
    }

    #[test]
    fn allocate_never_reuses_a_hole() {
        let mut mem = Dict::new();
        mem.map("a", 0x1000, 0x10, AccessType::RW).unwrap();
        mem.map("b", 0x5000, 0x10, AccessType::RW).unwrap();
        // A hole exists between 0x1010 and 0x5000, but allocate always
        // places new segments past the highest existing end.
        let seg = mem.allocate("c", 0x10, AccessType::RW).unwrap();
        assert_eq!(seg.start(), 0x6000);
    }

    #[test]
    fn load_writes_the_data() {
        let mut mem = Dict::new();
        mem.load("a", 0x2000, b"hello", AccessType::RW).unwrap();
        assert_eq!(&mem.data["a"][..5], b"hello");
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut mem = Dict::new();
        mem.map("a", 0x1000, 0x10, AccessType::RW).unwrap();
        assert!(matches!(
            mem.map("a", 0x5000, 0x10, AccessType::RW),
            Err(MappableError::DuplicateName(_))
        ));
    }

    #[test]
    fn allocate_places_after_existing_segments() {
        let mut mem = Dict::new();
        mem.map("a", 0x1000, 0x1000, AccessType::RW).unwrap();
        let seg = mem.allocate("b", 0x10, AccessType::RW).unwrap();
        assert_eq!(seg.start(), 0x2000);
    }

    #[test]
    fn allocate_respects_min_alloc_address() {
        let mut mem = Dict::new();
        let seg = mem.allocate("a", 0x10, AccessType::RW).unwrap();
        assert_eq!(seg.start(), mem.limits.min_alloc_address);
    }
}
