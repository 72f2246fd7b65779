//! A concrete, buffer-backed segmented memory.

use std::sync::Arc;

use indexmap::IndexMap;
use quarry_arch::{Addr, Architecture};

use crate::config::Limits;
use crate::error::{FaultCause, MappableError, MemoryAccessError};
use crate::mappable::Mappable;
use crate::segment::{Segment, Segmented};
use crate::splitting::Splittable;
use crate::{Memory, RawMemory};

/// A [`Memory`] whose segments are each backed by an owned `Vec<u8>`.
///
/// Grounded on the source project's `BufferMemory`: every testable property
/// in the specification can be exercised against this type without needing
/// a real hardware-backed emulator. Composes [`Segmented`], [`Splittable`],
/// and [`Mappable`] rather than inheriting from a chain of base classes, per
/// the trait-per-capability redesign.
pub struct BufferMemory {
    arch: Arc<Architecture>,
    limits: Limits,
    verbose: bool,
    /// Segments in registration order, each paired with its owned backing
    /// bytes.
    segments: IndexMap<String, (Segment, Vec<u8>)>,
}

impl BufferMemory {
    /// Constructs an empty memory for `arch`, using [`Limits::default`].
    #[must_use]
    pub fn new(arch: Arc<Architecture>) -> Self {
        Self {
            arch,
            limits: Limits::default(),
            verbose: false,
            segments: IndexMap::new(),
        }
    }

    /// Overrides the configuration limits used for allocation, chunking,
    /// and string scans.
    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Enables `trace`-level logging of richer operations (assembled code,
    /// verbose reads/writes).
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Copies every segment (name, range, permissions, and contents) from
    /// `other` into this memory.
    ///
    /// Grounded on the source project's `MappableMemory.load_memory`.
    ///
    /// # Errors
    ///
    /// Fails with [`MappableError`] if any of `other`'s segment names or
    /// ranges collide with ones already present in this memory.
    pub fn load_memory(&mut self, other: &BufferMemory) -> Result<(), MappableError> {
        for (segment, data) in other.segments.values() {
            self.insert(segment.clone())?;
            self.write_segment_bytes(segment.name(), data)?;
        }
        Ok(())
    }
}

impl Segmented for BufferMemory {
    fn by_name(&self, name: &str) -> Option<&Segment> {
        self.segments.get(name).map(|(seg, _)| seg)
    }

    fn by_address(&self, address: Addr) -> Option<&Segment> {
        self.segments
            .values()
            .map(|(seg, _)| seg)
            .find(|seg| seg.contains_address(address))
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &Segment> + '_> {
        Box::new(self.segments.values().map(|(seg, _)| seg))
    }

    fn len(&self) -> usize {
        self.segments.len()
    }
}

impl Splittable for BufferMemory {
    fn read_segment(&self, segment: &Segment, offset: u64, size: u64) -> Result<Vec<u8>, MemoryAccessError> {
        let (_, data) = self.segments.get(segment.name()).expect("segment came from this memory");
        let start = offset as usize;
        let end = start + size as usize;
        data.get(start..end)
            .map(<[u8]>::to_vec)
            .ok_or(MemoryAccessError::Fault {
                address: segment.start() + offset,
                size,
                cause: FaultCause::Unmapped,
            })
    }

    fn write_segment(&mut self, segment: &Segment, offset: u64, data: &[u8]) -> Result<(), MemoryAccessError> {
        let (_, buf) = self.segments.get_mut(segment.name()).expect("segment came from this memory");
        let start = offset as usize;
        let end = start + data.len();
        if end > buf.len() {
            return Err(MemoryAccessError::Fault {
                address: segment.start() + offset,
                size: data.len() as u64,
                cause: FaultCause::Unmapped,
            });
        }
        buf[start..end].copy_from_slice(data);
        Ok(())
    }
}

impl RawMemory for BufferMemory {
    fn raw_read(&self, address: Addr, size: u64) -> Result<Vec<u8>, MemoryAccessError> {
        self.split_read(address, size)
    }

    fn raw_write(&mut self, address: Addr, data: &[u8]) -> Result<(), MemoryAccessError> {
        self.split_write(address, data)
    }
}

impl Memory for BufferMemory {
    fn arch(&self) -> &Arc<Architecture> {
        &self.arch
    }

    fn limits(&self) -> &Limits {
        &self.limits
    }

    fn verbose(&self) -> bool {
        self.verbose
    }
}

impl Mappable for BufferMemory {
    fn limits(&self) -> &Limits {
        &self.limits
    }

    fn insert(&mut self, segment: Segment) -> Result<(), MappableError> {
        if self.segments.contains_key(segment.name()) {
            return Err(MappableError::DuplicateName(segment.name().to_string()));
        }
        if let Some((existing, _)) = self
            .segments
            .values()
            .find(|(seg, _)| seg.adjacent(&segment) && seg.start() != segment.end() && segment.start() != seg.end())
        {
            return Err(MappableError::Overlap {
                start: segment.start(),
                end: segment.end(),
                existing: existing.name().to_string(),
            });
        }
        let data = vec![0u8; segment.size() as usize];
        self.segments.insert(segment.name().to_string(), (segment, data));
        Ok(())
    }

    fn write_segment_bytes(&mut self, name: &str, data: &[u8]) -> Result<(), MappableError> {
        let (_, buf) = self
            .segments
            .get_mut(name)
            .ok_or_else(|| MappableError::NoSuchSegment(name.to_string()))?;
        buf[..data.len()].copy_from_slice(data);
        Ok(())
    }
}
