//! Reads and writes that may straddle two or more adjacent segments.

use quarry_arch::Addr;

use crate::error::{FaultCause, MemoryAccessError};
use crate::segment::{Segment, Segmented};

/// A memory backend that keeps each segment's bytes in a separately
/// addressable store, and can therefore service an access spanning several
/// adjacent segments by splitting it into one sub-access per segment.
///
/// Grounded on the source project's `SplittingSegmentMemory` mixin: writes
/// plan the full walk across segments before touching any of them, so a
/// write that fails partway through (because it runs off the end of the
/// last mapped segment) never leaves some segments written and others not.
pub trait Splittable: Segmented {
    /// Reads `size` bytes from the segment `segment`, starting `offset`
    /// bytes into it.
    ///
    /// # Errors
    ///
    /// Fails if the requested sub-range is not readable.
    fn read_segment(&self, segment: &Segment, offset: u64, size: u64) -> Result<Vec<u8>, MemoryAccessError>;

    /// Writes `data` into the segment `segment`, starting `offset` bytes
    /// into it.
    ///
    /// # Errors
    ///
    /// Fails if the requested sub-range is not writable.
    fn write_segment(&mut self, segment: &Segment, offset: u64, data: &[u8]) -> Result<(), MemoryAccessError>;

    /// Reads `size` bytes starting at `address`, splitting the access
    /// across as many adjacent segments as necessary.
    ///
    /// # Errors
    ///
    /// Fails with [`MemoryAccessError::Fault`] if any byte in the range is
    /// not covered by a mapped segment.
    fn split_read(&self, address: Addr, size: u64) -> Result<Vec<u8>, MemoryAccessError> {
        let plan = self.plan(address, size)?;
        let mut out = Vec::with_capacity(size as usize);
        for (segment, offset, len) in plan {
            out.extend(self.read_segment(&segment, offset, len)?);
        }
        Ok(out)
    }

    /// Writes `data` starting at `address`, splitting the access across as
    /// many adjacent segments as necessary.
    ///
    /// The full plan of `(segment, offset, length)` sub-writes is computed
    /// up front; if any part of `[address, address + data.len())` is
    /// unmapped, no segment is written at all.
    ///
    /// # Errors
    ///
    /// Fails with [`MemoryAccessError::Fault`] if any byte in the range is
    /// not covered by a mapped segment.
    fn split_write(&mut self, address: Addr, data: &[u8]) -> Result<(), MemoryAccessError> {
        let plan = self.plan(address, data.len() as u64)?;
        let mut consumed = 0usize;
        for (segment, offset, len) in plan {
            let chunk = &data[consumed..consumed + len as usize];
            self.write_segment(&segment, offset, chunk)?;
            consumed += len as usize;
        }
        Ok(())
    }

    /// Computes the ordered list of `(segment, offset-in-segment, length)`
    /// sub-accesses covering `[address, address + size)`.
    ///
    /// # Errors
    ///
    /// Fails with [`MemoryAccessError::Fault`] if the range is not
    /// contiguously covered by mapped segments.
    fn plan(&self, address: Addr, size: u64) -> Result<Vec<(Segment, u64, u64)>, MemoryAccessError> {
        let mut plan = Vec::new();
        let mut cursor = address;
        let end = address + size;
        while cursor < end {
            let segment = self.by_address(cursor).ok_or(MemoryAccessError::Fault {
                address: cursor,
                size: end - cursor,
                cause: FaultCause::Unmapped,
            })?;
            let offset = cursor - segment.start();
            let available = segment.end() - cursor;
            let take = available.min(end - cursor);
            plan.push((segment.clone(), offset, take));
            cursor += take;
        }
        Ok(plan)
    }
}
