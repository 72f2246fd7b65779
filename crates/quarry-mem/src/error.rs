//! Error taxonomy for memory access and segment management.

use quarry_arch::Addr;
use thiserror::Error;

/// Why a memory access could not be completed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FaultCause {
    /// No segment covers the requested range.
    Unmapped,
    /// A segment covers the range, but lacks the permission requested.
    Protected,
}

/// A raw or segmented memory access failed.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum MemoryAccessError {
    /// access at {address:#x} (size {size}) is out of range: {cause:?}
    #[error("access at {address:#x} (size {size}) is out of range: {cause:?}")]
    Fault {
        /// Address the access started at.
        address: Addr,
        /// Number of bytes the access covered.
        size: u64,
        /// Why the access was rejected.
        cause: FaultCause,
    },
    /// requested range [{start:#x}, {end:#x}) wraps past the address space
    #[error("requested range [{start:#x}, {end:#x}) wraps past the address space")]
    WrappedRange {
        /// Start of the requested range.
        start: Addr,
        /// End of the requested range.
        end: Addr,
    },
    /// no instruction could be decoded at {address:#x}
    #[error("no instruction could be decoded at {address:#x}")]
    InvalidInstruction {
        /// Address at which decoding failed.
        address: Addr,
    },
    /// string at {address:#x} exceeds the maximum scan length of {limit} bytes
    #[error("string at {address:#x} exceeds the maximum scan length of {limit} bytes")]
    StringTooLong {
        /// Address the string started at.
        address: Addr,
        /// The configured scan limit that was exceeded.
        limit: u64,
    },
}

/// A segment could not be added to, or found in, a mapped memory.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum MappableError {
    /// a segment named `{0}` already exists
    #[error("a segment named `{0}` already exists")]
    DuplicateName(String),
    /// requested range [{start:#x}, {end:#x}) overlaps existing segment `{existing}`
    #[error("requested range [{start:#x}, {end:#x}) overlaps existing segment `{existing}`")]
    Overlap {
        /// Start of the requested range.
        start: Addr,
        /// End of the requested range.
        end: Addr,
        /// Name of the segment it overlaps.
        existing: String,
    },
    /// no segment named `{0}` exists
    #[error("no segment named `{0}` exists")]
    NoSuchSegment(String),
    /// no segment contains address {0:#x}
    #[error("no segment contains address {0:#x}")]
    NoSegmentAt(Addr),
    /// could not find {size} free bytes at or above {min_address:#x}
    #[error("could not find {size} free bytes at or above {min_address:#x}")]
    OutOfSpace {
        /// Requested allocation size.
        size: u64,
        /// Lowest address considered.
        min_address: Addr,
    },
    /// the underlying execution engine rejected the mapping: {0}
    #[error("the underlying execution engine rejected the mapping: {0}")]
    Backend(String),
}
