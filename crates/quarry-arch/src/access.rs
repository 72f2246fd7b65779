//! Memory access permissions and access records.

use bitflags::bitflags;

use crate::Addr;

bitflags! {
    /// Set of permitted operations on a range of memory.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
    pub struct AccessType: u8 {
        /// No access.
        const NONE    = 0;
        /// Readable.
        const READ    = 1 << 0;
        /// Writable.
        const WRITE   = 1 << 1;
        /// Executable.
        const EXECUTE = 1 << 2;
    }
}

impl AccessType {
    /// Read-only.
    pub const R: Self = Self::READ;
    /// Write-only.
    pub const W: Self = Self::WRITE;
    /// Execute-only.
    pub const X: Self = Self::EXECUTE;
    /// Readable and writable.
    pub const RW: Self = Self::READ.union(Self::WRITE);
    /// Readable and executable.
    pub const RX: Self = Self::READ.union(Self::EXECUTE);
    /// Readable, writable, and executable.
    pub const RWX: Self = Self::READ.union(Self::WRITE).union(Self::EXECUTE);
}

/// An immutable record of a single memory access.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Access {
    /// Kind of access performed.
    pub kind: AccessType,
    /// Address accessed.
    pub address: Addr,
    /// Number of bytes accessed.
    pub size: u64,
    /// Data written, present only for write accesses.
    pub value: Option<Vec<u8>>,
}

impl Access {
    /// Constructs a read access record.
    #[must_use]
    pub fn read(address: Addr, size: u64) -> Self {
        Self {
            kind: AccessType::READ,
            address,
            size,
            value: None,
        }
    }

    /// Constructs a write access record, carrying the written bytes.
    #[must_use]
    pub fn write(address: Addr, value: Vec<u8>) -> Self {
        Self {
            kind: AccessType::WRITE,
            address,
            size: value.len() as u64,
            value: Some(value),
        }
    }

    /// Constructs an execute (fetch) access record.
    #[must_use]
    pub fn execute(address: Addr, size: u64) -> Self {
        Self {
            kind: AccessType::EXECUTE,
            address,
            size,
            value: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorthands_cover_expected_bits() {
        assert_eq!(AccessType::RW, AccessType::READ | AccessType::WRITE);
        assert_eq!(
            AccessType::RWX,
            AccessType::READ | AccessType::WRITE | AccessType::EXECUTE
        );
        assert!(AccessType::RWX.contains(AccessType::R));
        assert!(!AccessType::RX.contains(AccessType::W));
    }

    #[test]
    fn write_access_carries_value() {
        let access = Access::write(0x1000, vec![1, 2, 3]);
        assert_eq!(access.size, 3);
        assert_eq!(access.value.as_deref(), Some(&[1, 2, 3][..]));
    }

    #[test]
    fn read_access_has_no_value() {
        let access = Access::read(0x1000, 4);
        assert!(access.value.is_none());
    }
}
