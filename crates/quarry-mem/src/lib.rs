//! Segmented guest memory: the byte-addressable world a [`quarry_dbg`]
//! debugger or emulator operates on.
//!
//! This crate is deliberately agnostic about where bytes actually live — a
//! [`BufferMemory`] backs every segment with an owned buffer, while a real
//! emulator backend (in `quarry-dbg`) backs them with guest RAM. Everything
//! above the `RawMemory` primitive (integer/string helpers, search,
//! disassembly, file I/O) is implemented once, here, as default methods on
//! [`Memory`].

#![warn(clippy::pedantic)]

pub mod buffer;
pub mod config;
pub mod cursor;
pub mod error;
pub mod mappable;
pub mod segment;
pub mod splitting;

use std::path::Path;
use std::sync::Arc;

use log::trace;
use quarry_arch::isa::Instruction;
use quarry_arch::{Addr, Architecture, Endianness, InstructionSet};

pub use crate::buffer::BufferMemory;
pub use crate::config::Limits;
pub use crate::cursor::MemoryCursor;
pub use crate::error::{FaultCause, MappableError, MemoryAccessError};
pub use crate::mappable::Mappable;
pub use crate::segment::{Segment, Segmented};
pub use crate::splitting::Splittable;

/// The primitive, unchecked read/write capability a concrete memory backend
/// must provide.
///
/// Kept deliberately small and free of convenience methods — those live on
/// [`Memory`] as default implementations built from these two primitives,
/// mirroring the split between the Python original's abstract `_read`/
/// `_write` and its much larger set of concrete helper methods.
pub trait RawMemory {
    /// Reads exactly `size` bytes starting at `address`.
    ///
    /// # Errors
    ///
    /// Fails with [`MemoryAccessError::Fault`] if any byte in the range is
    /// not accessible for reading.
    fn raw_read(&self, address: Addr, size: u64) -> Result<Vec<u8>, MemoryAccessError>;

    /// Writes `data` starting at `address`.
    ///
    /// # Errors
    ///
    /// Fails with [`MemoryAccessError::Fault`] if any byte in the range is
    /// not accessible for writing.
    fn raw_write(&mut self, address: Addr, data: &[u8]) -> Result<(), MemoryAccessError>;
}

/// A byte-addressable guest address space, with integer, string, search,
/// and disassembly helpers built on top of [`RawMemory`].
pub trait Memory: RawMemory {
    /// Architecture this memory is shaped for (word size, endianness,
    /// register file, instruction sets).
    fn arch(&self) -> &Arc<Architecture>;

    /// Configuration limits in effect for this memory.
    fn limits(&self) -> &Limits;

    /// Whether operations should log at `trace` level as they execute.
    fn verbose(&self) -> bool {
        false
    }

    /// The instruction set used by [`Memory::disassemble`] and
    /// [`Memory::write_code`] when none is given explicitly.
    fn default_isa(&self) -> &Arc<InstructionSet> {
        self.arch().default_isa()
    }

    /// Reads a single byte.
    ///
    /// # Errors
    ///
    /// Fails if the byte is not readable.
    fn read_byte(&self, address: Addr) -> Result<u8, MemoryAccessError> {
        Ok(self.raw_read(address, 1)?[0])
    }

    /// Writes a single byte.
    ///
    /// # Errors
    ///
    /// Fails if the byte is not writable.
    fn write_byte(&mut self, address: Addr, value: u8) -> Result<(), MemoryAccessError> {
        self.raw_write(address, &[value])
    }

    /// Reads `size` bytes.
    ///
    /// # Errors
    ///
    /// Fails if any byte in the range is not readable.
    fn read_bytes(&self, address: Addr, size: u64) -> Result<Vec<u8>, MemoryAccessError> {
        self.raw_read(address, size)
    }

    /// Writes `data`.
    ///
    /// # Errors
    ///
    /// Fails if any byte in the range is not writable.
    fn write_bytes(&mut self, address: Addr, data: &[u8]) -> Result<(), MemoryAccessError> {
        self.raw_write(address, data)
    }

    /// Reads an unsigned integer of `width` bytes, in this memory's native
    /// byte order.
    ///
    /// # Errors
    ///
    /// Fails if any byte in the range is not readable.
    fn read_uint(&self, address: Addr, width: usize) -> Result<u64, MemoryAccessError> {
        let data = self.raw_read(address, width as u64)?;
        Ok(self.arch().endianness().decode_uint(&data))
    }

    /// Reads a signed, sign-extended integer of `width` bytes.
    ///
    /// # Errors
    ///
    /// Fails if any byte in the range is not readable.
    fn read_int(&self, address: Addr, width: usize) -> Result<i64, MemoryAccessError> {
        let data = self.raw_read(address, width as u64)?;
        Ok(self.arch().endianness().decode_int(&data))
    }

    /// Writes an unsigned integer as `width` bytes.
    ///
    /// # Errors
    ///
    /// Fails if any byte in the range is not writable.
    fn write_uint(&mut self, address: Addr, value: u64, width: usize) -> Result<(), MemoryAccessError> {
        let data = self.arch().endianness().encode_uint(value, width);
        self.raw_write(address, &data)
    }

    /// Writes a signed integer as `width` bytes.
    ///
    /// # Errors
    ///
    /// Fails if any byte in the range is not writable.
    fn write_int(&mut self, address: Addr, value: i64, width: usize) -> Result<(), MemoryAccessError> {
        let data = self.arch().endianness().encode_int(value, width);
        self.raw_write(address, &data)
    }

    /// Reads a native-width unsigned word (the architecture's register/bus
    /// width, rounded up to a whole byte).
    ///
    /// # Errors
    ///
    /// Fails if any byte in the range is not readable.
    fn read_word(&self, address: Addr) -> Result<u64, MemoryAccessError> {
        self.read_uint(address, self.word_size())
    }

    /// Writes a native-width unsigned word.
    ///
    /// # Errors
    ///
    /// Fails if any byte in the range is not writable.
    fn write_word(&mut self, address: Addr, value: u64) -> Result<(), MemoryAccessError> {
        self.write_uint(address, value, self.word_size())
    }

    /// Reads bytes up to, but excluding, the next NUL byte.
    ///
    /// # Errors
    ///
    /// Fails with [`MemoryAccessError::StringTooLong`] if no NUL byte is
    /// found within [`Limits::max_cstring`] bytes of `address`, or with
    /// [`MemoryAccessError::Fault`] if a byte in that range is not
    /// readable.
    fn read_cstring_bytes(&self, address: Addr) -> Result<Vec<u8>, MemoryAccessError> {
        let limit = self.limits().max_cstring;
        let mut out = Vec::new();
        let mut offset = 0u64;
        while offset < limit {
            let byte = self.read_byte(address + offset)?;
            if byte == 0 {
                return Ok(out);
            }
            out.push(byte);
            offset += 1;
        }
        Err(MemoryAccessError::StringTooLong { address, limit })
    }

    /// Writes `data` followed by a NUL terminator.
    ///
    /// # Errors
    ///
    /// Fails if any byte of `data` plus the terminator is not writable.
    fn write_cstring(&mut self, address: Addr, data: &[u8]) -> Result<(), MemoryAccessError> {
        let mut buf = data.to_vec();
        buf.push(0);
        self.raw_write(address, &buf)
    }

    /// Width, in bytes, of this memory's architecture's native word.
    fn word_size(&self) -> usize {
        (self.arch().bits() as usize).div_ceil(8)
    }

    /// Assembles `text` with `isa` and writes the result at `address`.
    ///
    /// # Errors
    ///
    /// Fails if `text` does not assemble, or if the assembled bytes are not
    /// writable at `address`.
    fn write_code(
        &mut self,
        address: Addr,
        text: &str,
        isa: &InstructionSet,
    ) -> Result<(), CodeError> {
        let code = isa.assemble(text, address)?;
        if self.verbose() {
            trace!("assembled {address:#x}: {code:02x?}");
        }
        self.raw_write(address, &code)?;
        Ok(())
    }

    /// Opens a bounded, seekable file-like view over `[address, address +
    /// size)` of this memory.
    fn create_fileobj(&mut self, address: Addr, size: u64) -> MemoryCursor<'_, Self>
    where
        Self: Sized,
    {
        MemoryCursor::bounded(self, address, size)
    }

    /// Copies the contents of `path` into memory starting at `address`.
    ///
    /// # Errors
    ///
    /// Fails if `path` cannot be opened or read, or if the file's contents
    /// are not writable at `address`.
    fn write_file(&mut self, address: Addr, path: &Path) -> Result<u64, FileIoError>
    where
        Self: Sized,
    {
        let mut file = std::fs::File::open(path)?;
        let size = file.metadata()?.len();
        let mut cursor = MemoryCursor::bounded(self, address, size);
        Ok(std::io::copy(&mut file, &mut cursor)?)
    }

    /// Copies `size` bytes of memory starting at `address` into `path`,
    /// creating or truncating it.
    ///
    /// # Errors
    ///
    /// Fails if `path` cannot be created or written, or if the requested
    /// range is not readable.
    fn dump_to_file(&mut self, address: Addr, size: u64, path: &Path) -> Result<u64, FileIoError>
    where
        Self: Sized,
    {
        let mut file = std::fs::File::create(path)?;
        let mut cursor = MemoryCursor::bounded(self, address, size);
        Ok(std::io::copy(&mut cursor, &mut file)?)
    }

    /// Searches `[address, address + size)` for the first occurrence of
    /// `pattern` at an address that is a multiple of `alignment`.
    ///
    /// # Errors
    ///
    /// Fails if the searched range is not readable.
    fn search(
        &self,
        address: Addr,
        size: u64,
        pattern: &[u8],
        alignment: u64,
    ) -> Result<Option<Addr>, MemoryAccessError> {
        if pattern.is_empty() || pattern.len() as u64 > size {
            return Ok(None);
        }
        let align = alignment.max(1);
        let data = self.raw_read(address, size)?;
        let mut offset = 0usize;
        while offset + pattern.len() <= data.len() {
            let candidate = address + offset as u64;
            if candidate % align == 0 && data[offset..offset + pattern.len()] == *pattern {
                return Ok(Some(candidate));
            }
            offset += 1;
        }
        Ok(None)
    }

    /// Disassembles instructions covering `[address, address + size)`,
    /// using `isa` (or the architecture's default if `None`).
    ///
    /// This is the "known maximum read size" regime (spec section 4.3):
    /// the caller knows exactly how many bytes are available, so reads
    /// proceed in [`Limits::disassembly_chunk_size`]-sized chunks rather
    /// than all at once.
    ///
    /// # Errors
    ///
    /// Fails if the window is not readable.
    fn disassemble(
        &self,
        address: Addr,
        size: u64,
        isa: Option<&InstructionSet>,
    ) -> Result<Vec<Instruction>, MemoryAccessError> {
        let default = self.default_isa().clone();
        let isa = isa.unwrap_or(&default);
        let chunk_size = self.limits().disassembly_chunk_size.max(isa.max_insn_size());

        let mut out = Vec::new();
        let mut cursor = address;
        let end = address + size;
        let mut tail: Vec<u8> = Vec::new();

        while cursor < end || !tail.is_empty() {
            let want = chunk_size.min(end.saturating_sub(cursor));
            let mut buf = tail.clone();
            if want > 0 {
                buf.extend(self.raw_read(cursor, want)?);
                cursor += want;
            }
            let decoded = isa.disassemble(&buf, cursor - buf.len() as u64, None);
            let decoded_len: u64 = decoded.iter().map(|insn| insn.size).sum();
            let progressed = decoded_len > 0;
            out.extend(decoded);

            tail = buf[decoded_len as usize..].to_vec();
            if !progressed {
                // Nothing decoded from this chunk; avoid spinning forever on
                // an undecodable tail when there is no more input to append.
                break;
            }
            if cursor >= end && (tail.len() as u64) < isa.min_insn_size() {
                break;
            }
        }

        Ok(out)
    }

    /// Disassembles up to `count` instructions starting at `address`,
    /// without a known upper bound on how much memory may be read.
    ///
    /// This is the "unknown maximum read size" regime (spec section 4.3):
    /// each instruction is decoded independently via
    /// [`Memory::disassemble_one`], descending through `isa`'s candidate
    /// instruction sizes until a read succeeds. Stops silently, without
    /// error, the moment a read or decode fails.
    fn disassemble_unknown(&self, address: Addr, count: usize, isa: Option<&InstructionSet>) -> Vec<Instruction> {
        let default = self.default_isa().clone();
        let isa = isa.unwrap_or(&default);
        let mut out = Vec::with_capacity(count);
        let mut cursor = address;
        for _ in 0..count {
            match self.disassemble_one(cursor, isa) {
                Ok(insn) => {
                    cursor += insn.size;
                    out.push(insn);
                }
                Err(_) => break,
            }
        }
        out
    }

    /// Strict variant of [`Memory::disassemble_unknown`]: decodes exactly
    /// `count` instructions or fails, identifying the address at which
    /// decoding stopped.
    ///
    /// # Errors
    ///
    /// Fails with [`MemoryAccessError::InvalidInstruction`] if fewer than
    /// `count` instructions could be decoded.
    fn disassemble_n(
        &self,
        address: Addr,
        count: usize,
        isa: Option<&InstructionSet>,
    ) -> Result<Vec<Instruction>, MemoryAccessError> {
        let decoded = self.disassemble_unknown(address, count, isa);
        if decoded.len() < count {
            let failed_at = address + decoded.iter().map(|insn| insn.size).sum::<u64>();
            return Err(MemoryAccessError::InvalidInstruction { address: failed_at });
        }
        Ok(decoded)
    }

    /// Disassembles exactly one instruction at `address`, trying `isa`'s
    /// candidate instruction sizes from largest to smallest until a read
    /// succeeds (the largest read may fail simply because fewer bytes than
    /// the maximum instruction size remain accessible).
    ///
    /// # Errors
    ///
    /// Fails with [`MemoryAccessError::InvalidInstruction`] if no candidate
    /// size yields both a successful read and a valid decode.
    fn disassemble_one(
        &self,
        address: Addr,
        isa: &InstructionSet,
    ) -> Result<Instruction, MemoryAccessError> {
        for &candidate in isa.insn_sizes() {
            if let Ok(data) = self.raw_read(address, candidate) {
                if let Ok(insn) = isa.disassemble_one(&data, address) {
                    return Ok(insn);
                }
            }
        }
        Err(MemoryAccessError::InvalidInstruction { address })
    }

    /// Reads the single byte at `address`.
    ///
    /// The Rust analogue of the source project's `mem[addr]` indexing; Rust
    /// has no fallible `Index` impl, so this is a named method instead.
    ///
    /// # Errors
    ///
    /// Fails if the byte is not readable.
    fn byte_at(&self, address: Addr) -> Result<u8, MemoryAccessError> {
        self.read_byte(address)
    }

    /// Reads the bytes in `range`.
    ///
    /// The Rust analogue of the source project's `mem[start:stop]` slicing.
    /// Only a contiguous, stride-free range is supported, matching the
    /// "no stride" restriction on the original's slice indexing.
    ///
    /// # Errors
    ///
    /// Fails if any byte in `range` is not readable.
    fn slice(&self, range: std::ops::Range<Addr>) -> Result<Vec<u8>, MemoryAccessError> {
        let size = range.end.saturating_sub(range.start);
        self.raw_read(range.start, size)
    }
}

/// A [`Memory`] whose address space is divided into named, permissioned
/// segments (a [`Segmented`] implementor), with search operations that
/// respect segment boundaries and permissions.
///
/// Grounded on the source project's `SegmentMemory.search_all`/
/// `search_code`: blanket-implemented for any type that is both, so no
/// concrete memory needs to implement it by hand.
pub trait SegmentedMemory: Memory + Segmented {
    /// Searches every segment whose permissions contain `perms`, in
    /// registration order, for the first occurrence of `pattern` at an
    /// address that is a multiple of `alignment`. The first qualifying
    /// segment with a hit wins; segments are not searched once one matches.
    ///
    /// # Errors
    ///
    /// Fails if a qualifying segment cannot be read.
    fn search_all(
        &self,
        pattern: &[u8],
        alignment: u64,
        perms: quarry_arch::AccessType,
    ) -> Result<Option<Addr>, MemoryAccessError> {
        for seg in self.iter() {
            if !seg.perms().contains(perms) {
                continue;
            }
            if let Some(found) = self.search(seg.start(), seg.size(), pattern, alignment)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Assembles `assembly` with `isa` (or the default instruction set) and
    /// searches every executable segment for its encoding, using the
    /// instruction set's alignment.
    ///
    /// # Errors
    ///
    /// Fails if `assembly` does not assemble, or if a qualifying segment
    /// cannot be read.
    fn search_code(&self, assembly: &str, isa: Option<&InstructionSet>) -> Result<Option<Addr>, CodeError> {
        let default = self.default_isa().clone();
        let isa = isa.unwrap_or(&default);
        let code = isa.assemble(assembly, 0)?;
        Ok(self.search_all(&code, isa.insn_alignment(), quarry_arch::AccessType::EXECUTE)?)
    }
}

impl<T: Memory + Segmented> SegmentedMemory for T {}

/// Failure to assemble and write code (see [`Memory::write_code`]).
#[derive(Clone, Debug, thiserror::Error)]
pub enum CodeError {
    /// {0}
    #[error(transparent)]
    Assembly(#[from] quarry_arch::isa::AssemblyError),
    /// {0}
    #[error(transparent)]
    Memory(#[from] MemoryAccessError),
}

/// Failure during a file-backed memory transfer.
#[derive(Debug, thiserror::Error)]
pub enum FileIoError {
    /// {0}
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_arch::isa::{AssemblyError, Assembler, Disassembler, IdentityInterworking};

    struct Flat {
        data: Vec<u8>,
        arch: Arc<Architecture>,
        limits: Limits,
    }

    struct ToyAssembler;
    impl Assembler for ToyAssembler {
        fn assemble(&self, text: &str, _address: Addr) -> Result<Vec<u8>, AssemblyError> {
            match text {
                "nop" => Ok(vec![0x00]),
                _ => Err(AssemblyError { text: text.to_string() }),
            }
        }
    }

    struct ToyDisassembler;
    impl Disassembler for ToyDisassembler {
        fn disassemble(&self, data: &[u8], address: Addr, max_count: Option<usize>) -> Vec<Instruction> {
            let mut out = Vec::new();
            let mut offset = 0;
            let limit = max_count.unwrap_or(usize::MAX);
            while offset < data.len() && out.len() < limit {
                if data[offset] == 0x00 {
                    out.push(Instruction {
                        address: address + offset as u64,
                        size: 1,
                        mnemonic: "nop".into(),
                        operands: String::new(),
                        bytes: vec![0x00],
                    });
                    offset += 1;
                } else {
                    break;
                }
            }
            out
        }
    }

    fn toy_arch() -> Arc<Architecture> {
        let isa = Arc::new(InstructionSet::new(
            "toy",
            1,
            1,
            1,
            vec![1],
            Arc::new(ToyAssembler),
            Arc::new(ToyDisassembler),
            Arc::new(IdentityInterworking),
        ));
        Arc::new(
            Architecture::builder("toy", 32, Endianness::Little)
                .instruction_set(isa)
                .build()
                .unwrap(),
        )
    }

    impl RawMemory for Flat {
        fn raw_read(&self, address: Addr, size: u64) -> Result<Vec<u8>, MemoryAccessError> {
            let start = address as usize;
            let end = start + size as usize;
            self.data.get(start..end).map(<[u8]>::to_vec).ok_or(MemoryAccessError::Fault {
                address,
                size,
                cause: FaultCause::Unmapped,
            })
        }

        fn raw_write(&mut self, address: Addr, data: &[u8]) -> Result<(), MemoryAccessError> {
            let start = address as usize;
            let end = start + data.len();
            if end > self.data.len() {
                return Err(MemoryAccessError::Fault {
                    address,
                    size: data.len() as u64,
                    cause: FaultCause::Unmapped,
                });
            }
            self.data[start..end].copy_from_slice(data);
            Ok(())
        }
    }

    impl Memory for Flat {
        fn arch(&self) -> &Arc<Architecture> {
            &self.arch
        }

        fn limits(&self) -> &Limits {
            &self.limits
        }
    }

    fn flat(bytes: &[u8]) -> Flat {
        Flat {
            data: bytes.to_vec(),
            arch: toy_arch(),
            limits: Limits::default(),
        }
    }

    #[test]
    fn integers_round_trip_little_endian() {
        let mut mem = flat(&[0; 8]);
        mem.write_uint(0, 0x1122_3344, 4).unwrap();
        assert_eq!(mem.read_uint(0, 4).unwrap(), 0x1122_3344);
        mem.write_int(4, -1, 2).unwrap();
        assert_eq!(mem.read_int(4, 2).unwrap(), -1);
    }

    #[test]
    fn cstring_round_trips() {
        let mut mem = flat(&[0xff; 16]);
        mem.write_cstring(0, b"hi").unwrap();
        assert_eq!(mem.read_cstring_bytes(0).unwrap(), b"hi");
    }

    #[test]
    fn cstring_without_terminator_errors() {
        let mut mem = flat(&[0x41; 4]);
        mem.limits.max_cstring = 4;
        assert!(matches!(
            mem.read_cstring_bytes(0),
            Err(MemoryAccessError::StringTooLong { .. })
        ));
    }

    #[test]
    fn search_finds_pattern() {
        let mem = flat(b"hello world");
        assert_eq!(mem.search(0, 11, b"world", 1).unwrap(), Some(6));
        assert_eq!(mem.search(0, 11, b"xyz", 1).unwrap(), None);
    }

    #[test]
    fn search_respects_alignment() {
        // "lo" appears at offset 3 (odd) and nowhere at an even offset.
        let mem = flat(b"hello");
        assert_eq!(mem.search(0, 5, b"lo", 1).unwrap(), Some(3));
        assert_eq!(mem.search(0, 5, b"lo", 2).unwrap(), None);
    }

    #[test]
    fn write_code_assembles_and_writes() {
        let mut mem = flat(&[0xff; 4]);
        let arch = mem.arch.clone();
        let isa = arch.default_isa().clone();
        mem.write_code(0, "nop", &isa).unwrap();
        assert_eq!(mem.read_byte(0).unwrap(), 0x00);
    }

    #[test]
    fn disassemble_stops_at_invalid_encoding() {
        let mem = flat(&[0x00, 0x00, 0xff, 0x00]);
        let arch = mem.arch.clone();
        let isa = arch.default_isa().clone();
        let insns = mem.disassemble(0, 4, Some(&isa)).unwrap();
        assert_eq!(insns.len(), 2);
    }

    #[test]
    fn disassemble_unknown_stops_on_read_failure() {
        let mem = flat(&[0x00, 0x00]);
        let arch = mem.arch.clone();
        let isa = arch.default_isa().clone();
        let insns = mem.disassemble_unknown(0, 5, Some(&isa));
        assert_eq!(insns.len(), 2);
    }

    #[test]
    fn disassemble_n_fails_identifying_the_stall_address() {
        let mem = flat(&[0x00, 0x00]);
        let arch = mem.arch.clone();
        let isa = arch.default_isa().clone();
        let err = mem.disassemble_n(0, 5, Some(&isa)).unwrap_err();
        assert_eq!(err, MemoryAccessError::InvalidInstruction { address: 2 });
    }

    #[test]
    fn disassemble_n_succeeds_when_enough_decode() {
        let mem = flat(&[0x00, 0x00, 0x00]);
        let arch = mem.arch.clone();
        let isa = arch.default_isa().clone();
        assert_eq!(mem.disassemble_n(0, 3, Some(&isa)).unwrap().len(), 3);
    }

    #[test]
    fn search_all_finds_pattern_in_second_segment() {
        struct Segs {
            arch: Arc<Architecture>,
            limits: Limits,
            segments: Vec<Segment>,
            data: Vec<Vec<u8>>,
        }
        impl RawMemory for Segs {
            fn raw_read(&self, address: Addr, size: u64) -> Result<Vec<u8>, MemoryAccessError> {
                let (idx, seg) = self
                    .segments
                    .iter()
                    .enumerate()
                    .find(|(_, s)| s.contains_address(address))
                    .ok_or(MemoryAccessError::Fault { address, size, cause: FaultCause::Unmapped })?;
                let offset = (address - seg.start()) as usize;
                Ok(self.data[idx][offset..offset + size as usize].to_vec())
            }
            fn raw_write(&mut self, _address: Addr, _data: &[u8]) -> Result<(), MemoryAccessError> {
                unimplemented!("not needed for this test")
            }
        }
        impl Memory for Segs {
            fn arch(&self) -> &Arc<Architecture> {
                &self.arch
            }
            fn limits(&self) -> &Limits {
                &self.limits
            }
        }
        impl Segmented for Segs {
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

        let mem = Segs {
            arch: toy_arch(),
            limits: Limits::default(),
            segments: vec![
                Segment::new("a", 0, 4, quarry_arch::AccessType::RW),
                Segment::new("b", 0x100, 8, quarry_arch::AccessType::RW),
            ],
            data: vec![vec![0; 4], b"needle!!".to_vec()],
        };
        assert_eq!(mem.search_all(b"needle", 1, quarry_arch::AccessType::R).unwrap(), Some(0x100));
        assert_eq!(mem.search_all(b"missing", 1, quarry_arch::AccessType::R).unwrap(), None);
    }
}
