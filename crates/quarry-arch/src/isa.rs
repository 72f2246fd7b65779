//! Instruction sets: the assemble/disassemble/interworking boundary.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::{Addr, Pointer};

/// A single decoded instruction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Instruction {
    /// Address the instruction was decoded at.
    pub address: Addr,
    /// Size, in bytes, of the encoded instruction.
    pub size: u64,
    /// Mnemonic (e.g. `"mov"`).
    pub mnemonic: String,
    /// Operand text (e.g. `"x0, x1"`).
    pub operands: String,
    /// Raw encoded bytes.
    pub bytes: Vec<u8>,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.operands.is_empty() {
            write!(f, "{}", self.mnemonic)
        } else {
            write!(f, "{} {}", self.mnemonic, self.operands)
        }
    }
}

/// Failure to assemble a line of text into machine code.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("failed to assemble `{text}`")]
pub struct AssemblyError {
    /// The offending assembly text.
    pub text: String,
}

/// Failure to decode a valid instruction.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("invalid instruction at {address:#x}")]
pub struct DisassemblyError {
    /// Address at which decoding failed.
    pub address: Addr,
}

/// The assembler half of an instruction set's backend.
///
/// An external collaborator: this toolkit is agnostic about which concrete
/// assembler library implements it.
pub trait Assembler {
    /// Assembles `text` into machine code as if placed at `address`.
    ///
    /// # Errors
    ///
    /// Fails with [`AssemblyError`] if `text` is not valid assembly for this
    /// instruction set.
    fn assemble(&self, text: &str, address: Addr) -> Result<Vec<u8>, AssemblyError>;
}

/// The disassembler half of an instruction set's backend.
///
/// An external collaborator: this toolkit is agnostic about which concrete
/// disassembler library implements it.
pub trait Disassembler {
    /// Decodes as many instructions as possible from `data`, which is
    /// assumed to start at `address`.
    ///
    /// Decoding stops when `data` is exhausted, `max_count` instructions have
    /// been decoded (if given), or an invalid encoding is encountered — the
    /// latter is not an error, it simply ends the returned sequence.
    fn disassemble(&self, data: &[u8], address: Addr, max_count: Option<usize>) -> Vec<Instruction>;

    /// Decodes exactly one instruction from the start of `data`.
    ///
    /// # Errors
    ///
    /// Fails with [`DisassemblyError`] if `data` does not begin with a valid
    /// instruction.
    fn disassemble_one(&self, data: &[u8], address: Addr) -> Result<Instruction, DisassemblyError> {
        self.disassemble(data, address, Some(1))
            .into_iter()
            .next()
            .ok_or(DisassemblyError { address })
    }
}

/// Converts between a CPU's code-pointer encoding and a canonical
/// instruction address.
///
/// For most architectures the two coincide (identity rule). ARM/Thumb
/// interworking is the motivating exception: the pointer loaded into `pc`
/// has its least-significant bit set to select Thumb mode, while the
/// canonical instruction address never has that bit set.
pub trait Interworking {
    /// Converts a canonical address into the pointer encoding used by this
    /// instruction set.
    fn address_to_pointer(&self, address: Addr) -> Pointer;

    /// Converts a pointer (as found in e.g. the program counter) back into a
    /// canonical instruction address.
    fn pointer_to_address(&self, pointer: Pointer) -> Addr;
}

/// The identity interworking rule, for architectures with no pointer/address
/// distinction.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityInterworking;

impl Interworking for IdentityInterworking {
    fn address_to_pointer(&self, address: Addr) -> Pointer {
        address
    }

    fn pointer_to_address(&self, pointer: Pointer) -> Addr {
        pointer
    }
}

/// The ARM/Thumb interworking rule: bit 0 of the pointer selects Thumb mode
/// and is never part of the canonical address.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThumbInterworking;

impl Interworking for ThumbInterworking {
    fn address_to_pointer(&self, address: Addr) -> Pointer {
        address | 1
    }

    fn pointer_to_address(&self, pointer: Pointer) -> Addr {
        pointer & !1
    }
}

/// One instruction set of an [`Architecture`](crate::Architecture).
pub struct InstructionSet {
    name: String,
    insn_alignment: u64,
    min_insn_size: u64,
    max_insn_size: u64,
    /// Candidate instruction sizes, descending, used when the maximum
    /// readable window at an address is unknown (spec section 4.3's
    /// "unknown maximum read size" regime). For architectures with a single
    /// fixed instruction size this is a single-element list.
    insn_sizes: Vec<u64>,
    assembler: Arc<dyn Assembler>,
    disassembler: Arc<dyn Disassembler>,
    interworking: Arc<dyn Interworking>,
}

impl InstructionSet {
    /// Constructs a new instruction set description.
    ///
    /// `insn_sizes` must be non-empty and every element must lie within
    /// `[min_insn_size, max_insn_size]`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        insn_alignment: u64,
        min_insn_size: u64,
        max_insn_size: u64,
        mut insn_sizes: Vec<u64>,
        assembler: Arc<dyn Assembler>,
        disassembler: Arc<dyn Disassembler>,
        interworking: Arc<dyn Interworking>,
    ) -> Self {
        assert!(!insn_sizes.is_empty(), "insn_sizes must not be empty");
        insn_sizes.sort_unstable_by(|a, b| b.cmp(a));
        Self {
            name: name.into(),
            insn_alignment,
            min_insn_size,
            max_insn_size,
            insn_sizes,
            assembler,
            disassembler,
            interworking,
        }
    }

    /// Name of this instruction set (e.g. `"thumb"`).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Minimum instruction alignment, in bytes.
    #[must_use]
    pub fn insn_alignment(&self) -> u64 {
        self.insn_alignment
    }

    /// Smallest possible instruction size, in bytes.
    #[must_use]
    pub fn min_insn_size(&self) -> u64 {
        self.min_insn_size
    }

    /// Largest possible instruction size, in bytes.
    #[must_use]
    pub fn max_insn_size(&self) -> u64 {
        self.max_insn_size
    }

    /// Candidate instruction sizes, in descending order.
    #[must_use]
    pub fn insn_sizes(&self) -> &[u64] {
        &self.insn_sizes
    }

    /// Assembles `text` at `address`.
    ///
    /// # Errors
    ///
    /// Fails with [`AssemblyError`] if `text` does not assemble.
    pub fn assemble(&self, text: &str, address: Addr) -> Result<Vec<u8>, AssemblyError> {
        self.assembler.assemble(text, address)
    }

    /// Disassembles instructions from `data`, assumed to start at `address`.
    #[must_use]
    pub fn disassemble(&self, data: &[u8], address: Addr, max_count: Option<usize>) -> Vec<Instruction> {
        self.disassembler.disassemble(data, address, max_count)
    }

    /// Disassembles exactly one instruction from the start of `data`.
    ///
    /// # Errors
    ///
    /// Fails with [`DisassemblyError`] if `data` does not begin with a valid
    /// instruction.
    pub fn disassemble_one(&self, data: &[u8], address: Addr) -> Result<Instruction, DisassemblyError> {
        self.disassembler.disassemble_one(data, address)
    }

    /// Converts an address into this instruction set's pointer encoding.
    #[must_use]
    pub fn address_to_pointer(&self, address: Addr) -> Pointer {
        self.interworking.address_to_pointer(address)
    }

    /// Converts a pointer back into a canonical instruction address.
    #[must_use]
    pub fn pointer_to_address(&self, pointer: Pointer) -> Addr {
        self.interworking.pointer_to_address(pointer)
    }
}

impl fmt::Debug for InstructionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstructionSet")
            .field("name", &self.name)
            .field("insn_alignment", &self.insn_alignment)
            .field("min_insn_size", &self.min_insn_size)
            .field("max_insn_size", &self.max_insn_size)
            .finish_non_exhaustive()
    }
}
