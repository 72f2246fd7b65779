//! CPU architecture descriptions and the process-wide architecture catalog.

use std::sync::{Arc, OnceLock, RwLock};

use thiserror::Error;

use crate::endian::Endianness;
use crate::isa::InstructionSet;
use crate::reg::RegisterSet;
use crate::registry::{Named, Registry, RegistryError};

/// Construction-time validation failure for an [`Architecture`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ArchitectureError {
    /// minimum instruction size {min} exceeds maximum {max}
    #[error("minimum instruction size {min} exceeds maximum {max}")]
    SizeOrder {
        /// Minimum instruction size, in bytes.
        min: u64,
        /// Maximum instruction size, in bytes.
        max: u64,
    },
    /// instruction size {size} is not a multiple of alignment {alignment}
    #[error("instruction size {size} is not a multiple of alignment {alignment}")]
    Unaligned {
        /// The offending size.
        size: u64,
        /// Required instruction alignment.
        alignment: u64,
    },
    /// architecture must have at least one instruction set
    #[error("architecture must have at least one instruction set")]
    NoInstructionSets,
}

/// A guest CPU family: its word size, byte order, register file, and the
/// instruction sets it supports.
///
/// Built through [`ArchitectureBuilder`] rather than a constructor, since the
/// number of independent fields (name, bits, endianness, registers, pc/sp
/// aliases, one or more instruction sets) makes positional or even
/// keyword-style construction unwieldy.
#[derive(Debug)]
pub struct Architecture {
    name: String,
    alt_names: Vec<String>,
    bits: u32,
    endianness: Endianness,
    regs: RegisterSet,
    pc_name: String,
    sp_name: String,
    retaddr_name: Option<String>,
    retval_name: Option<String>,
    insn_alignment: u64,
    min_insn_size: u64,
    max_insn_size: u64,
    isas: Vec<Arc<InstructionSet>>,
    default_isa: usize,
}

impl Architecture {
    /// Starts building a new architecture description.
    #[must_use]
    pub fn builder(name: impl Into<String>, bits: u32, endianness: Endianness) -> ArchitectureBuilder {
        ArchitectureBuilder::new(name, bits, endianness)
    }

    /// Canonical architecture name (e.g. `"arm64"`).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Word size, in bits (e.g. 64 for arm64).
    #[must_use]
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Native byte order.
    #[must_use]
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// This architecture's register file.
    #[must_use]
    pub fn regs(&self) -> &RegisterSet {
        &self.regs
    }

    /// Name of the program-counter register.
    #[must_use]
    pub fn pc_name(&self) -> &str {
        &self.pc_name
    }

    /// Name of the stack-pointer register.
    #[must_use]
    pub fn sp_name(&self) -> &str {
        &self.sp_name
    }

    /// Name of the register (or calling-convention slot) that holds the
    /// return address on entry to a function, if this architecture defines
    /// one (e.g. `lr` on arm, as opposed to a stack slot on x86).
    #[must_use]
    pub fn retaddr_name(&self) -> Option<&str> {
        self.retaddr_name.as_deref()
    }

    /// Name of the register that holds a function's return value, if this
    /// architecture's calling convention assigns it a fixed register (e.g.
    /// `x0`/`eax`).
    #[must_use]
    pub fn retval_name(&self) -> Option<&str> {
        self.retval_name.as_deref()
    }

    /// Minimum instruction alignment shared by all of this architecture's
    /// instruction sets, in bytes.
    #[must_use]
    pub fn insn_alignment(&self) -> u64 {
        self.insn_alignment
    }

    /// Smallest instruction size across all instruction sets, in bytes.
    #[must_use]
    pub fn min_insn_size(&self) -> u64 {
        self.min_insn_size
    }

    /// Largest instruction size across all instruction sets, in bytes.
    #[must_use]
    pub fn max_insn_size(&self) -> u64 {
        self.max_insn_size
    }

    /// This architecture's instruction sets, in registration order.
    #[must_use]
    pub fn instruction_sets(&self) -> &[Arc<InstructionSet>] {
        &self.isas
    }

    /// The instruction set used when none is specified explicitly.
    #[must_use]
    pub fn default_isa(&self) -> &Arc<InstructionSet> {
        &self.isas[self.default_isa]
    }

    /// Looks up one of this architecture's instruction sets by name.
    #[must_use]
    pub fn isa_by_name(&self, name: &str) -> Option<&Arc<InstructionSet>> {
        self.isas.iter().find(|isa| isa.name().eq_ignore_ascii_case(name))
    }

    /// Picks the instruction set that should be used to decode code at the
    /// architecture's current mode, given a live view of its registers.
    ///
    /// Reads the raw program-counter pointer and asks each instruction set's
    /// interworking rule to turn it back into a canonical address: the
    /// pointer encoding that actually changes the value (ARM/Thumb's bit 0)
    /// marks the active mode. Architectures with a single instruction set,
    /// or whose instruction sets all share the identity rule, always get
    /// that set back since no rule ever disagrees with the raw pointer.
    #[must_use]
    pub fn isa_from_regs<R: RegisterRead>(&self, regs: &R) -> &Arc<InstructionSet> {
        let Some(pointer) = regs.read(&self.pc_name) else {
            return self.default_isa();
        };
        self.isas
            .iter()
            .find(|isa| isa.pointer_to_address(pointer) != pointer)
            .unwrap_or_else(|| self.default_isa())
    }
}

impl Named for Architecture {
    fn name(&self) -> &str {
        &self.name
    }

    fn alt_names(&self) -> &[String] {
        &self.alt_names
    }
}

/// A read-only view onto a live register file, used to pick an instruction
/// set based on current CPU mode (see [`Architecture::isa_from_regs`]).
///
/// Implemented both by a bare [`RegisterSet`] snapshot (for tests) and by a
/// live `Debugger`'s register view, so `isa_from_regs` can be called from
/// either context.
pub trait RegisterRead {
    /// Reads the current value of a register by name.
    fn read(&self, name: &str) -> Option<u64>;
}

/// Builder for [`Architecture`].
pub struct ArchitectureBuilder {
    name: String,
    alt_names: Vec<String>,
    bits: u32,
    endianness: Endianness,
    regs: RegisterSet,
    pc_name: String,
    sp_name: String,
    retaddr_name: Option<String>,
    retval_name: Option<String>,
    isas: Vec<Arc<InstructionSet>>,
    default_isa: usize,
}

impl ArchitectureBuilder {
    fn new(name: impl Into<String>, bits: u32, endianness: Endianness) -> Self {
        Self {
            name: name.into(),
            alt_names: Vec::new(),
            bits,
            endianness,
            regs: RegisterSet::new(),
            pc_name: "pc".to_string(),
            sp_name: "sp".to_string(),
            retaddr_name: None,
            retval_name: None,
            isas: Vec::new(),
            default_isa: 0,
        }
    }

    /// Adds an alternate lookup name (e.g. `"aarch64"` for `"arm64"`).
    #[must_use]
    pub fn alt_name(mut self, name: impl Into<String>) -> Self {
        self.alt_names.push(name.into());
        self
    }

    /// Sets the register file. Overwrites any previously set register file.
    #[must_use]
    pub fn regs(mut self, regs: RegisterSet) -> Self {
        self.regs = regs;
        self
    }

    /// Sets the name of the program-counter register. Defaults to `"pc"`.
    #[must_use]
    pub fn pc_name(mut self, name: impl Into<String>) -> Self {
        self.pc_name = name.into();
        self
    }

    /// Sets the name of the stack-pointer register. Defaults to `"sp"`.
    #[must_use]
    pub fn sp_name(mut self, name: impl Into<String>) -> Self {
        self.sp_name = name.into();
        self
    }

    /// Sets the name of the register holding a function's return address on
    /// entry. Leave unset for architectures that pass it on the stack.
    #[must_use]
    pub fn retaddr_name(mut self, name: impl Into<String>) -> Self {
        self.retaddr_name = Some(name.into());
        self
    }

    /// Sets the name of the register holding a function's return value.
    #[must_use]
    pub fn retval_name(mut self, name: impl Into<String>) -> Self {
        self.retval_name = Some(name.into());
        self
    }

    /// Adds an instruction set. The first one added becomes the default.
    #[must_use]
    pub fn instruction_set(mut self, isa: Arc<InstructionSet>) -> Self {
        self.isas.push(isa);
        self
    }

    /// Finishes construction, validating instruction-size invariants.
    ///
    /// # Errors
    ///
    /// Fails with [`ArchitectureError`] if no instruction set was added, or
    /// if any instruction set's `min_insn_size`/`max_insn_size` are
    /// inconsistent with its `insn_alignment`.
    pub fn build(self) -> Result<Architecture, ArchitectureError> {
        if self.isas.is_empty() {
            return Err(ArchitectureError::NoInstructionSets);
        }

        let mut min_insn_size = u64::MAX;
        let mut max_insn_size = 0;
        let mut insn_alignment = 1;

        for isa in &self.isas {
            if isa.min_insn_size() > isa.max_insn_size() {
                return Err(ArchitectureError::SizeOrder {
                    min: isa.min_insn_size(),
                    max: isa.max_insn_size(),
                });
            }
            for size in [isa.min_insn_size(), isa.max_insn_size()] {
                if size % isa.insn_alignment() != 0 {
                    return Err(ArchitectureError::Unaligned {
                        size,
                        alignment: isa.insn_alignment(),
                    });
                }
            }
            min_insn_size = min_insn_size.min(isa.min_insn_size());
            max_insn_size = max_insn_size.max(isa.max_insn_size());
            insn_alignment = insn_alignment.max(isa.insn_alignment());
        }

        Ok(Architecture {
            name: self.name,
            alt_names: self.alt_names,
            bits: self.bits,
            endianness: self.endianness,
            regs: self.regs,
            pc_name: self.pc_name,
            sp_name: self.sp_name,
            retaddr_name: self.retaddr_name,
            retval_name: self.retval_name,
            insn_alignment,
            min_insn_size,
            max_insn_size,
            isas: self.isas,
            default_isa: self.default_isa,
        })
    }
}

static REGISTRY: OnceLock<RwLock<Registry<Architecture>>> = OnceLock::new();

/// Returns the process-wide architecture catalog, creating it on first use.
pub fn registry() -> &'static RwLock<Registry<Architecture>> {
    REGISTRY.get_or_init(|| RwLock::new(Registry::new()))
}

/// Registers an architecture in the process-wide catalog.
///
/// # Errors
///
/// Fails with [`RegistryError::Duplicate`] if the name is already taken.
pub fn register(arch: Architecture) -> Result<(), RegistryError> {
    registry()
        .write()
        .expect("architecture registry lock poisoned")
        .register(arch)
}

/// Looks up an architecture in the process-wide catalog by name.
///
/// # Errors
///
/// Fails with [`RegistryError::NotFound`] if no architecture matches.
pub fn by_name(name: &str) -> Result<Arc<Architecture>, RegistryError> {
    registry()
        .read()
        .expect("architecture registry lock poisoned")
        .by_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::{Disassembler, Instruction, Interworking};
    use std::sync::Arc;

    struct NullDisassembler;
    impl Disassembler for NullDisassembler {
        fn disassemble(&self, _data: &[u8], _address: u64, _max_count: Option<usize>) -> Vec<Instruction> {
            Vec::new()
        }
    }

    struct NullAssembler;
    impl crate::isa::Assembler for NullAssembler {
        fn assemble(&self, text: &str, _address: u64) -> Result<Vec<u8>, crate::isa::AssemblyError> {
            Err(crate::isa::AssemblyError { text: text.to_string() })
        }
    }

    struct Identity;
    impl Interworking for Identity {
        fn address_to_pointer(&self, address: u64) -> u64 {
            address
        }
        fn pointer_to_address(&self, pointer: u64) -> u64 {
            pointer
        }
    }

    fn toy_isa(min: u64, max: u64, alignment: u64) -> Arc<InstructionSet> {
        Arc::new(InstructionSet::new(
            "toy",
            alignment,
            min,
            max,
            vec![max],
            Arc::new(NullAssembler),
            Arc::new(NullDisassembler),
            Arc::new(Identity),
        ))
    }

    #[test]
    fn builder_produces_consistent_architecture() {
        let arch = Architecture::builder("toyarch", 32, Endianness::Little)
            .alt_name("toy")
            .instruction_set(toy_isa(4, 4, 4))
            .build()
            .unwrap();
        assert_eq!(arch.name(), "toyarch");
        assert_eq!(arch.min_insn_size(), 4);
        assert_eq!(arch.max_insn_size(), 4);
        assert_eq!(arch.insn_alignment(), 4);
    }

    #[test]
    fn rejects_inverted_size_range() {
        let err = Architecture::builder("bad", 32, Endianness::Little)
            .instruction_set(toy_isa(8, 4, 4))
            .build()
            .unwrap_err();
        assert_eq!(err, ArchitectureError::SizeOrder { min: 8, max: 4 });
    }

    #[test]
    fn rejects_unaligned_size() {
        let err = Architecture::builder("bad", 32, Endianness::Little)
            .instruction_set(toy_isa(2, 6, 4))
            .build()
            .unwrap_err();
        assert_eq!(err, ArchitectureError::Unaligned { size: 2, alignment: 4 });
    }

    #[test]
    fn requires_at_least_one_instruction_set() {
        let err = Architecture::builder("empty", 32, Endianness::Little)
            .build()
            .unwrap_err();
        assert_eq!(err, ArchitectureError::NoInstructionSets);
    }

    #[test]
    fn registry_round_trips() {
        let arch = Architecture::builder("regtest", 64, Endianness::Little)
            .instruction_set(toy_isa(4, 4, 4))
            .build()
            .unwrap();
        register(arch).unwrap();
        assert_eq!(by_name("regtest").unwrap().bits(), 64);
    }

    struct Regs(std::collections::HashMap<String, u64>);
    impl RegisterRead for Regs {
        fn read(&self, name: &str) -> Option<u64> {
            self.0.get(name).copied()
        }
    }

    fn arm_isa() -> Arc<InstructionSet> {
        Arc::new(InstructionSet::new(
            "arm",
            4,
            4,
            4,
            vec![4],
            Arc::new(NullAssembler),
            Arc::new(NullDisassembler),
            Arc::new(Identity),
        ))
    }

    fn thumb_isa() -> Arc<InstructionSet> {
        Arc::new(InstructionSet::new(
            "thumb",
            2,
            2,
            4,
            vec![4, 2],
            Arc::new(NullAssembler),
            Arc::new(NullDisassembler),
            Arc::new(crate::isa::ThumbInterworking),
        ))
    }

    #[test]
    fn isa_from_regs_picks_default_when_pointer_matches_no_rule() {
        let arch = Architecture::builder("armthumb", 32, Endianness::Little)
            .instruction_set(arm_isa())
            .instruction_set(thumb_isa())
            .build()
            .unwrap();
        let regs = Regs(std::collections::HashMap::from([("pc".to_string(), 0x8000)]));
        assert_eq!(arch.isa_from_regs(&regs).name(), "arm");
    }

    #[test]
    fn isa_from_regs_detects_thumb_mode_from_pointer_low_bit() {
        let arch = Architecture::builder("armthumb", 32, Endianness::Little)
            .instruction_set(arm_isa())
            .instruction_set(thumb_isa())
            .build()
            .unwrap();
        let regs = Regs(std::collections::HashMap::from([("pc".to_string(), 0x8001)]));
        assert_eq!(arch.isa_from_regs(&regs).name(), "thumb");
    }

    #[test]
    fn isa_from_regs_falls_back_to_default_when_pc_unreadable() {
        let arch = Architecture::builder("armthumb", 32, Endianness::Little)
            .instruction_set(arm_isa())
            .instruction_set(thumb_isa())
            .build()
            .unwrap();
        let regs = Regs(std::collections::HashMap::new());
        assert_eq!(arch.isa_from_regs(&regs).name(), "arm");
    }
}
