//! Indexed, alias-aware access to a live [`Debugger`]'s registers.

use quarry_arch::Addr;

use crate::debugger::Debugger;
use crate::error::DbgError;

/// A live view onto a [`Debugger`]'s registers.
///
/// Rust has no dynamic attribute dispatch, so the source project's
/// `regs.gen_pc`/`regs.retval`-style access becomes explicit alias
/// resolution in [`Registers::get`]/[`Registers::set`]: `"gen_pc"`,
/// `"gen_sp"`, `"retaddr"`, and `"retval"` resolve against the owning
/// architecture before reaching the debugger, everything else passes
/// through unchanged.
pub struct Registers<'a, D> {
    debugger: &'a mut D,
}

impl<'a, D: Debugger> Registers<'a, D> {
    pub(crate) fn new(debugger: &'a mut D) -> Self {
        Self { debugger }
    }

    fn resolve(&self, name: &str) -> Result<String, DbgError> {
        let arch = self.debugger.arch();
        let resolved = match name {
            "gen_pc" => arch.pc_name().to_string(),
            "gen_sp" => arch.sp_name().to_string(),
            "retaddr" => arch
                .retaddr_name()
                .ok_or_else(|| DbgError::UnknownRegister(name.to_string()))?
                .to_string(),
            "retval" => arch
                .retval_name()
                .ok_or_else(|| DbgError::UnknownRegister(name.to_string()))?
                .to_string(),
            other => other.to_string(),
        };
        Ok(resolved)
    }

    /// Reads a register by name, resolving well-known aliases first.
    ///
    /// # Errors
    ///
    /// Fails with [`DbgError::UnknownRegister`] if the resolved register
    /// does not exist, or if an alias has no mapping for this architecture.
    pub fn get(&self, name: &str) -> Result<u64, DbgError> {
        let resolved = self.resolve(name)?;
        self.debugger.get_reg(&resolved)
    }

    /// Writes a register by name, resolving well-known aliases first.
    ///
    /// # Errors
    ///
    /// As [`Registers::get`].
    pub fn set(&mut self, name: &str, value: u64) -> Result<(), DbgError> {
        let resolved = self.resolve(name)?;
        self.debugger.set_reg(&resolved, value)
    }

    /// Program counter (`gen_pc` alias).
    ///
    /// # Errors
    ///
    /// As [`Registers::get`].
    pub fn pc(&self) -> Result<Addr, DbgError> {
        self.get("gen_pc")
    }

    /// Stack pointer (`gen_sp` alias).
    ///
    /// # Errors
    ///
    /// As [`Registers::get`].
    pub fn sp(&self) -> Result<Addr, DbgError> {
        self.get("gen_sp")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use quarry_arch::isa::{AssemblyError, Assembler, Disassembler, IdentityInterworking, Instruction};
    use quarry_arch::{Architecture, Endianness, InstructionSet, Register};
    use std::sync::Arc;

    use super::*;
    use crate::hook::{HookHandle, HookKind, HookTarget, StopReason};
    use crate::stack::Stack;

    struct NullAsm;
    impl Assembler for NullAsm {
        fn assemble(&self, text: &str, _address: Addr) -> Result<Vec<u8>, AssemblyError> {
            Err(AssemblyError { text: text.to_string() })
        }
    }
    struct NullDis;
    impl Disassembler for NullDis {
        fn disassemble(&self, _data: &[u8], _address: Addr, _max_count: Option<usize>) -> Vec<Instruction> {
            Vec::new()
        }
    }

    fn toy_arch() -> Arc<Architecture> {
        let isa = Arc::new(InstructionSet::new(
            "toy",
            1,
            1,
            1,
            vec![1],
            Arc::new(NullAsm),
            Arc::new(NullDis),
            Arc::new(IdentityInterworking),
        ));
        let mut regs = quarry_arch::RegisterSet::new();
        regs.insert(Register::new("pc", 32, 0)).unwrap();
        regs.insert(Register::new("sp", 32, 1)).unwrap();
        regs.insert(Register::new("lr", 32, 2)).unwrap();
        regs.insert(Register::new("r0", 32, 3)).unwrap();
        Arc::new(
            Architecture::builder("toy", 32, Endianness::Little)
                .regs(regs)
                .retaddr_name("lr")
                .retval_name("r0")
                .instruction_set(isa)
                .build()
                .unwrap(),
        )
    }

    /// A minimal [`Debugger`] whose state is just a register file, enough
    /// to exercise alias resolution without an emulator backend.
    struct Toy {
        arch: Arc<Architecture>,
        regs: HashMap<String, u64>,
    }

    impl Toy {
        fn new() -> Self {
            Self { arch: toy_arch(), regs: HashMap::new() }
        }
    }

    impl Debugger for Toy {
        fn arch(&self) -> &Architecture {
            &self.arch
        }

        fn get_reg(&self, name: &str) -> Result<u64, DbgError> {
            self.arch
                .regs()
                .get(name)
                .map_err(|_| DbgError::UnknownRegister(name.to_string()))?;
            Ok(*self.regs.get(&name.to_lowercase()).unwrap_or(&0))
        }

        fn set_reg(&mut self, name: &str, value: u64) -> Result<(), DbgError> {
            self.arch
                .regs()
                .get(name)
                .map_err(|_| DbgError::UnknownRegister(name.to_string()))?;
            self.regs.insert(name.to_lowercase(), value);
            Ok(())
        }

        fn pc(&self) -> Result<Addr, DbgError> {
            self.get_reg(self.arch.pc_name())
        }

        fn set_pc(&mut self, addr: Addr) -> Result<(), DbgError> {
            let name = self.arch.pc_name().to_string();
            self.set_reg(&name, addr)
        }

        fn sp(&self) -> Result<Addr, DbgError> {
            self.get_reg(self.arch.sp_name())
        }

        fn set_sp(&mut self, addr: Addr) -> Result<(), DbgError> {
            let name = self.arch.sp_name().to_string();
            self.set_reg(&name, addr)
        }

        fn read_word(&self, _addr: Addr) -> Result<u64, DbgError> {
            unimplemented!("not needed for register-alias tests")
        }

        fn write_word(&mut self, _addr: Addr, _value: u64) -> Result<(), DbgError> {
            unimplemented!("not needed for register-alias tests")
        }

        fn jump(&mut self, addr: Addr, _isa: Option<&InstructionSet>) -> Result<(), DbgError> {
            self.set_pc(addr)
        }

        fn run(&mut self, _count: Option<u64>, _address: Option<Addr>, _isa: Option<&InstructionSet>) -> Result<StopReason, DbgError> {
            Ok(StopReason::Count)
        }

        fn add_hook(&mut self, _kind: HookKind, _target: HookTarget, _callback: crate::debugger::HookFn<Self>) -> Result<HookHandle, DbgError> {
            Err(DbgError::UnsupportedHook { kind: HookKind::Code })
        }

        fn remove_hook(&mut self, _handle: HookHandle) {}

        fn stop(&mut self) -> Result<(), DbgError> {
            Ok(())
        }

        fn current_hook(&self) -> Option<HookHandle> {
            None
        }

        fn current_access(&self) -> Option<quarry_arch::Access> {
            None
        }

        fn disassemble(&self, _count: usize) -> Result<Vec<Instruction>, DbgError> {
            Ok(Vec::new())
        }

        fn return_from_function(&mut self, _retval: Option<u64>) -> Result<(), DbgError> {
            Ok(())
        }
    }

    #[test]
    fn gen_pc_resolves_to_architecture_pc_name() {
        let mut toy = Toy::new();
        toy.set_reg("pc", 0x1000).unwrap();
        assert_eq!(toy.regs().get("gen_pc").unwrap(), 0x1000);
    }

    #[test]
    fn retaddr_and_retval_resolve_through_architecture() {
        let mut toy = Toy::new();
        toy.regs().set("retaddr", 0x2000).unwrap();
        toy.regs().set("retval", 7).unwrap();
        assert_eq!(toy.get_reg("lr").unwrap(), 0x2000);
        assert_eq!(toy.get_reg("r0").unwrap(), 7);
    }

    #[test]
    fn plain_names_pass_through_unresolved() {
        let mut toy = Toy::new();
        toy.regs().set("r0", 42).unwrap();
        assert_eq!(toy.regs().get("r0").unwrap(), 42);
    }

    #[test]
    fn unmapped_alias_is_an_error() {
        let mut toy = Toy {
            arch: {
                let isa = toy_arch().instruction_sets()[0].clone();
                Arc::new(
                    Architecture::builder("no_aliases", 32, Endianness::Little)
                        .instruction_set(isa)
                        .build()
                        .unwrap(),
                )
            },
            regs: HashMap::new(),
        };
        assert!(matches!(toy.regs().get("retaddr"), Err(DbgError::UnknownRegister(_))));
    }

    #[allow(dead_code)]
    fn use_stack_type(_s: Stack<'_, Toy>) {}
}
