//! The abstract execution controller.

use quarry_arch::isa::Instruction;
use quarry_arch::{Access, Addr, Architecture, InstructionSet};

use crate::error::DbgError;
use crate::hook::{HookHandle, HookKind, HookTarget, StopReason};
use crate::regs::Registers;
use crate::stack::Stack;

/// A hook callback: given mutable access to the debugger that dispatched it,
/// a callback may read or write registers and memory, install or remove
/// hooks, and call [`Debugger::stop`].
pub type HookFn<D> = Box<dyn FnMut(&mut D)>;

/// An execution controller driving a guest CPU through an underlying
/// emulation engine, with user-installed hooks.
///
/// [`Emulator`](crate::emu::Emulator) is the sole concrete implementor in
/// this toolkit; the trait exists so [`Registers`], [`Stack`], and hook
/// callbacks can be written once against an abstract debugger rather than
/// against a specific backend. `Self: Sized` is required because hook
/// callbacks are `FnMut(&mut Self)`, not `FnMut(&mut dyn Debugger)`: a single
/// concrete backend type owns its own hook table, so there is no need to pay
/// for dynamic dispatch on every hook invocation.
pub trait Debugger: Sized {
    /// The architecture this debugger's guest CPU implements.
    fn arch(&self) -> &Architecture;

    /// Reads a register's raw value by name.
    ///
    /// # Errors
    ///
    /// Fails with [`DbgError::UnknownRegister`] if no register with that
    /// name exists.
    fn get_reg(&self, name: &str) -> Result<u64, DbgError>;

    /// Writes a register's raw value by name.
    ///
    /// # Errors
    ///
    /// Fails with [`DbgError::UnknownRegister`] if no register with that
    /// name exists.
    fn set_reg(&mut self, name: &str, value: u64) -> Result<(), DbgError>;

    /// An indexed, alias-aware view onto this debugger's registers.
    fn regs(&mut self) -> Registers<'_, Self> {
        Registers::new(self)
    }

    /// Program counter, resolved through the architecture's `pc` alias.
    ///
    /// # Errors
    ///
    /// As [`Debugger::get_reg`].
    fn pc(&self) -> Result<Addr, DbgError>;

    /// Sets the program counter directly (no ISA round-trip; see
    /// [`Debugger::jump`] for that).
    ///
    /// # Errors
    ///
    /// As [`Debugger::set_reg`].
    fn set_pc(&mut self, addr: Addr) -> Result<(), DbgError>;

    /// Stack pointer, resolved through the architecture's `sp` alias.
    ///
    /// # Errors
    ///
    /// As [`Debugger::get_reg`].
    fn sp(&self) -> Result<Addr, DbgError>;

    /// Sets the stack pointer directly.
    ///
    /// # Errors
    ///
    /// As [`Debugger::set_reg`].
    fn set_sp(&mut self, addr: Addr) -> Result<(), DbgError>;

    /// A view supporting indexed, push/pop access to the guest stack.
    fn stack(&mut self) -> Stack<'_, Self> {
        Stack::new(self)
    }

    /// Reads a native-width word from guest memory.
    ///
    /// # Errors
    ///
    /// As the underlying memory access.
    fn read_word(&self, addr: Addr) -> Result<u64, DbgError>;

    /// Writes a native-width word to guest memory.
    ///
    /// # Errors
    ///
    /// As the underlying memory access.
    fn write_word(&mut self, addr: Addr, value: u64) -> Result<(), DbgError>;

    /// Sets the program counter to `addr`, round-tripped through `isa`'s
    /// pointer encoding if given, so the target instruction set is
    /// explicitly encoded (e.g. the Thumb bit for ARM/Thumb interworking).
    ///
    /// # Errors
    ///
    /// As [`Debugger::set_pc`].
    fn jump(&mut self, addr: Addr, isa: Option<&InstructionSet>) -> Result<(), DbgError>;

    /// Runs the guest, optionally jumping to `address` first, until `count`
    /// instructions have executed (if given), a hook calls
    /// [`Debugger::stop`], or the guest faults.
    ///
    /// # Errors
    ///
    /// Fails with [`DbgError::Fault`], [`DbgError::InvalidInsn`], or
    /// [`DbgError::Cpu`] if the guest faults during execution.
    fn run(
        &mut self,
        count: Option<u64>,
        address: Option<Addr>,
        isa: Option<&InstructionSet>,
    ) -> Result<StopReason, DbgError>;

    /// Runs exactly one instruction. Equivalent to `run(Some(1), None,
    /// None)`.
    ///
    /// # Errors
    ///
    /// As [`Debugger::run`].
    fn step(&mut self) -> Result<StopReason, DbgError> {
        self.run(Some(1), None, None)
    }

    /// Installs a hook of `kind` over `target`.
    ///
    /// # Errors
    ///
    /// Fails with [`DbgError::UnsupportedHook`] if this backend does not
    /// support hooks of `kind` (data hooks are optional; see spec section
    /// 4.6).
    fn add_hook(&mut self, kind: HookKind, target: HookTarget, callback: HookFn<Self>) -> Result<HookHandle, DbgError>;

    /// Installs a code hook, fired before the instruction at a matching
    /// address executes.
    ///
    /// # Errors
    ///
    /// As [`Debugger::add_hook`].
    fn add_code_hook(&mut self, target: HookTarget, callback: HookFn<Self>) -> Result<HookHandle, DbgError> {
        self.add_hook(HookKind::Code, target, callback)
    }

    /// Installs a read-access hook.
    ///
    /// # Errors
    ///
    /// As [`Debugger::add_hook`].
    fn add_read_hook(&mut self, target: HookTarget, callback: HookFn<Self>) -> Result<HookHandle, DbgError> {
        self.add_hook(HookKind::Read, target, callback)
    }

    /// Installs a write-access hook.
    ///
    /// # Errors
    ///
    /// As [`Debugger::add_hook`].
    fn add_write_hook(&mut self, target: HookTarget, callback: HookFn<Self>) -> Result<HookHandle, DbgError> {
        self.add_hook(HookKind::Write, target, callback)
    }

    /// Installs a code hook over every address.
    ///
    /// # Errors
    ///
    /// As [`Debugger::add_hook`].
    fn trace(&mut self, callback: HookFn<Self>) -> Result<HookHandle, DbgError> {
        self.add_code_hook(HookTarget::All, callback)
    }

    /// Installs a code hook at `addr` whose callback stops execution.
    ///
    /// # Errors
    ///
    /// As [`Debugger::add_hook`].
    fn add_breakpoint(&mut self, addr: Addr) -> Result<HookHandle, DbgError> {
        self.add_code_hook(
            HookTarget::point(addr),
            Box::new(|dbg: &mut Self| {
                let _ = dbg.stop();
            }),
        )
    }

    /// Detaches a previously installed hook. Removing an unknown or
    /// already-removed handle is not an error.
    fn remove_hook(&mut self, handle: HookHandle);

    /// Requests that the in-progress [`Debugger::run`] stop once the
    /// current hook callback returns.
    ///
    /// Must be called from within a hook callback; the owning `run` records
    /// `stop_reason = Hook(current_hook)` and returns after the callback
    /// completes.
    ///
    /// # Errors
    ///
    /// This method itself cannot fail; it returns `Result` for symmetry
    /// with the rest of the hook-facing API.
    fn stop(&mut self) -> Result<(), DbgError>;

    /// The hook currently executing, if any. Non-`None` only while a hook
    /// callback is running.
    fn current_hook(&self) -> Option<HookHandle>;

    /// The access that triggered the currently executing hook, if any.
    fn current_access(&self) -> Option<Access>;

    /// Disassembles `count` instructions starting at the current program
    /// counter, using the architecture's currently active instruction set.
    ///
    /// # Errors
    ///
    /// Fails with [`DbgError::Memory`] if fewer than `count` instructions
    /// decode.
    fn disassemble(&self, count: usize) -> Result<Vec<Instruction>, DbgError>;

    /// The single instruction at the current program counter.
    ///
    /// # Errors
    ///
    /// As [`Debugger::disassemble`].
    fn curr_insn(&self) -> Result<Instruction, DbgError> {
        Ok(self.disassemble(1)?.remove(0))
    }

    /// Returns from the current function: sets `retval` if given, then sets
    /// `pc` from the architecture's return-address register if it has one,
    /// else pops a return address off the stack.
    ///
    /// # Errors
    ///
    /// As register/memory access.
    fn return_from_function(&mut self, retval: Option<u64>) -> Result<(), DbgError>;

    /// Installs a code hook at `addr` that runs `callback`, takes its
    /// return value (if `Some`) as the function's return value, then
    /// performs [`Debugger::return_from_function`].
    ///
    /// # Errors
    ///
    /// As [`Debugger::add_hook`].
    fn replace_function(
        &mut self,
        addr: Addr,
        mut callback: Box<dyn FnMut(&mut Self) -> Option<u64>>,
    ) -> Result<HookHandle, DbgError> {
        self.add_code_hook(
            HookTarget::point(addr),
            Box::new(move |dbg: &mut Self| {
                let retval = callback(dbg);
                if let Err(err) = dbg.return_from_function(retval) {
                    log::warn!("replace_function at {addr:#x}: failed to return: {err}");
                }
            }),
        )
    }
}
