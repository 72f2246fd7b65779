//! Guest execution: the abstract [`Debugger`] controller, its register and
//! stack views, hook registration, and the [`Emulator`] that concretizes it
//! on top of an external CPU emulation engine.
//!
//! `quarry-arch` describes what a CPU family looks like; `quarry-mem`
//! describes its address space; this crate is where code actually runs.

#![warn(clippy::pedantic)]

pub mod debugger;
pub mod emu;
pub mod error;
pub mod hook;
pub mod regs;
pub mod stack;

pub use debugger::{Debugger, HookFn};
pub use emu::{Emulator, EmulatorBackend, ExecutableImage, StepOutcome};
pub use error::{CpuError, DbgError, InvalidInsnError, MemFaultError};
pub use hook::{HookHandle, HookKind, HookTarget, StopReason};
pub use regs::Registers;
pub use stack::Stack;
