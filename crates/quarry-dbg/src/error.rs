//! Error taxonomy for register access, hook installation, and guest
//! execution faults.

use thiserror::Error;

use quarry_arch::isa::{AssemblyError, DisassemblyError};
use quarry_arch::{Access, Addr};
use quarry_mem::{FaultCause, MemoryAccessError};

use crate::hook::HookKind;

/// A guest CPU fault encountered while [`Debugger::run`](crate::debugger::Debugger::run)
/// was driving execution.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("memory fault at {pc:#x}: {cause:?} during {access:?}")]
pub struct MemFaultError {
    /// Program counter at the time of the fault.
    pub pc: Addr,
    /// Why the access was rejected.
    pub cause: FaultCause,
    /// The access that triggered the fault.
    pub access: Access,
}

/// The guest CPU fetched bytes that do not decode to a valid instruction.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("invalid instruction at {pc:#x}")]
pub struct InvalidInsnError {
    /// Address the fetch was attempted at.
    pub pc: Addr,
}

/// Any other engine failure that doesn't fit the fault/invalid-instruction
/// taxonomy, carrying the backend's own message verbatim.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("cpu error at {pc:#x}: {message}")]
pub struct CpuError {
    /// Program counter at the time of the error, if known.
    pub pc: Addr,
    /// Backend-supplied description.
    pub message: String,
}

/// Failure from any debugger- or emulator-level operation.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DbgError {
    /// No register with that name exists for this architecture.
    #[error("register `{0}` not found")]
    UnknownRegister(String),
    /// A backend refused to install a hook of this kind (see spec section
    /// 4.6: data hooks are optional; backends may refuse).
    #[error("hook kind {kind:?} is not supported by this backend")]
    UnsupportedHook {
        /// The kind of hook that was rejected.
        kind: HookKind,
    },
    #[error(transparent)]
    Memory(#[from] MemoryAccessError),
    #[error(transparent)]
    Disassembly(#[from] DisassemblyError),
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    #[error(transparent)]
    Fault(#[from] MemFaultError),
    #[error(transparent)]
    InvalidInsn(#[from] InvalidInsnError),
    #[error(transparent)]
    Cpu(#[from] CpuError),
}
