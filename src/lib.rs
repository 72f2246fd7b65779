//! Multi-architecture binary analysis and emulation toolkit.
//!
//! This crate is a thin facade over the toolkit's three core crates:
//! [`arch`] (the architecture/ISA registry), [`mem`] (segmented guest
//! memory), and [`dbg`] (the debugger/emulator core). Executable-format
//! parsing, CLI tooling, and concrete assembler/disassembler/emulator
//! backends are external collaborators and live outside this workspace.

#![warn(clippy::pedantic)]

/// Architecture and instruction-set description.
pub use quarry_arch as arch;
/// Debugger and emulator core.
pub use quarry_dbg as dbg;
/// Segmented guest memory.
pub use quarry_mem as mem;
