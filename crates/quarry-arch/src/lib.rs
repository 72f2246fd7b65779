//! Architecture and instruction-set description.
//!
//! This crate is the static half of the toolkit: it describes CPU families
//! (`Architecture`), the instruction sets they support (`InstructionSet`),
//! their register files, and a process-wide catalog (`registry`) that other
//! crates look entries up in by name. Nothing here executes guest code; that
//! lives in `quarry-dbg`.

#![warn(clippy::pedantic)]

pub mod access;
pub mod arch;
pub mod endian;
pub mod isa;
pub mod reg;
pub mod registry;

pub use crate::access::{Access, AccessType};
pub use crate::arch::{Architecture, ArchitectureBuilder};
pub use crate::endian::Endianness;
pub use crate::isa::{Instruction, InstructionSet};
pub use crate::reg::{Register, RegisterSet};
pub use crate::registry::{Named, Registry, RegistryError};

/// Guest address.
pub type Addr = u64;
/// Guest code pointer (may differ from `Addr` under interworking).
pub type Pointer = u64;
