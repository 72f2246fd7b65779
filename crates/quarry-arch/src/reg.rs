//! Register descriptions and register files.

use indexmap::IndexMap;
use thiserror::Error;

/// Description of a single architectural register.
///
/// Immutable once constructed: registers are described once, when an
/// [`Architecture`](crate::Architecture) is built, and never change shape
/// afterwards.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Register {
    name: String,
    bits: u32,
    backend_id: u32,
}

impl Register {
    /// Constructs a new register description.
    #[must_use]
    pub fn new(name: impl Into<String>, bits: u32, backend_id: u32) -> Self {
        Self {
            name: name.into(),
            bits,
            backend_id,
        }
    }

    /// The register's name, as registered (case preserved).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Width of the register in bits.
    #[must_use]
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Opaque identifier used to address this register in a backend
    /// (assembler/disassembler/emulator) capability.
    #[must_use]
    pub fn backend_id(&self) -> u32 {
        self.backend_id
    }
}

/// A name-indexed set of registers belonging to one architecture.
///
/// Keys are lowercased on insertion and lookup, so callers may use any
/// casing; iteration order is registration order, matching the source
/// project's `IndexMap`-backed tables.
#[derive(Clone, Debug, Default)]
pub struct RegisterSet {
    regs: IndexMap<String, Register>,
}

impl RegisterSet {
    /// Constructs an empty register set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a register to the set.
    ///
    /// # Errors
    ///
    /// Fails if a register with the same (lowercased) name is already
    /// present.
    pub fn insert(&mut self, reg: Register) -> Result<(), DuplicateRegister> {
        let key = reg.name.to_lowercase();
        if self.regs.contains_key(&key) {
            return Err(DuplicateRegister(reg.name));
        }
        self.regs.insert(key, reg);
        Ok(())
    }

    /// Looks up a register by name (case-insensitive).
    ///
    /// # Errors
    ///
    /// Fails if no register with that name was registered.
    pub fn get(&self, name: &str) -> Result<&Register, UnknownRegister> {
        self.regs
            .get(&name.to_lowercase())
            .ok_or_else(|| UnknownRegister(name.to_string()))
    }

    /// Returns whether a register with the given name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.regs.contains_key(&name.to_lowercase())
    }

    /// Iterates over registers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Register> {
        self.regs.values()
    }

    /// Number of registers in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regs.len()
    }

    /// Returns whether the set has no registers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regs.is_empty()
    }
}

/// Attempted to register two registers under the same name.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("register `{0}` already exists")]
pub struct DuplicateRegister(pub String);

/// A lookup failure on a [`RegisterSet`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("no such register `{0}`")]
pub struct UnknownRegister(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    fn set() -> RegisterSet {
        let mut regs = RegisterSet::new();
        regs.insert(Register::new("X0", 64, 0)).unwrap();
        regs.insert(Register::new("SP", 64, 1)).unwrap();
        regs
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let regs = set();
        assert_eq!(regs.get("x0").unwrap().backend_id(), 0);
        assert_eq!(regs.get("X0").unwrap().backend_id(), 0);
    }

    #[test]
    fn duplicate_insert_fails() {
        let mut regs = set();
        assert!(regs.insert(Register::new("x0", 64, 2)).is_err());
    }

    #[test]
    fn iteration_preserves_registration_order() {
        let regs = set();
        let names: Vec<_> = regs.iter().map(Register::name).collect();
        assert_eq!(names, ["X0", "SP"]);
    }

    #[test]
    fn unknown_register_errors() {
        let regs = set();
        assert!(regs.get("pc").is_err());
    }
}
