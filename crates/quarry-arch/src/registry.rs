//! Generic, name-indexed catalog of process-wide entries.
//!
//! Architectures, instruction sets, and (outside this crate) executable
//! formats are all registered once at start-up and looked up by name for the
//! rest of the process's life. This mirrors the source project's
//! `DatabaseEntry` class, reshaped as the Rust idiom called for in
//! spec section 9: a module-level table with interior mutability guarded by
//! a one-shot initializer, entries referenced through stable handles
//! (`Arc`) rather than raw back-pointers.

use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;

/// An entry that can live in a [`Registry`].
pub trait Named {
    /// Canonical, unique name.
    fn name(&self) -> &str;

    /// Additional names this entry may be looked up by.
    fn alt_names(&self) -> &[String] {
        &[]
    }
}

/// A name-indexed catalog of entries of one kind.
///
/// Lookup is case-insensitive and matches either the canonical name or any
/// alternate name. Iteration order is registration order.
#[derive(Debug)]
pub struct Registry<T> {
    by_name: IndexMap<String, Arc<T>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            by_name: IndexMap::new(),
        }
    }
}

/// A catalog operation failed.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RegistryError {
    /// entry `{0}` was not found
    #[error("entry `{0}` was not found")]
    NotFound(String),
    /// entry `{0}` is already registered
    #[error("entry `{0}` is already registered")]
    Duplicate(String),
}

impl<T: Named> Registry<T> {
    /// Constructs an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new entry.
    ///
    /// # Errors
    ///
    /// Fails with [`RegistryError::Duplicate`] if the entry's canonical name
    /// or any of its alternate names is already registered under this
    /// catalog.
    pub fn register(&mut self, entry: T) -> Result<(), RegistryError> {
        let canonical = entry.name().to_lowercase();
        let alts: Vec<String> = entry.alt_names().iter().map(|s| s.to_lowercase()).collect();
        for key in std::iter::once(&canonical).chain(alts.iter()) {
            if self.by_name.contains_key(key) {
                return Err(RegistryError::Duplicate(key.clone()));
            }
        }
        let entry = Arc::new(entry);
        self.by_name.insert(canonical, Arc::clone(&entry));
        for alt in alts {
            self.by_name.insert(alt, Arc::clone(&entry));
        }
        Ok(())
    }

    /// Looks up an entry by canonical or alternate name, case-insensitively.
    ///
    /// # Errors
    ///
    /// Fails with [`RegistryError::NotFound`] if no entry matches.
    pub fn by_name(&self, name: &str) -> Result<Arc<T>, RegistryError> {
        self.by_name
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Iterates over all distinct registered entries, in registration order.
    pub fn all(&self) -> impl Iterator<Item = &Arc<T>> {
        // `by_name` holds one entry per alias, so filter down to first
        // occurrence (the canonical-name insertion) by pointer identity.
        let mut seen = Vec::new();
        self.by_name.values().filter(move |entry| {
            let ptr = Arc::as_ptr(entry) as *const ();
            if seen.contains(&ptr) {
                false
            } else {
                seen.push(ptr);
                true
            }
        })
    }

    /// Iterates over the canonical names of all registered entries.
    pub fn all_names(&self) -> impl Iterator<Item = &str> {
        self.all().map(|entry| entry.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Entry {
        name: &'static str,
        alt: Vec<String>,
    }

    impl Named for Entry {
        fn name(&self) -> &str {
            self.name
        }

        fn alt_names(&self) -> &[String] {
            &self.alt
        }
    }

    #[test]
    fn register_and_lookup_by_canonical_name() {
        let mut reg = Registry::new();
        reg.register(Entry {
            name: "arm64",
            alt: vec!["aarch64".into()],
        })
        .unwrap();

        assert_eq!(reg.by_name("ARM64").unwrap().name(), "arm64");
        assert_eq!(reg.by_name("aarch64").unwrap().name(), "arm64");
        assert_eq!(reg.by_name("AArch64").unwrap().name(), "arm64");
    }

    #[test]
    fn unknown_name_fails() {
        let reg: Registry<Entry> = Registry::new();
        assert_eq!(
            reg.by_name("missing"),
            Err(RegistryError::NotFound("missing".into()))
        );
    }

    #[test]
    fn duplicate_canonical_name_fails() {
        let mut reg = Registry::new();
        reg.register(Entry {
            name: "arm",
            alt: vec![],
        })
        .unwrap();
        assert!(reg
            .register(Entry {
                name: "arm",
                alt: vec![],
            })
            .is_err());
    }

    #[test]
    fn duplicate_alt_name_fails() {
        let mut reg = Registry::new();
        reg.register(Entry {
            name: "arm",
            alt: vec!["armv7".into()],
        })
        .unwrap();
        assert!(reg
            .register(Entry {
                name: "thumb",
                alt: vec!["armv7".into()],
            })
            .is_err());
    }

    #[test]
    fn iteration_is_registration_order_and_deduplicated() {
        let mut reg = Registry::new();
        reg.register(Entry {
            name: "a",
            alt: vec!["alpha".into()],
        })
        .unwrap();
        reg.register(Entry {
            name: "b",
            alt: vec![],
        })
        .unwrap();
        let names: Vec<_> = reg.all_names().collect();
        assert_eq!(names, ["a", "b"]);
    }
}
