//! Hook registration types shared by every execution loop.

use quarry_arch::Addr;

/// Which class of guest event a hook is notified of.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum HookKind {
    /// Fires before the instruction at a matching address executes.
    Code,
    /// Fires after a matching memory read completes.
    Read,
    /// Fires after a matching memory write completes.
    Write,
}

/// The address range a hook is installed over.
///
/// `All` is the Rust rendering of the source project's `ALL` sentinel
/// address: it matches every address regardless of `size`, used by
/// [`trace`](crate::debugger::Debugger::trace) and by backends that encode
/// "every address" as the empty range `[1, 0]` at the FFI boundary.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HookTarget {
    /// A concrete `[address, address + size)` range.
    Range {
        /// First address covered.
        address: Addr,
        /// Number of addresses covered, starting at `address`.
        size: u64,
    },
    /// Matches every address.
    All,
}

impl HookTarget {
    /// A single-address range, as installed by
    /// [`add_breakpoint`](crate::debugger::Debugger::add_breakpoint).
    #[must_use]
    pub fn point(address: Addr) -> Self {
        Self::Range { address, size: 1 }
    }

    /// Whether `address` falls within this target.
    #[must_use]
    pub fn contains(&self, address: Addr) -> bool {
        match *self {
            Self::All => true,
            Self::Range { address: start, size } => (start..start + size.max(1)).contains(&address),
        }
    }
}

/// An opaque, stable identifier for an installed hook.
///
/// Handles are not reused within a debugger's lifetime; removing a hook
/// invalidates its handle.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct HookHandle(u64);

impl HookHandle {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Why a call to [`Debugger::run`](crate::debugger::Debugger::run) returned.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StopReason {
    /// The requested instruction count was reached.
    Count,
    /// A hook called [`Debugger::stop`](crate::debugger::Debugger::stop).
    Hook(HookHandle),
}
