//! A [`Debugger`] concretized on top of an external CPU emulation engine.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;

use quarry_arch::arch::RegisterRead;
use quarry_arch::isa::Instruction;
use quarry_arch::{Access, AccessType, Addr, Architecture, InstructionSet, Pointer, Register};
use quarry_mem::{FaultCause, Limits, Mappable, MappableError, Memory, MemoryAccessError, RawMemory, Segment, Segmented, Splittable};

use crate::debugger::{Debugger, HookFn};
use crate::error::{CpuError, DbgError, InvalidInsnError, MemFaultError};
use crate::hook::{HookHandle, HookKind, HookTarget, StopReason};

/// The external collaborator an [`Emulator`] drives: a CPU emulation
/// engine capable of stepping one guest instruction at a time.
///
/// An external collaborator (spec section 6's "emulator capability"): this
/// toolkit is agnostic about which concrete engine implements it. Unlike a
/// real FFI-callback-driven engine, [`EmulatorBackend::step`] is a single
/// synchronous call returning everything that happened during the step —
/// the emulator core classifies the result and dispatches hooks itself,
/// rather than the backend calling back into user code.
pub trait EmulatorBackend {
    /// Error type surfaced for engine-level failures that don't fit the
    /// fault/invalid-instruction/cpu-error taxonomy at the [`StepOutcome`]
    /// level (construction or mapping failures).
    type Error: fmt::Display;

    /// Reads a register's current value from the engine.
    fn read_reg(&self, reg: &Register) -> u64;

    /// Writes a register's value into the engine.
    fn write_reg(&mut self, reg: &Register, value: u64);

    /// Maps `size` bytes at `address` with `perms`, zero-initialized.
    ///
    /// # Errors
    ///
    /// Fails if the engine rejects the mapping (e.g. unaligned address).
    fn map(&mut self, address: Addr, size: u64, perms: AccessType) -> Result<(), Self::Error>;

    /// Unmaps `size` bytes at `address`.
    ///
    /// # Errors
    ///
    /// Fails if the engine rejects the request.
    fn unmap(&mut self, address: Addr, size: u64) -> Result<(), Self::Error>;

    /// Reads `size` bytes of guest memory starting at `address`.
    ///
    /// # Errors
    ///
    /// Fails if the range is not mapped in the engine.
    fn read_mem(&self, address: Addr, size: u64) -> Result<Vec<u8>, Self::Error>;

    /// Writes `data` into guest memory starting at `address`.
    ///
    /// # Errors
    ///
    /// Fails if the range is not mapped in the engine.
    fn write_mem(&mut self, address: Addr, data: &[u8]) -> Result<(), Self::Error>;

    /// Executes a single guest instruction starting at `pointer` (the raw
    /// program-counter encoding, with any interworking bit already set).
    fn step(&mut self, pointer: Pointer) -> StepOutcome<Self::Error>;

    /// Whether this engine can report read/write accesses for data hooks.
    /// Backends that cannot must still accept code hooks.
    fn supports_data_hooks(&self) -> bool {
        false
    }
}

/// The classified result of one [`EmulatorBackend::step`] call.
pub enum StepOutcome<E> {
    /// The instruction executed normally.
    Ok {
        /// Program counter after the step (the engine's own encoding).
        executed: Pointer,
        /// Memory accesses performed while executing, for data-hook
        /// dispatch. Always empty if [`EmulatorBackend::supports_data_hooks`]
        /// is `false`.
        accesses: Vec<Access>,
    },
    /// The engine fetched bytes that do not decode to a valid instruction.
    InvalidInsn {
        /// Program counter at the failed fetch.
        pc: Addr,
    },
    /// The engine hit a memory fault while executing.
    Fault {
        /// Program counter at the time of the fault.
        pc: Addr,
        /// Why the access was rejected.
        cause: FaultCause,
        /// The access that triggered the fault.
        access: Access,
    },
    /// Any other engine failure, carrying its own message.
    Cpu {
        /// Program counter at the time of the error.
        pc: Addr,
        /// Backend-supplied description.
        message: String,
    },
    /// The backend's own error type, for failures unrelated to guest
    /// execution semantics (e.g. internal engine corruption).
    BackendError(E),
}

struct HookEntry<D> {
    kind: HookKind,
    target: HookTarget,
    callback: HookFn<D>,
}

/// A concrete [`Debugger`] driving `B` through guest execution, with its
/// own segment table and user-installed hooks.
///
/// Grounded on the source project's `Emulator`: memory operations delegate
/// to the engine (`B`) rather than an owned buffer, and `run` classifies
/// whatever the engine reports into the debugger's fault taxonomy.
pub struct Emulator<B: EmulatorBackend> {
    arch: Arc<Architecture>,
    backend: B,
    limits: Limits,
    verbose: bool,
    segments: IndexMap<String, Segment>,
    hooks: IndexMap<HookHandle, Rc<RefCell<HookEntry<Emulator<B>>>>>,
    next_hook_id: u64,
    current_hook: Option<HookHandle>,
    current_access: Option<Access>,
    stop_requested: bool,
    stop_reason: Option<StopReason>,
    start_pc: Addr,
}

/// Clears `current_hook`/`current_access` when a hook callback's scope ends,
/// including by unwinding, so a panicking hook never leaves stale state
/// behind for the next one.
struct HookScopeGuard<'a, B: EmulatorBackend> {
    emulator: &'a mut Emulator<B>,
}

impl<B: EmulatorBackend> Drop for HookScopeGuard<'_, B> {
    fn drop(&mut self) {
        self.emulator.current_hook = None;
        self.emulator.current_access = None;
    }
}

impl<B: EmulatorBackend> Emulator<B> {
    /// Constructs a new emulator for `arch`, driven by `backend`, with no
    /// mapped segments and [`Limits::default`].
    #[must_use]
    pub fn new(arch: Arc<Architecture>, backend: B) -> Self {
        Self {
            arch,
            backend,
            limits: Limits::default(),
            verbose: false,
            segments: IndexMap::new(),
            hooks: IndexMap::new(),
            next_hook_id: 0,
            current_hook: None,
            current_access: None,
            stop_requested: false,
            stop_reason: None,
            start_pc: 0,
        }
    }

    /// Overrides the configuration limits used for allocation and chunking.
    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Enables `trace`-level logging of richer operations.
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// The underlying execution engine.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Program counter recorded when the most recent [`Debugger::run`]
    /// started.
    #[must_use]
    pub fn start_pc(&self) -> Addr {
        self.start_pc
    }

    /// Builds a fresh emulator for `arch`/`backend` and copies every
    /// segment (name, range, permissions, and contents) out of `source`.
    ///
    /// Grounded on the source project's `Emulator.from_memory`.
    ///
    /// # Errors
    ///
    /// Fails if a segment from `source` cannot be mapped or its contents
    /// cannot be written into the engine.
    pub fn from_memory<M: Memory + Segmented>(arch: Arc<Architecture>, backend: B, source: &M) -> Result<Self, DbgError> {
        let mut emulator = Self::new(arch, backend);
        for segment in source.iter() {
            let data = source.read_bytes(segment.start(), segment.size())?;
            emulator.map(segment.name().to_string(), segment.start(), segment.size(), segment.perms())?;
            emulator.write_segment_bytes(segment.name(), &data)?;
        }
        Ok(emulator)
    }

    /// Builds a fresh emulator from an [`ExecutableImage`]: copies every
    /// segment out of the image's memory (as [`Emulator::from_memory`])
    /// then jumps to its entry point.
    ///
    /// # Errors
    ///
    /// As [`Emulator::from_memory`], or if the jump to the entry point
    /// fails.
    pub fn from_execfile<M: Memory + Segmented>(backend: B, image: ExecutableImage<M>) -> Result<Self, DbgError> {
        let mut emulator = Self::from_memory(image.arch, backend, &image.memory)?;
        emulator.jump(image.entry, None)?;
        Ok(emulator)
    }

    fn take_stop(&mut self) -> Option<StopReason> {
        if self.stop_requested {
            self.stop_requested = false;
            self.stop_reason.take()
        } else {
            None
        }
    }

    /// Collects hooks matching `kind`/`address`, invokes each in turn with
    /// `self` mutably borrowable, and stops early if a callback requested
    /// [`Debugger::stop`].
    ///
    /// Matching hooks are cloned out of `self.hooks` as `Rc` handles before
    /// any callback runs, so a callback is free to add or remove hooks
    /// (including itself) on `self` without conflicting with a live borrow
    /// of the hook table.
    fn dispatch_hooks(&mut self, kind: HookKind, address: Addr, access: Option<Access>) -> Option<StopReason> {
        let matching: Vec<(HookHandle, Rc<RefCell<HookEntry<Self>>>)> = self
            .hooks
            .iter()
            .filter(|(_, entry)| {
                let entry = entry.borrow();
                entry.kind == kind && entry.target.contains(address)
            })
            .map(|(handle, entry)| (*handle, Rc::clone(entry)))
            .collect();

        for (handle, entry) in matching {
            if !self.hooks.contains_key(&handle) {
                continue;
            }
            self.current_hook = Some(handle);
            self.current_access = access.clone();
            {
                let guard = HookScopeGuard { emulator: self };
                (entry.borrow_mut().callback)(&mut *guard.emulator);
            }

            if let Some(reason) = self.take_stop() {
                return Some(reason);
            }
        }
        None
    }

    fn current_isa(&self) -> Arc<InstructionSet> {
        self.arch.isa_from_regs(self).clone()
    }
}

impl<B: EmulatorBackend> RegisterRead for Emulator<B> {
    fn read(&self, name: &str) -> Option<u64> {
        self.get_reg(name).ok()
    }
}

impl<B: EmulatorBackend> Segmented for Emulator<B> {
    fn by_name(&self, name: &str) -> Option<&Segment> {
        self.segments.get(name)
    }

    fn by_address(&self, address: Addr) -> Option<&Segment> {
        self.segments.values().find(|seg| seg.contains_address(address))
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &Segment> + '_> {
        Box::new(self.segments.values())
    }

    fn len(&self) -> usize {
        self.segments.len()
    }
}

impl<B: EmulatorBackend> Splittable for Emulator<B> {
    fn read_segment(&self, segment: &Segment, offset: u64, size: u64) -> Result<Vec<u8>, MemoryAccessError> {
        self.backend.read_mem(segment.start() + offset, size).map_err(|_| MemoryAccessError::Fault {
            address: segment.start() + offset,
            size,
            cause: FaultCause::Unmapped,
        })
    }

    fn write_segment(&mut self, segment: &Segment, offset: u64, data: &[u8]) -> Result<(), MemoryAccessError> {
        self.backend.write_mem(segment.start() + offset, data).map_err(|_| MemoryAccessError::Fault {
            address: segment.start() + offset,
            size: data.len() as u64,
            cause: FaultCause::Unmapped,
        })
    }
}

impl<B: EmulatorBackend> RawMemory for Emulator<B> {
    fn raw_read(&self, address: Addr, size: u64) -> Result<Vec<u8>, MemoryAccessError> {
        self.split_read(address, size)
    }

    fn raw_write(&mut self, address: Addr, data: &[u8]) -> Result<(), MemoryAccessError> {
        self.split_write(address, data)
    }
}

impl<B: EmulatorBackend> Memory for Emulator<B> {
    fn arch(&self) -> &Arc<Architecture> {
        &self.arch
    }

    fn limits(&self) -> &Limits {
        &self.limits
    }

    fn verbose(&self) -> bool {
        self.verbose
    }
}

impl<B: EmulatorBackend> Mappable for Emulator<B> {
    fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Unlike the generic default (which rounds `start` down to the
    /// enclosing page), an engine-backed mapping requires an already
    /// page-aligned `start` — the engine has no notion of a sub-page
    /// mapping offset — and only rounds `size` up, per spec section 4.4.
    fn map(&mut self, name: impl Into<String>, start: Addr, size: u64, perms: AccessType) -> Result<Segment, MappableError> {
        let page_size = self.limits.page_size;
        if start % page_size != 0 {
            return Err(MappableError::Backend(format!("start {start:#x} is not page-aligned to {page_size:#x}")));
        }
        let rounded_size = self.limits.round_page(size.max(1));
        if rounded_size != size {
            log::warn!("rounding segment size {size:#x} up to {rounded_size:#x} to match the page size");
        }
        let segment = Segment::new(name, start, rounded_size, perms);
        self.insert(segment.clone())?;
        Ok(segment)
    }

    fn insert(&mut self, segment: Segment) -> Result<(), MappableError> {
        if self.segments.contains_key(segment.name()) {
            return Err(MappableError::DuplicateName(segment.name().to_string()));
        }
        if let Some(existing) = self
            .segments
            .values()
            .find(|seg| seg.adjacent(&segment) && seg.start() != segment.end() && segment.start() != seg.end())
        {
            return Err(MappableError::Overlap {
                start: segment.start(),
                end: segment.end(),
                existing: existing.name().to_string(),
            });
        }
        self.backend
            .map(segment.start(), segment.size(), segment.perms())
            .map_err(|err| MappableError::Backend(err.to_string()))?;
        self.segments.insert(segment.name().to_string(), segment);
        Ok(())
    }

    fn write_segment_bytes(&mut self, name: &str, data: &[u8]) -> Result<(), MappableError> {
        let segment = self
            .segments
            .get(name)
            .ok_or_else(|| MappableError::NoSuchSegment(name.to_string()))?
            .clone();
        self.backend
            .write_mem(segment.start(), data)
            .map_err(|err| MappableError::Backend(err.to_string()))
    }
}

impl<B: EmulatorBackend> Debugger for Emulator<B> {
    fn arch(&self) -> &Architecture {
        self.arch.as_ref()
    }

    fn get_reg(&self, name: &str) -> Result<u64, DbgError> {
        let reg = self.arch.regs().get(name).map_err(|_| DbgError::UnknownRegister(name.to_string()))?;
        Ok(self.backend.read_reg(reg))
    }

    fn set_reg(&mut self, name: &str, value: u64) -> Result<(), DbgError> {
        let reg = self
            .arch
            .regs()
            .get(name)
            .map_err(|_| DbgError::UnknownRegister(name.to_string()))?
            .clone();
        self.backend.write_reg(&reg, value);
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

    fn read_word(&self, addr: Addr) -> Result<u64, DbgError> {
        Ok(Memory::read_word(self, addr)?)
    }

    fn write_word(&mut self, addr: Addr, value: u64) -> Result<(), DbgError> {
        Ok(Memory::write_word(self, addr, value)?)
    }

    fn jump(&mut self, addr: Addr, isa: Option<&InstructionSet>) -> Result<(), DbgError> {
        let current;
        let isa = match isa {
            Some(isa) => isa,
            None => {
                current = self.current_isa();
                &current
            }
        };
        let pointer = isa.address_to_pointer(addr);
        self.set_pc(pointer)
    }

    fn run(&mut self, count: Option<u64>, address: Option<Addr>, isa: Option<&InstructionSet>) -> Result<StopReason, DbgError> {
        if let Some(addr) = address {
            self.jump(addr, isa)?;
        }
        self.start_pc = self.pc()?;
        self.stop_requested = false;
        self.stop_reason = None;

        let mut executed = 0u64;
        loop {
            if let Some(limit) = count {
                if executed >= limit {
                    return Ok(StopReason::Count);
                }
            }

            let pointer = self.pc()?;
            let insn_addr = self.current_isa().pointer_to_address(pointer);

            if let Some(reason) = self.dispatch_hooks(HookKind::Code, insn_addr, None) {
                return Ok(reason);
            }

            match self.backend.step(pointer) {
                StepOutcome::Ok { accesses, .. } => {
                    for access in accesses {
                        let kind = match access.kind {
                            AccessType::READ => HookKind::Read,
                            AccessType::WRITE => HookKind::Write,
                            _ => continue,
                        };
                        let address = access.address;
                        if let Some(reason) = self.dispatch_hooks(kind, address, Some(access)) {
                            return Ok(reason);
                        }
                    }
                    executed += 1;
                }
                StepOutcome::InvalidInsn { pc } => return Err(InvalidInsnError { pc }.into()),
                StepOutcome::Fault { pc, cause, access } => return Err(MemFaultError { pc, cause, access }.into()),
                StepOutcome::Cpu { pc, message } => return Err(CpuError { pc, message }.into()),
                StepOutcome::BackendError(err) => {
                    return Err(CpuError {
                        pc: pointer,
                        message: err.to_string(),
                    }
                    .into())
                }
            }
        }
    }

    fn add_hook(&mut self, kind: HookKind, target: HookTarget, callback: HookFn<Self>) -> Result<HookHandle, DbgError> {
        if matches!(kind, HookKind::Read | HookKind::Write) && !self.backend.supports_data_hooks() {
            return Err(DbgError::UnsupportedHook { kind });
        }
        let handle = HookHandle::new(self.next_hook_id);
        self.next_hook_id += 1;
        self.hooks.insert(handle, Rc::new(RefCell::new(HookEntry { kind, target, callback })));
        Ok(handle)
    }

    fn remove_hook(&mut self, handle: HookHandle) {
        self.hooks.shift_remove(&handle);
    }

    fn stop(&mut self) -> Result<(), DbgError> {
        if let Some(handle) = self.current_hook {
            self.stop_requested = true;
            self.stop_reason = Some(StopReason::Hook(handle));
        }
        Ok(())
    }

    fn current_hook(&self) -> Option<HookHandle> {
        self.current_hook
    }

    fn current_access(&self) -> Option<Access> {
        self.current_access.clone()
    }

    fn disassemble(&self, count: usize) -> Result<Vec<Instruction>, DbgError> {
        let pc = self.pc()?;
        let isa = self.current_isa();
        match self.by_address(pc) {
            Some(segment) => {
                let mut insns = Memory::disassemble(self, pc, segment.end() - pc, Some(&isa))?;
                insns.truncate(count);
                Ok(insns)
            }
            None => Ok(Memory::disassemble_n(self, pc, count, Some(&isa))?),
        }
    }

    fn return_from_function(&mut self, retval: Option<u64>) -> Result<(), DbgError> {
        if let Some(value) = retval {
            if let Some(name) = self.arch.retval_name() {
                let name = name.to_string();
                self.set_reg(&name, value)?;
            }
        }
        if let Some(name) = self.arch.retaddr_name() {
            let name = name.to_string();
            let addr = self.get_reg(&name)?;
            self.set_pc(addr)
        } else {
            let addr = self.stack().pop()?;
            self.set_pc(addr)
        }
    }
}

/// An executable image ready to be loaded into an [`Emulator`]: an
/// architecture, an entry point, and a segmented memory holding its
/// contents.
///
/// Grounded on spec section 6's "executable-file capability": parsing the
/// actual file format (ELF/PE/Mach-O) is out of scope and left to an
/// external reader; this type is simply what that reader hands back.
pub struct ExecutableImage<M> {
    /// Architecture the image targets.
    pub arch: Arc<Architecture>,
    /// Address execution should start at.
    pub entry: Addr,
    /// Segmented memory holding the image's contents.
    pub memory: M,
}
