//! Per-process tracing state.

use std::collections::HashMap;

use crate::callstack::{CallStack, MAX_CALL_DEPTH};
use crate::probe::LwpInfo;
use crate::thread::ThreadContext;
use crate::Pid;

/// ELF machine type (`e_machine`) of a traced executable.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Machine(pub u16);

impl Machine {
    pub const I386: Machine = Machine(3);
    pub const ARM: Machine = Machine(40);
    pub const X86_64: Machine = Machine(62);
    pub const AARCH64: Machine = Machine(183);

    /// Machine type of executables native to this tracer.
    #[cfg(target_arch = "x86_64")]
    pub const fn native() -> Self {
        Self::X86_64
    }

    /// Machine type of executables native to this tracer.
    #[cfg(target_arch = "aarch64")]
    pub const fn native() -> Self {
        Self::AARCH64
    }

    pub fn is_64bit(self) -> bool {
        matches!(self, Self::X86_64 | Self::AARCH64)
    }
}

/// Calling convention mode of a traced process.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Personality {
    /// 64-bit tracee.
    Native64,

    /// 32-bit tracee, observed by a 64-bit tracer. Register values must be
    /// truncated to their low 32 bits.
    Compat32,

    /// 32-bit tracee, observed by a 32-bit tracer.
    Native32,
}

impl Personality {
    pub fn for_machine(machine: Machine) -> Self {
        if machine.is_64bit() {
            Personality::Native64
        } else if cfg!(target_pointer_width = "64") {
            Personality::Compat32
        } else {
            Personality::Native32
        }
    }

    /// Returns `true` if `long`, pointers, and registers are 8 bytes wide.
    pub fn is_64bit(self) -> bool {
        self == Personality::Native64
    }

    /// Returns `true` if the tracer must mask register values to 32 bits.
    pub fn mask_32bit(self) -> bool {
        self == Personality::Compat32
    }
}

/// A monitored process, and the execution contexts of each of its observed threads.
///
/// Exactly one thread is _active_ at a time. Its call stack and event handler are
/// held by the process itself, and every other known thread holds a saved snapshot
/// of its own. See [`TracedProcess::activate()`].
///
/// The event handler type `H` is opaque here: it is only saved and restored alongside
/// the call stack of the thread it belongs to.
#[derive(Clone, Debug)]
pub struct TracedProcess<H = ()> {
    pid: Pid,

    machine: Machine,

    pub(crate) personality: Personality,

    /// Call stack of the active thread.
    pub(crate) callstack: CallStack,

    /// Event handler of the active thread.
    pub(crate) handler: Option<H>,

    pub(crate) threads: HashMap<Pid, ThreadContext<H>>,

    pub(crate) active: Option<Pid>,

    /// Extended stop status retrieved by the most recent probe.
    pub(crate) lwpinfo: Option<LwpInfo>,

    max_call_depth: usize,
}

impl<H> TracedProcess<H> {
    pub fn new(pid: Pid, machine: Machine) -> Self {
        Self::with_max_call_depth(pid, machine, MAX_CALL_DEPTH)
    }

    /// Create a process record whose per-thread call stacks hold at most
    /// `max_call_depth` frames.
    pub fn with_max_call_depth(pid: Pid, machine: Machine, max_call_depth: usize) -> Self {
        let personality = Personality::for_machine(machine);
        let callstack = CallStack::new(max_call_depth);
        let threads = HashMap::new();

        Self {
            pid,
            machine,
            personality,
            callstack,
            handler: None,
            threads,
            active: None,
            lwpinfo: None,
            max_call_depth,
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn machine(&self) -> Machine {
        self.machine
    }

    /// Calling convention mode, as of the most recent probe.
    pub fn personality(&self) -> Personality {
        self.personality
    }

    pub fn max_call_depth(&self) -> usize {
        self.max_call_depth
    }

    /// Call stack of the active thread.
    pub fn callstack(&self) -> &CallStack {
        &self.callstack
    }

    pub fn callstack_mut(&mut self) -> &mut CallStack {
        &mut self.callstack
    }

    /// Event handler installed for the active thread.
    pub fn handler(&self) -> Option<&H> {
        self.handler.as_ref()
    }

    pub fn set_handler(&mut self, handler: impl Into<Option<H>>) {
        self.handler = handler.into();
    }

    /// Extended stop status retrieved by the most recent successful probe.
    pub fn lwp_info(&self) -> Option<&LwpInfo> {
        self.lwpinfo.as_ref()
    }

    pub fn active_tid(&self) -> Option<Pid> {
        self.active
    }

    pub fn active_thread(&self) -> Option<&ThreadContext<H>> {
        self.active.and_then(|tid| self.threads.get(&tid))
    }

    pub fn active_thread_mut(&mut self) -> Option<&mut ThreadContext<H>> {
        match self.active {
            Some(tid) => self.threads.get_mut(&tid),
            None => None,
        }
    }

    pub fn thread(&self, tid: Pid) -> Option<&ThreadContext<H>> {
        self.threads.get(&tid)
    }

    /// All threads observed so far, in no particular order.
    pub fn threads(&self) -> impl Iterator<Item = &ThreadContext<H>> {
        self.threads.values()
    }
}
