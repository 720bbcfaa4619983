//! Per-thread execution contexts, and switching between them.

use tracing::{debug, error, trace};

use crate::callstack::CallStack;
use crate::error::{Error, Result};
use crate::process::TracedProcess;
use crate::{Pid, Registers};

/// Execution context of one kernel thread (LWP) of a [`TracedProcess`].
#[derive(Clone, Debug)]
pub struct ThreadContext<H> {
    tid: Pid,

    /// Owning process.
    pid: Pid,

    single_step: bool,

    /// Not active. `callstack` and `handler` hold a valid snapshot.
    pub(crate) saved: bool,

    pub(crate) callstack: CallStack,

    pub(crate) handler: Option<H>,

    /// Last successfully fetched register snapshot.
    pub(crate) regs: Option<Registers>,

    /// The most recent register fetch succeeded.
    pub(crate) valid_regs: bool,
}

impl<H> ThreadContext<H> {
    fn try_new(pid: Pid, tid: Pid, max_call_depth: usize) -> Result<Self> {
        let callstack = CallStack::try_new(max_call_depth)
            .map_err(|source| Error::Alloc { tid, source })?;

        Ok(Self {
            tid,
            pid,
            single_step: false,
            saved: false,
            callstack,
            handler: None,
            regs: None,
            valid_regs: false,
        })
    }

    pub fn tid(&self) -> Pid {
        self.tid
    }

    /// Id of the owning process.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn single_step(&self) -> bool {
        self.single_step
    }

    /// Mark the thread as wanting to be single-stepped on its next restart.
    pub fn set_single_step(&mut self, single_step: bool) {
        self.single_step = single_step;
    }

    pub fn is_saved(&self) -> bool {
        self.saved
    }

    /// Call stack snapshot, present only while the thread is inactive.
    ///
    /// The active thread's call stack lives in [`TracedProcess::callstack()`].
    pub fn saved_callstack(&self) -> Option<&CallStack> {
        if self.saved {
            Some(&self.callstack)
        } else {
            None
        }
    }

    /// Event handler snapshot, present only while the thread is inactive.
    pub fn saved_handler(&self) -> Option<&H> {
        if self.saved {
            self.handler.as_ref()
        } else {
            None
        }
    }

    /// Last register snapshot fetched for this thread.
    ///
    /// It may be stale, see [`ThreadContext::has_valid_registers()`].
    pub fn registers(&self) -> Option<&Registers> {
        self.regs.as_ref()
    }

    /// Returns `true` if the most recent register fetch succeeded.
    pub fn has_valid_registers(&self) -> bool {
        self.valid_regs
    }
}

impl<H: Clone> TracedProcess<H> {
    /// Make `tid` the active thread, and return its context.
    ///
    /// The call stack and event handler of the previously active thread are copied
    /// into its context, and those of `tid` are copied back into the process. A
    /// thread seen for the first time starts with an empty call stack and no handler.
    ///
    /// If a context for a new thread cannot be allocated, the previously active
    /// context is returned unchanged, and subsequent events are attributed to it.
    /// Returns `None` only if there was no previously active thread.
    pub fn activate(&mut self, tid: Pid) -> Option<&mut ThreadContext<H>> {
        if self.active == Some(tid) {
            trace!(tid = tid.as_raw(), "thread already active");
            return self.threads.get_mut(&tid);
        }

        if !self.threads.contains_key(&tid) {
            let ctx = match self.new_thread_context(tid) {
                Ok(ctx) => ctx,
                Err(err) => {
                    error!(%err, active = ?self.active, "continuing with previously active thread");

                    return match self.active {
                        Some(prev) => self.threads.get_mut(&prev),
                        None => None,
                    };
                },
            };

            self.save_active();

            debug!(tid = tid.as_raw(), "new thread");

            self.callstack.clear();
            self.handler = None;
            self.threads.insert(tid, ctx);
            self.active = Some(tid);

            return self.threads.get_mut(&tid);
        }

        self.save_active();

        let ctx = self.threads.get_mut(&tid)?;

        if ctx.saved {
            debug!(tid = tid.as_raw(), depth = ctx.callstack.depth(), "load context");

            self.callstack.copy_from(&ctx.callstack);
            self.handler = ctx.handler.clone();
            ctx.saved = false;
        }

        self.active = Some(tid);

        Some(ctx)
    }

    fn new_thread_context(&mut self, tid: Pid) -> Result<ThreadContext<H>> {
        self.threads
            .try_reserve(1)
            .map_err(|source| Error::Alloc { tid, source })?;

        ThreadContext::try_new(self.pid(), tid, self.max_call_depth())
    }

    // Snapshot the active thread into its own context, leaving no thread active.
    fn save_active(&mut self) {
        if let Some(cur) = self.active.take() {
            if let Some(ctx) = self.threads.get_mut(&cur) {
                debug!(tid = cur.as_raw(), depth = self.callstack.depth(), "save context");

                ctx.callstack.copy_from(&self.callstack);
                ctx.handler = self.handler.clone();
                ctx.saved = true;
            }
        }
    }
}
