//! Bounded per-thread bookkeeping of calls believed to be in progress.

use crate::error::{Error, Result};

/// Default maximum nesting of in-flight calls tracked per thread.
pub const MAX_CALL_DEPTH: usize = 64;

/// A call in progress on some tracee thread, pushed at its entry event and consulted
/// (then popped) at its matching exit event.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CallFrame {
    /// A raw system call, with the number captured at syscall-enter-stop.
    Syscall { number: i64 },

    /// A library call. The payload is owned by the call-tracing layer.
    Library { addr: u64, return_addr: u64 },
}

impl CallFrame {
    /// Returns the captured syscall number, if this is a syscall frame.
    pub fn syscall(&self) -> Option<i64> {
        match self {
            CallFrame::Syscall { number } => Some(*number),
            CallFrame::Library { .. } => None,
        }
    }
}

/// Fixed-capacity stack of [`CallFrame`]s.
///
/// Pushing beyond capacity is rejected with [`Error::CallStackFull`], and leaves the
/// stack unchanged.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CallStack {
    frames: Vec<CallFrame>,
    capacity: usize,
}

impl CallStack {
    /// Create an empty stack holding at most `capacity` frames.
    ///
    /// Storage grows on demand, so `capacity` only bounds [`CallStack::push()`].
    pub fn new(capacity: usize) -> Self {
        let frames = Vec::new();

        Self { frames, capacity }
    }

    /// Like [`CallStack::new()`], but reports allocation failure instead of aborting.
    pub(crate) fn try_new(capacity: usize) -> std::result::Result<Self, std::collections::TryReserveError> {
        let mut frames = Vec::new();
        frames.try_reserve_exact(capacity)?;

        Ok(Self { frames, capacity })
    }

    pub fn push(&mut self, frame: CallFrame) -> Result<()> {
        if self.frames.len() >= self.capacity {
            return Err(Error::CallStackFull { depth: self.frames.len() });
        }

        self.frames.push(frame);

        Ok(())
    }

    pub fn pop(&mut self) -> Option<CallFrame> {
        self.frames.pop()
    }

    /// Innermost in-flight call.
    pub fn top(&self) -> Option<&CallFrame> {
        self.frames.last()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Frames, outermost first.
    pub fn frames(&self) -> &[CallFrame] {
        &self.frames
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    // Copy the frames of `other` into `self` without reallocating. Both stacks
    // belong to the same process, so they share a capacity.
    pub(crate) fn copy_from(&mut self, other: &CallStack) {
        self.frames.clear();
        self.frames.extend_from_slice(&other.frames);
    }
}
