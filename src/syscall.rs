//! Classification of trap stops as syscall entries and exits.

use nix::sys::signal::Signal;
use nix::sys::wait::WaitStatus;
use tracing::debug;

use crate::callstack::CallFrame;
use crate::probe::LwpFlags;
use crate::process::TracedProcess;

/// Architecture-specific register roles needed to interpret syscall stops.
pub trait SyscallRegisters {
    /// Number of the syscall being entered. Only meaningful at syscall-enter-stop.
    fn syscall_number(&self) -> i64;

    /// Primary integer result register. Holds the syscall return value at
    /// syscall-exit-stop.
    fn return_value(&self) -> i64;

    fn instruction_pointer(&self) -> u64;
}

/// How a stop relates to a system call.
///
/// A `sysnum` of `None` means the syscall could not be identified, and its arguments
/// or return value must not be decoded. This is expected for an exit whose entry was
/// never observed, such as when attaching to a thread blocked in a syscall.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyscallStop {
    /// Not a syscall-stop.
    Other,

    // syscall-stops
    Enter { sysnum: Option<i64> },
    Exit { sysnum: Option<i64> },
}

impl SyscallStop {
    pub fn sysnum(&self) -> Option<i64> {
        match self {
            SyscallStop::Other => None,
            SyscallStop::Enter { sysnum } | SyscallStop::Exit { sysnum } => *sysnum,
        }
    }
}

impl<H> TracedProcess<H> {
    /// Classify the stop reported with `status`, using the state gathered by the most
    /// recent [`TracedProcess::refresh()`].
    ///
    /// At entry, the syscall number is read from the active thread's registers. At exit
    /// that register holds the return value instead, so the number is recovered from
    /// the syscall frame on top of the active thread's call stack.
    pub fn classify(&self, status: WaitStatus) -> SyscallStop {
        if !is_trap_stop(status) {
            return SyscallStop::Other;
        }

        let flags = self.lwpinfo.map(|info| info.flags).unwrap_or_default();
        let ctx = self.active_thread();
        let regs = ctx.and_then(|ctx| ctx.registers());

        let stop = if flags.contains(LwpFlags::SYSCALL_ENTRY) {
            let sysnum = regs.map(|regs| regs.syscall_number());
            SyscallStop::Enter { sysnum }
        } else if flags.contains(LwpFlags::SYSCALL_EXIT) {
            let sysnum = self.callstack.top().and_then(CallFrame::syscall);
            SyscallStop::Exit { sysnum }
        } else {
            return SyscallStop::Other;
        };

        debug!(
            sysnum = ?stop.sysnum(),
            ip = ?regs.map(|regs| regs.instruction_pointer()),
            stale = !ctx.map_or(false, |ctx| ctx.has_valid_registers()),
            ?stop,
            "classified stop"
        );

        stop
    }
}

// Stops with `WSTOPSIG(status) == SIGTRAP`, including syscall-stops reported as
// `SIGTRAP | 0x80` and ptrace-event-stops.
fn is_trap_stop(status: WaitStatus) -> bool {
    match status {
        WaitStatus::Stopped(_, Signal::SIGTRAP) => true,
        WaitStatus::PtraceSyscall(_) => true,
        WaitStatus::PtraceEvent(_, Signal::SIGTRAP, _) => true,
        _ => false,
    }
}
