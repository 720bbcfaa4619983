//! Extended per-thread stop status, and the per-stop architecture probe.

use bitflags::bitflags;
use nix::errno::Errno;
use tracing::{debug, trace, warn};

use crate::arch;
use crate::error::{Result, ResultExt};
use crate::process::{Personality, TracedProcess};
use crate::{Pid, Registers};

bitflags! {
    /// Syscall-stop flags of an [`LwpInfo`].
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct LwpFlags: u32 {
        /// The thread is about to enter a syscall.
        const SYSCALL_ENTRY = 1 << 0;
        /// The thread is about to return from a syscall.
        const SYSCALL_EXIT = 1 << 1;
        /// The stop was requested by a seccomp filter, at syscall entry.
        const SECCOMP = 1 << 2;
    }
}

/// Extended stop status of the thread that reported a stop.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LwpInfo {
    /// Thread that reported the stop.
    pub tid: Pid,

    pub flags: LwpFlags,

    /// `AUDIT_ARCH_*` value of the syscall convention in use, or 0 if unknown.
    pub arch: u32,

    pub instruction_pointer: u64,

    pub stack_pointer: u64,
}

impl LwpInfo {
    pub fn new(tid: Pid, flags: LwpFlags) -> Self {
        Self {
            tid,
            flags,
            arch: 0,
            instruction_pointer: 0,
            stack_pointer: 0,
        }
    }
}

/// OS debugging facility queried on each stop.
///
/// Implementations should report a vanished thread as [`Error::TraceeDied`], which
/// probing treats as an expected race rather than a failure.
///
/// [`Error::TraceeDied`]: crate::Error::TraceeDied
pub trait LwpQuery {
    /// Extended stop status for the stopped thread of `pid`.
    fn lwp_info(&mut self, pid: Pid) -> Result<LwpInfo>;

    /// General-purpose registers of `tid`.
    fn registers(&mut self, tid: Pid) -> Result<Registers>;
}

#[cfg(all(target_os = "android"))]
const PTRACE_GET_SYSCALL_INFO: i32 = 0x420e;

#[cfg(all(not(target_os = "android")))]
const PTRACE_GET_SYSCALL_INFO: u32 = 0x420e;

const PTRACE_SYSCALL_INFO_NONE: u8 = 0;
const PTRACE_SYSCALL_INFO_ENTRY: u8 = 1;
const PTRACE_SYSCALL_INFO_EXIT: u8 = 2;
const PTRACE_SYSCALL_INFO_SECCOMP: u8 = 3;

/// Defined in [`include/uapi/linux/ptrace.h`](https://github.com/torvalds/linux/blob/v5.3/include/uapi/linux/ptrace.h#L73-L100).
///
/// The trailing union of `entry`, `exit`, and `seccomp` data is kept opaque.
#[allow(dead_code, non_camel_case_types)]
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
struct ptrace_syscall_info {
    op: u8,
    pad: [u8; 3],
    arch: u32,
    instruction_pointer: u64,
    stack_pointer: u64,
    data: [u64; 8],
}

/// [`LwpQuery`] backed by `ptrace(2)`.
///
/// Linux reports the stopped thread via `wait(2)`, rather than on request, so the
/// caller records it here before probing.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Ptrace {
    stopped: Pid,
}

impl Ptrace {
    pub fn new(stopped: Pid) -> Self {
        Self { stopped }
    }

    pub fn stopped(&self) -> Pid {
        self.stopped
    }
}

impl LwpQuery for Ptrace {
    // Requires Linux 5.3 or newer. Older kernels fail with `EIO`.
    fn lwp_info(&mut self, pid: Pid) -> Result<LwpInfo> {
        let tid = self.stopped;

        let mut info = ptrace_syscall_info::default();
        let size = std::mem::size_of::<ptrace_syscall_info>();

        // SAFETY: the kernel writes at most `size` bytes into `info`.
        let res = unsafe {
            libc::ptrace(
                PTRACE_GET_SYSCALL_INFO,
                tid.as_raw(),
                size,
                &mut info as *mut _ as *mut libc::c_void,
            )
        };

        Errno::result(res).died_if_esrch(tid)?;

        let flags = match info.op {
            PTRACE_SYSCALL_INFO_ENTRY =>
                LwpFlags::SYSCALL_ENTRY,
            PTRACE_SYSCALL_INFO_SECCOMP =>
                LwpFlags::SYSCALL_ENTRY | LwpFlags::SECCOMP,
            PTRACE_SYSCALL_INFO_EXIT =>
                LwpFlags::SYSCALL_EXIT,
            PTRACE_SYSCALL_INFO_NONE =>
                LwpFlags::empty(),
            op => {
                debug!(op, "unknown syscall info op, assuming non-syscall stop");
                LwpFlags::empty()
            },
        };

        trace!(pid = pid.as_raw(), tid = tid.as_raw(), ?flags, "got lwp info");

        Ok(LwpInfo {
            tid,
            flags,
            arch: info.arch,
            instruction_pointer: info.instruction_pointer,
            stack_pointer: info.stack_pointer,
        })
    }

    fn registers(&mut self, tid: Pid) -> Result<Registers> {
        Ok(arch::getregs(tid).died_if_esrch(tid)?)
    }
}

impl<H: Clone> TracedProcess<H> {
    /// Examine the current stop of the process.
    ///
    /// Must be called once per observed stop, before [`TracedProcess::classify()`].
    /// Activates the stopped thread, fetches its registers, and recomputes the
    /// process personality.
    ///
    /// If the stopped thread has already vanished, nothing changes. Any other query
    /// failure is logged, and also leaves the process unchanged.
    pub fn refresh<Q: LwpQuery>(&mut self, os: &mut Q) {
        let info = match os.lwp_info(self.pid()) {
            Ok(info) => info,
            Err(err) if err.tracee_died() => {
                return;
            },
            Err(err) => {
                warn!(pid = self.pid().as_raw(), %err, "could not query lwp info");
                return;
            },
        };

        self.lwpinfo = Some(info);

        if let Some(ctx) = self.activate(info.tid) {
            let tid = ctx.tid();

            match os.registers(tid) {
                Ok(regs) => {
                    ctx.regs = Some(regs);
                    ctx.valid_regs = true;
                },
                Err(err) => {
                    if err.tracee_died() {
                        trace!(tid = tid.as_raw(), "thread died before register fetch");
                    } else {
                        debug!(tid = tid.as_raw(), %err, "could not fetch registers");
                    }

                    ctx.valid_regs = false;
                },
            }
        }

        self.personality = Personality::for_machine(self.machine());
    }
}
