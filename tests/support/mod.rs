#![allow(unused)]

use std::collections::HashMap;
use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command};
use std::sync::{Arc, Mutex};

use lwptrace::{Error, LwpInfo, LwpQuery, Pid, Registers};
use nix::errno::Errno;
use nix::sys::ptrace;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

macro_rules! pid {
    ($raw: expr) => {
        lwptrace::Pid::from_raw($raw)
    };
}

/// Construct the extended stop status of a thread with a readable, test-friendly syntax.
macro_rules! lwp {
    ($raw_tid: expr) => {{
        let tid = lwptrace::Pid::from_raw($raw_tid);

        lwptrace::LwpInfo::new(tid, lwptrace::LwpFlags::empty())
    }};
    ($raw_tid: expr, $($flag: ident)|+) => {{
        let tid = lwptrace::Pid::from_raw($raw_tid);
        let flags = lwptrace::LwpFlags::empty() $(| lwptrace::LwpFlags::$flag)+;

        lwptrace::LwpInfo::new(tid, flags)
    }};
}

/// Scripted stand-in for the OS debugging facility.
#[derive(Default)]
pub struct FakeOs {
    /// Status reported by the next `lwp_info()` query. `None` reports a vanished tracee.
    pub stop: Option<LwpInfo>,

    /// Fail `lwp_info()` queries with this error.
    pub query_error: Option<Errno>,

    /// Registers per thread. Fetches for any other thread report a vanished tracee.
    pub regs: HashMap<Pid, Registers>,

    /// Fail register fetches with this error.
    pub regs_error: Option<Errno>,
}

impl FakeOs {
    pub fn stopped(stop: LwpInfo) -> Self {
        Self { stop: Some(stop), ..Self::default() }
    }

    pub fn with_regs(mut self, tid: Pid, regs: Registers) -> Self {
        self.regs.insert(tid, regs);
        self
    }
}

fn os_error(pid: Pid, source: Errno) -> Error {
    if source == Errno::ESRCH {
        Error::TraceeDied { pid, source }
    } else {
        Error::OS(source)
    }
}

impl LwpQuery for FakeOs {
    fn lwp_info(&mut self, pid: Pid) -> lwptrace::error::Result<LwpInfo> {
        if let Some(errno) = self.query_error {
            return Err(os_error(pid, errno));
        }

        self.stop.ok_or_else(|| os_error(pid, Errno::ESRCH))
    }

    fn registers(&mut self, tid: Pid) -> lwptrace::error::Result<Registers> {
        if let Some(errno) = self.regs_error {
            return Err(os_error(tid, errno));
        }

        self.regs.get(&tid).copied().ok_or_else(|| os_error(tid, Errno::ESRCH))
    }
}

/// Registers as seen at syscall-enter-stop for `sysnum`.
#[cfg(target_arch = "x86_64")]
pub fn regs_at_entry(sysnum: i64) -> Registers {
    // SAFETY: `user_regs_struct` is plain integers, so all-zero is a valid value.
    let mut regs: Registers = unsafe { std::mem::zeroed() };
    regs.orig_rax = sysnum as u64;
    regs.rax = -(libc::ENOSYS as i64) as u64;
    regs
}

/// Registers as seen at syscall-enter-stop for `sysnum`.
#[cfg(target_arch = "aarch64")]
pub fn regs_at_entry(sysnum: i64) -> Registers {
    let mut regs = Registers::default();
    regs.regs[8] = sysnum as u64;
    regs
}

/// Registers as seen at syscall-exit-stop for `sysnum`, which returned `ret`.
#[cfg(target_arch = "x86_64")]
pub fn regs_at_exit(sysnum: i64, ret: i64) -> Registers {
    let mut regs = regs_at_entry(sysnum);
    regs.rax = ret as u64;
    regs
}

/// Registers as seen at syscall-exit-stop for `sysnum`, which returned `ret`.
#[cfg(target_arch = "aarch64")]
pub fn regs_at_exit(sysnum: i64, ret: i64) -> Registers {
    let mut regs = regs_at_entry(sysnum);
    regs.regs[0] = ret as u64;
    regs
}

/// Spawn `cmd`, requesting `PTRACE_TRACEME` after `fork()` and pre-`exec()`.
///
/// The child stops with `SIGTRAP` on successful `execve()`.
pub fn spawn_traceme(mut cmd: Command) -> io::Result<Child> {
    unsafe {
        cmd.pre_exec(|| ptrace::traceme().map_err(|err| io::Error::from_raw_os_error(err as i32)))
    };

    cmd.spawn()
}

/// Records the level of every event emitted while installed.
#[derive(Clone, Default)]
pub struct Levels(Arc<Mutex<Vec<Level>>>);

impl Levels {
    pub fn recorded(&self) -> Vec<Level> {
        self.0.lock().unwrap().clone()
    }

    /// Number of events at `WARN` or more severe.
    pub fn errors(&self) -> usize {
        self.recorded()
            .into_iter()
            .filter(|level| *level == Level::ERROR)
            .count()
    }

    pub fn warnings(&self) -> usize {
        self.recorded()
            .into_iter()
            .filter(|level| *level <= Level::WARN)
            .count()
    }

    /// Run `f` with a subscriber that records into `self`.
    pub fn capture<T>(&self, f: impl FnOnce() -> T) -> T {
        use tracing_subscriber::layer::SubscriberExt;

        let subscriber = tracing_subscriber::registry().with(self.clone());

        tracing::subscriber::with_default(subscriber, f)
    }
}

impl<S: Subscriber> Layer<S> for Levels {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.0.lock().unwrap().push(*event.metadata().level());
    }
}
