use std::io;
use std::os::unix::process::CommandExt;
use std::process::Command;

use lwptrace::{CallFrame, Machine, Pid, Ptrace, Signal, SyscallStop, TracedProcess, WaitStatus};
use nix::errno::Errno;
use nix::sys::ptrace::{self, Options};
use nix::sys::wait::{self, WaitPidFlag};
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

#[derive(StructOpt)]
struct Opt {
    /// Maximum number of nested calls tracked per thread.
    #[structopt(long, default_value = "64")]
    max_call_depth: usize,

    /// Command to trace.
    cmd: String,

    /// Arguments to `cmd`.
    args: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let opt = Opt::from_args();

    let mut cmd = Command::new(&opt.cmd);
    cmd.args(&opt.args);

    unsafe {
        cmd.pre_exec(|| ptrace::traceme().map_err(|err| io::Error::from_raw_os_error(err as i32)))
    };

    let child = cmd.spawn()?;
    let pid = Pid::from_raw(child.id() as i32);

    wait::waitpid(pid, None::<WaitPidFlag>)?;

    let options = Options::PTRACE_O_TRACESYSGOOD
        | Options::PTRACE_O_TRACECLONE
        | Options::PTRACE_O_EXITKILL;
    ptrace::setoptions(pid, options)?;

    let mut process: TracedProcess = TracedProcess::with_max_call_depth(pid, Machine::native(), opt.max_call_depth);

    ptrace::syscall(pid, None::<Signal>)?;

    loop {
        let status = match wait::waitpid(None::<Pid>, Some(WaitPidFlag::__WALL)) {
            Ok(status) => status,
            Err(Errno::ECHILD) => break,
            Err(err) => return Err(err.into()),
        };

        let tid = match status {
            WaitStatus::Exited(tid, code) => {
                println!("[{}] exited with {}", tid, code);
                continue;
            },
            WaitStatus::Signaled(tid, signal, _) => {
                println!("[{}] killed by {}", tid, signal);
                continue;
            },
            status => match status.pid() {
                Some(tid) => tid,
                None => continue,
            },
        };

        process.refresh(&mut Ptrace::new(tid));

        match process.classify(status) {
            SyscallStop::Enter { sysnum } => {
                match sysnum {
                    Some(number) => {
                        println!("[{}] syscall {}", tid, number);
                        process.callstack_mut().push(CallFrame::Syscall { number })?;
                    },
                    None => println!("[{}] syscall ?", tid),
                }
            },
            SyscallStop::Exit { sysnum } => {
                match sysnum {
                    Some(number) => {
                        println!("[{}] syscall {} returned", tid, number);
                        process.callstack_mut().pop();
                    },
                    None => println!("[{}] unknown syscall returned", tid),
                }
            },
            SyscallStop::Other => {},
        }

        // Suppress ptrace-induced stops, and deliver real signals.
        let pending = match status {
            WaitStatus::Stopped(_, Signal::SIGTRAP) | WaitStatus::Stopped(_, Signal::SIGSTOP) => None,
            WaitStatus::Stopped(_, signal) => Some(signal),
            _ => None,
        };

        match ptrace::syscall(tid, pending) {
            Ok(()) | Err(Errno::ESRCH) => {},
            Err(err) => return Err(err.into()),
        }
    }

    Ok(())
}
