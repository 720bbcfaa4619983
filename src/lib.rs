pub mod callstack;
pub mod error;
pub mod layout;
pub mod probe;
pub mod process;
pub mod syscall;
pub mod thread;

#[cfg(target_arch = "aarch64")]
pub mod aarch64;

#[cfg(target_arch = "x86_64")]
pub mod x86;

#[cfg(target_arch = "aarch64")]
pub(crate) use crate::aarch64 as arch;

#[cfg(target_arch = "x86_64")]
pub(crate) use crate::x86 as arch;

#[cfg(target_arch = "aarch64")]
pub use aarch64::Registers;

#[cfg(target_arch = "x86_64")]
pub use x86::Registers;

pub use callstack::{CallFrame, CallStack, MAX_CALL_DEPTH};
pub use error::Error;
pub use nix::sys::signal::Signal;
pub use nix::sys::wait::WaitStatus;
pub use nix::unistd::Pid;
pub use probe::{LwpFlags, LwpInfo, LwpQuery, Ptrace};
pub use process::{Machine, Personality, TracedProcess};
pub use syscall::{SyscallRegisters, SyscallStop};
pub use thread::ThreadContext;
