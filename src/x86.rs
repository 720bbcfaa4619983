use nix::sys::ptrace;

use crate::syscall::SyscallRegisters;
use crate::Pid;

/// Register state of a tracee.
pub type Registers = libc::user_regs_struct;

pub(crate) fn getregs(tid: Pid) -> nix::Result<Registers> {
    ptrace::getregs(tid)
}

impl SyscallRegisters for Registers {
    // On syscall-enter-stop, the kernel has already clobbered `rax` with `-ENOSYS`,
    // and preserves the requested number in `orig_rax`.
    fn syscall_number(&self) -> i64 {
        self.orig_rax as i64
    }

    fn return_value(&self) -> i64 {
        self.rax as i64
    }

    fn instruction_pointer(&self) -> u64 {
        self.rip
    }
}
