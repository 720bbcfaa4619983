use nix::errno::Errno;

use crate::syscall::SyscallRegisters;
use crate::Pid;

#[cfg(all(target_os = "android"))]
pub(crate) const PTRACE_GETREGSET: i32 = 0x4204;

#[cfg(all(not(target_os = "android")))]
pub(crate) const PTRACE_GETREGSET: u32 = 0x4204;

/// Linux constant defined in `include/uapi/linux/elf.h`.
const NT_PRSTATUS: usize = 0x1;

/// Register state of a tracee.
pub type Registers = user_pt_regs;

/// Defined in [`arch/arm64/include/uapi/asm/ptrace.h`](https://android.googlesource.com/kernel/common/+/refs/heads/android-mainline/arch/arm64/include/uapi/asm/ptrace.h#88).
#[allow(non_camel_case_types)]
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct user_pt_regs {
    pub regs: [u64; 31],
    pub sp: u64,
    pub pc: u64,
    pub pstate: u64
}

pub(crate) fn getregs(tid: Pid) -> nix::Result<Registers> {
    let mut data = std::mem::MaybeUninit::<Registers>::uninit();
    let mut rv = libc::iovec {
        iov_base: data.as_mut_ptr() as *mut libc::c_void,
        iov_len: std::mem::size_of::<Registers>(),
    };

    let res = unsafe {
        libc::ptrace(PTRACE_GETREGSET, tid.as_raw(), NT_PRSTATUS, &mut rv as *mut _ as *mut libc::c_void)
    };

    Errno::result(res)?;

    Ok(unsafe { data.assume_init() })
}

impl SyscallRegisters for Registers {
    // The syscall number is passed in `x8`, and survives until syscall-exit-stop.
    fn syscall_number(&self) -> i64 {
        self.regs[8] as i64
    }

    fn return_value(&self) -> i64 {
        self.regs[0] as i64
    }

    fn instruction_pointer(&self) -> u64 {
        self.pc
    }
}
