//! Raw Linux system calls. No libc is linked, every call goes straight to the kernel.

#[cfg(target_arch = "x86_64")]
mod arch {
    pub const SYS_READ: usize = 0;
    pub const SYS_WRITE: usize = 1;
    pub const SYS_CLOSE: usize = 3;
    pub const SYS_LSEEK: usize = 8;
    pub const SYS_MMAP: usize = 9;
    pub const SYS_MPROTECT: usize = 10;
    pub const SYS_FCNTL: usize = 72;
    pub const SYS_EXIT_GROUP: usize = 231;
    pub const SYS_OPENAT: usize = 257;

    /// # Safety
    ///
    /// The kernel trusts every argument; pointers must be valid for the call.
    #[inline]
    pub unsafe fn syscall6(
        num: usize,
        arg1: usize,
        arg2: usize,
        arg3: usize,
        arg4: usize,
        arg5: usize,
        arg6: usize,
    ) -> usize {
        let result: usize;
        unsafe {
            core::arch::asm!(
                "syscall",
                inlateout("rax") num => result,
                in("rdi") arg1,
                in("rsi") arg2,
                in("rdx") arg3,
                in("r10") arg4,
                in("r8") arg5,
                in("r9") arg6,
                lateout("rcx") _,
                lateout("r11") _,
                options(nostack, preserves_flags)
            );
        }
        result
    }
}

#[cfg(target_arch = "aarch64")]
mod arch {
    pub const SYS_FCNTL: usize = 25;
    pub const SYS_OPENAT: usize = 56;
    pub const SYS_CLOSE: usize = 57;
    pub const SYS_LSEEK: usize = 62;
    pub const SYS_READ: usize = 63;
    pub const SYS_WRITE: usize = 64;
    pub const SYS_EXIT_GROUP: usize = 94;
    pub const SYS_MMAP: usize = 222;
    pub const SYS_MPROTECT: usize = 226;

    /// # Safety
    ///
    /// The kernel trusts every argument; pointers must be valid for the call.
    #[inline]
    pub unsafe fn syscall6(
        num: usize,
        arg1: usize,
        arg2: usize,
        arg3: usize,
        arg4: usize,
        arg5: usize,
        arg6: usize,
    ) -> usize {
        let result: usize;
        unsafe {
            core::arch::asm!(
                "svc 0",
                in("x8") num,
                inlateout("x0") arg1 => result,
                in("x1") arg2,
                in("x2") arg3,
                in("x3") arg4,
                in("x4") arg5,
                in("x5") arg6,
                options(nostack, preserves_flags)
            );
        }
        result
    }
}

pub use arch::*;

pub const PROT_NONE: usize = 0x0;
pub const PROT_READ: usize = 0x1;
pub const PROT_WRITE: usize = 0x2;
pub const MAP_PRIVATE: usize = 0x02;
pub const MAP_ANONYMOUS: usize = 0x20;
pub const MAP_NORESERVE: usize = 0x4000;
pub const F_DUPFD: usize = 0;
pub const AT_FDCWD: isize = -100;

const MAX_ERRNO: usize = 4095;

/// Splits a raw return value into a result or the errno encoded as `-errno`.
pub fn syscall_result(ret: usize) -> Result<usize, i32> {
    if ret > usize::MAX - MAX_ERRNO {
        Err(ret.wrapping_neg() as i32)
    } else {
        Ok(ret)
    }
}

/// # Safety
///
/// See [`syscall6`].
#[inline]
pub unsafe fn syscall3(num: usize, arg1: usize, arg2: usize, arg3: usize) -> usize {
    unsafe { syscall6(num, arg1, arg2, arg3, 0, 0, 0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_returns_decode_as_errno() {
        assert_eq!(syscall_result(0), Ok(0));
        assert_eq!(syscall_result(42), Ok(42));
        assert_eq!(syscall_result((-9isize) as usize), Err(9));
        assert_eq!(syscall_result((-4095isize) as usize), Err(4095));
    }

    #[test]
    fn closing_an_unopened_descriptor_reports_ebadf() {
        let ret = unsafe { syscall3(SYS_CLOSE, 987_654, 0, 0) };
        assert_eq!(syscall_result(ret), Err(9));
    }
}
