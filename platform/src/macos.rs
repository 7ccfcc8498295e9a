use core::ffi::CStr;

use system::file::{FileDescriptor, FileError, OpenFlags, Rights, Whence};
use system::memory::GrowError;

use crate::fd::{io_error, renumber_reserved};
use crate::flags::{CREATE_MODE, macos_open_flags};
use crate::reserved::{ReservedHeap, VirtualMemory};
use crate::RESERVED_SIZE;

fn errno() -> i32 {
    // Safety: libSystem keeps a valid thread-local errno slot.
    unsafe { *libc::__error() }
}

/// Reserves with `PROT_NONE` mappings and commits with `mprotect`.
pub struct MacVm;

impl VirtualMemory for MacVm {
    fn reserve(&mut self, size: usize) -> Result<usize, GrowError> {
        let addr = unsafe {
            libc::mmap(
                core::ptr::null_mut(),
                size,
                libc::PROT_NONE,
                libc::MAP_PRIVATE | libc::MAP_ANON,
                -1,
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(GrowError::Unreserved);
        }
        Ok(addr as usize)
    }

    fn commit(&mut self, addr: usize, size: usize) -> Result<(), GrowError> {
        let ret = unsafe {
            libc::mprotect(
                addr as *mut libc::c_void,
                size,
                libc::PROT_READ | libc::PROT_WRITE,
            )
        };
        if ret != 0 {
            return Err(GrowError::CommitFailed(errno()));
        }
        Ok(())
    }
}

pub type NativeHeap = ReservedHeap<MacVm>;

pub fn heap() -> Result<NativeHeap, GrowError> {
    ReservedHeap::new(MacVm, RESERVED_SIZE)
}

pub fn open(path: &CStr, rights: Rights, flags: OpenFlags) -> Result<FileDescriptor, FileError> {
    let fd = unsafe {
        libc::open(
            path.as_ptr(),
            macos_open_flags(rights, flags),
            CREATE_MODE as libc::c_uint,
        )
    };
    if fd < 0 {
        return Err(FileError::from_errno(errno()));
    }
    renumber_reserved(
        FileDescriptor(fd as u64),
        |low| {
            let fd = unsafe { libc::fcntl(low.0 as libc::c_int, libc::F_DUPFD, 3) };
            if fd < 0 {
                Err(FileError::from_errno(errno()))
            } else {
                Ok(FileDescriptor(fd as u64))
            }
        },
        |low| {
            let _ = close(low);
        },
    )
}

pub fn close(fd: FileDescriptor) -> Result<(), FileError> {
    if unsafe { libc::close(fd.0 as libc::c_int) } != 0 {
        return Err(FileError::from_errno(errno()));
    }
    Ok(())
}

pub fn read(fd: FileDescriptor, buf: &mut [u8]) -> Result<usize, FileError> {
    let n = unsafe { libc::read(fd.0 as libc::c_int, buf.as_mut_ptr().cast(), buf.len()) };
    if n < 0 {
        return Err(io_error(FileError::from_errno(errno()), FileError::ReadError));
    }
    Ok(n as usize)
}

pub fn write(fd: FileDescriptor, buf: &[u8]) -> Result<usize, FileError> {
    let n = unsafe { libc::write(fd.0 as libc::c_int, buf.as_ptr().cast(), buf.len()) };
    if n < 0 {
        return Err(io_error(FileError::from_errno(errno()), FileError::WriteError));
    }
    Ok(n as usize)
}

pub fn seek(fd: FileDescriptor, offset: i64, whence: Whence) -> Result<u64, FileError> {
    let pos = unsafe { libc::lseek(fd.0 as libc::c_int, offset, whence as libc::c_int) };
    if pos < 0 {
        return Err(FileError::from_errno(errno()));
    }
    Ok(pos as u64)
}

pub fn exit(status: i32) -> ! {
    unsafe { libc::_exit(status) }
}
