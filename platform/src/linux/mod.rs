mod syscall;

use core::ffi::CStr;

use system::file::{FileDescriptor, FileError, OpenFlags, Rights, Whence};
use system::memory::GrowError;

use self::syscall::*;
use crate::fd::{io_error, renumber_reserved};
use crate::flags::{CREATE_MODE, linux_open_flags};
use crate::reserved::{ReservedHeap, VirtualMemory};
use crate::RESERVED_SIZE;

/// Reserves with `PROT_NONE` mappings and commits with `mprotect`.
pub struct LinuxVm;

impl VirtualMemory for LinuxVm {
    fn reserve(&mut self, size: usize) -> Result<usize, GrowError> {
        // Safety: an anonymous mapping at a kernel-chosen address aliases nothing.
        let ret = unsafe {
            syscall6(
                SYS_MMAP,
                0,
                size,
                PROT_NONE,
                MAP_PRIVATE | MAP_ANONYMOUS | MAP_NORESERVE,
                usize::MAX,
                0,
            )
        };
        syscall_result(ret).map_err(|_| GrowError::Unreserved)
    }

    fn commit(&mut self, addr: usize, size: usize) -> Result<(), GrowError> {
        // Safety: the range lies inside our own reservation.
        let ret = unsafe { syscall3(SYS_MPROTECT, addr, size, PROT_READ | PROT_WRITE) };
        syscall_result(ret).map(|_| ()).map_err(GrowError::CommitFailed)
    }
}

pub type NativeHeap = ReservedHeap<LinuxVm>;

pub fn heap() -> Result<NativeHeap, GrowError> {
    ReservedHeap::new(LinuxVm, RESERVED_SIZE)
}

pub fn open(path: &CStr, rights: Rights, flags: OpenFlags) -> Result<FileDescriptor, FileError> {
    // Safety: `path` is NUL terminated and outlives the call.
    let ret = unsafe {
        syscall6(
            SYS_OPENAT,
            AT_FDCWD as usize,
            path.as_ptr() as usize,
            linux_open_flags(rights, flags),
            CREATE_MODE as usize,
            0,
            0,
        )
    };
    let fd = syscall_result(ret).map_err(FileError::from_errno)?;
    renumber_reserved(
        FileDescriptor(fd as u64),
        |low| {
            let ret = unsafe { syscall3(SYS_FCNTL, low.0 as usize, F_DUPFD, 3) };
            syscall_result(ret)
                .map(|fd| FileDescriptor(fd as u64))
                .map_err(FileError::from_errno)
        },
        |low| {
            let _ = close(low);
        },
    )
}

pub fn close(fd: FileDescriptor) -> Result<(), FileError> {
    let ret = unsafe { syscall3(SYS_CLOSE, fd.0 as usize, 0, 0) };
    syscall_result(ret).map(|_| ()).map_err(FileError::from_errno)
}

pub fn read(fd: FileDescriptor, buf: &mut [u8]) -> Result<usize, FileError> {
    // Safety: the kernel writes at most `buf.len()` bytes into `buf`.
    let ret = unsafe { syscall3(SYS_READ, fd.0 as usize, buf.as_mut_ptr() as usize, buf.len()) };
    syscall_result(ret).map_err(|errno| io_error(FileError::from_errno(errno), FileError::ReadError))
}

pub fn write(fd: FileDescriptor, buf: &[u8]) -> Result<usize, FileError> {
    let ret = unsafe { syscall3(SYS_WRITE, fd.0 as usize, buf.as_ptr() as usize, buf.len()) };
    syscall_result(ret).map_err(|errno| io_error(FileError::from_errno(errno), FileError::WriteError))
}

pub fn seek(fd: FileDescriptor, offset: i64, whence: Whence) -> Result<u64, FileError> {
    let ret = unsafe { syscall3(SYS_LSEEK, fd.0 as usize, offset as usize, whence as usize) };
    syscall_result(ret)
        .map(|pos| pos as u64)
        .map_err(FileError::from_errno)
}

pub fn exit(status: i32) -> ! {
    unsafe {
        syscall3(SYS_EXIT_GROUP, status as usize, 0, 0);
    }
    loop {
        core::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NativeFile;
    use std::ffi::CString;
    use std::format;
    use system::file::File;
    use system::memory::HeapProvider;

    fn temp_path(name: &str) -> CString {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("platform-{}-{}", std::process::id(), name));
        CString::new(path.to_string_lossy().as_bytes()).unwrap()
    }

    #[test]
    fn file_round_trip() {
        let path = temp_path("round-trip");
        {
            let mut file = NativeFile::open(
                &path,
                Rights::READ_WRITE,
                OpenFlags::CREATE | OpenFlags::TRUNCATE,
            )
            .unwrap();
            assert!(!file.descriptor().is_reserved());
            crate::write_all(file.descriptor(), b"hello heap").unwrap();
            assert_eq!(file.tell(), Ok(10));
            assert_eq!(file.seek(6, Whence::Set), Ok(6));

            let mut buf = [0u8; 8];
            let n = file.read(&mut buf).unwrap();
            assert_eq!(&buf[..n], b"heap");
            assert_eq!(file.seek(0, Whence::End), Ok(10));
        }
        std::fs::remove_file(path.to_str().unwrap()).unwrap();
    }

    #[test]
    fn missing_file_is_not_found() {
        let path = temp_path("does-not-exist");
        assert_eq!(
            open(&path, Rights::READ, OpenFlags::empty()),
            Err(FileError::NotFound)
        );
    }

    #[test]
    fn operations_on_closed_descriptor_fail() {
        let fd = FileDescriptor(987_654);
        assert_eq!(close(fd), Err(FileError::InvalidDescriptor));
        assert_eq!(write(fd, b"x"), Err(FileError::InvalidDescriptor));
        assert_eq!(crate::tell(fd), Err(FileError::InvalidDescriptor));
    }

    #[test]
    fn committed_pages_are_writable() {
        let mut heap = heap().unwrap();
        assert_eq!(heap.committed_size(), 0);
        assert_eq!(heap.base() % 4096, 0);

        let start = heap.grow(100).unwrap();
        assert_eq!(start, heap.base());
        assert_eq!(heap.committed_size(), crate::PAGE_SIZE);

        let memory = unsafe { core::slice::from_raw_parts_mut(start as *mut u8, crate::PAGE_SIZE) };
        memory[0] = 0xAB;
        memory[crate::PAGE_SIZE - 1] = 0xCD;
        assert_eq!(memory[0], 0xAB);
        assert_eq!(memory[crate::PAGE_SIZE - 1], 0xCD);
    }
}
