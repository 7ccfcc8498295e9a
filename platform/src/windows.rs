use core::ffi::CStr;
use core::ptr;

use system::file::{FileDescriptor, FileError, OpenFlags, Rights, Whence};
use system::memory::GrowError;
use windows_sys::Win32::Foundation::{
    CloseHandle, DUPLICATE_SAME_ACCESS, DuplicateHandle, GetLastError, HANDLE,
    INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileA, FILE_ATTRIBUTE_NORMAL, FILE_SHARE_READ, FILE_SHARE_WRITE, ReadFile,
    SetFilePointerEx, WriteFile,
};
use windows_sys::Win32::System::Console::{
    GetStdHandle, STD_ERROR_HANDLE, STD_INPUT_HANDLE, STD_OUTPUT_HANDLE,
};
use windows_sys::Win32::System::Memory::{
    MEM_COMMIT, MEM_RESERVE, PAGE_NOACCESS, PAGE_READWRITE, VirtualAlloc,
};
use windows_sys::Win32::System::Threading::{ExitProcess, GetCurrentProcess};

use crate::fd::{io_error, renumber_reserved};
use crate::flags::{windows_access, windows_disposition};
use crate::reserved::{ReservedHeap, VirtualMemory};
use crate::RESERVED_SIZE;

const ERROR_FILE_NOT_FOUND: u32 = 2;
const ERROR_PATH_NOT_FOUND: u32 = 3;
const ERROR_ACCESS_DENIED: u32 = 5;
const ERROR_INVALID_HANDLE: u32 = 6;

fn last_error() -> FileError {
    match unsafe { GetLastError() } {
        ERROR_FILE_NOT_FOUND | ERROR_PATH_NOT_FOUND => FileError::NotFound,
        ERROR_ACCESS_DENIED => FileError::PermissionDenied,
        ERROR_INVALID_HANDLE => FileError::InvalidDescriptor,
        code => FileError::Os(code as i32),
    }
}

/// Descriptors 0..=2 name the standard streams; anything else is a raw handle value.
fn handle(fd: FileDescriptor) -> HANDLE {
    let std = match fd.0 {
        0 => STD_INPUT_HANDLE,
        1 => STD_OUTPUT_HANDLE,
        2 => STD_ERROR_HANDLE,
        raw => return raw as usize as HANDLE,
    };
    unsafe { GetStdHandle(std) }
}

/// Reserves with `MEM_RESERVE` and commits with `MEM_COMMIT`.
pub struct WindowsVm;

impl VirtualMemory for WindowsVm {
    fn reserve(&mut self, size: usize) -> Result<usize, GrowError> {
        let addr = unsafe { VirtualAlloc(ptr::null(), size, MEM_RESERVE, PAGE_NOACCESS) };
        if addr.is_null() {
            return Err(GrowError::Unreserved);
        }
        Ok(addr as usize)
    }

    fn commit(&mut self, addr: usize, size: usize) -> Result<(), GrowError> {
        let committed =
            unsafe { VirtualAlloc(addr as *const core::ffi::c_void, size, MEM_COMMIT, PAGE_READWRITE) };
        if committed.is_null() {
            return Err(GrowError::CommitFailed(unsafe { GetLastError() } as i32));
        }
        Ok(())
    }
}

pub type NativeHeap = ReservedHeap<WindowsVm>;

pub fn heap() -> Result<NativeHeap, GrowError> {
    ReservedHeap::new(WindowsVm, RESERVED_SIZE)
}

pub fn open(path: &CStr, rights: Rights, flags: OpenFlags) -> Result<FileDescriptor, FileError> {
    let file = unsafe {
        CreateFileA(
            path.as_ptr().cast(),
            windows_access(rights),
            FILE_SHARE_READ | FILE_SHARE_WRITE,
            ptr::null(),
            windows_disposition(flags),
            FILE_ATTRIBUTE_NORMAL,
            ptr::null_mut(),
        )
    };
    if file == INVALID_HANDLE_VALUE {
        return Err(last_error());
    }
    renumber_reserved(
        FileDescriptor(file as usize as u64),
        |low| {
            let mut duplicate: HANDLE = ptr::null_mut();
            let ok = unsafe {
                DuplicateHandle(
                    GetCurrentProcess(),
                    low.0 as usize as HANDLE,
                    GetCurrentProcess(),
                    &mut duplicate,
                    0,
                    0,
                    DUPLICATE_SAME_ACCESS,
                )
            };
            if ok == 0 {
                Err(last_error())
            } else {
                Ok(FileDescriptor(duplicate as usize as u64))
            }
        },
        |low| unsafe {
            CloseHandle(low.0 as usize as HANDLE);
        },
    )
}

pub fn close(fd: FileDescriptor) -> Result<(), FileError> {
    if unsafe { CloseHandle(handle(fd)) } == 0 {
        return Err(last_error());
    }
    Ok(())
}

pub fn read(fd: FileDescriptor, buf: &mut [u8]) -> Result<usize, FileError> {
    let len = buf.len().min(u32::MAX as usize) as u32;
    let mut read = 0u32;
    let ok = unsafe { ReadFile(handle(fd), buf.as_mut_ptr(), len, &mut read, ptr::null_mut()) };
    if ok == 0 {
        return Err(io_error(last_error(), FileError::ReadError));
    }
    Ok(read as usize)
}

pub fn write(fd: FileDescriptor, buf: &[u8]) -> Result<usize, FileError> {
    let len = buf.len().min(u32::MAX as usize) as u32;
    let mut written = 0u32;
    let ok = unsafe { WriteFile(handle(fd), buf.as_ptr(), len, &mut written, ptr::null_mut()) };
    if ok == 0 {
        return Err(io_error(last_error(), FileError::WriteError));
    }
    Ok(written as usize)
}

pub fn seek(fd: FileDescriptor, offset: i64, whence: Whence) -> Result<u64, FileError> {
    let mut position = 0i64;
    let ok = unsafe { SetFilePointerEx(handle(fd), offset, &mut position, whence as u32) };
    if ok == 0 {
        return Err(last_error());
    }
    Ok(position as u64)
}

pub fn exit(status: i32) -> ! {
    unsafe { ExitProcess(status as u32) }
}
