use core::arch::wasm32;
use core::ffi::CStr;

use system::file::{FileDescriptor, FileError, OpenFlags, Rights, Whence};
use system::memory::{GrowError, HeapProvider, align_up};

use crate::fd::{io_error, renumber_reserved};
use crate::PAGE_SIZE;

/// The first directory a WASI host preopens for the module.
const PREOPEN_DIR: u32 = 3;

const ERRNO_ACCES: u16 = 2;
const ERRNO_BADF: u16 = 8;
const ERRNO_NOENT: u16 = 44;
const ERRNO_PERM: u16 = 63;

#[repr(C)]
struct Iovec {
    buf: *mut u8,
    len: usize,
}

#[repr(C)]
struct Ciovec {
    buf: *const u8,
    len: usize,
}

#[link(wasm_import_module = "wasi_snapshot_preview1")]
unsafe extern "C" {
    fn path_open(
        dirfd: u32,
        dirflags: u32,
        path: *const u8,
        path_len: usize,
        oflags: u16,
        rights_base: u64,
        rights_inheriting: u64,
        fdflags: u16,
        opened: *mut u32,
    ) -> u16;
    fn fd_close(fd: u32) -> u16;
    fn fd_read(fd: u32, iovs: *const Iovec, iovs_len: usize, nread: *mut usize) -> u16;
    fn fd_write(fd: u32, iovs: *const Ciovec, iovs_len: usize, nwritten: *mut usize) -> u16;
    fn fd_seek(fd: u32, offset: i64, whence: u8, newoffset: *mut u64) -> u16;
    fn proc_exit(code: u32) -> !;
}

unsafe extern "C" {
    static __heap_base: u8;
}

fn wasi_error(errno: u16) -> FileError {
    match errno {
        ERRNO_NOENT => FileError::NotFound,
        ERRNO_BADF => FileError::InvalidDescriptor,
        ERRNO_ACCES | ERRNO_PERM => FileError::PermissionDenied,
        other => FileError::Os(other as i32),
    }
}

/// Linear memory past the linker's `__heap_base`, grown with `memory.grow`.
pub struct WasmHeap {
    base: usize,
}

impl HeapProvider for WasmHeap {
    fn base(&self) -> usize {
        self.base
    }

    fn committed_size(&self) -> usize {
        wasm32::memory_size(0) * PAGE_SIZE - self.base
    }

    fn page_size(&self) -> usize {
        PAGE_SIZE
    }

    fn grow(&mut self, min_bytes: usize) -> Result<usize, GrowError> {
        let old_end = wasm32::memory_size(0) * PAGE_SIZE;
        if min_bytes == 0 {
            return Ok(old_end);
        }
        if min_bytes > usize::MAX - PAGE_SIZE {
            return Err(GrowError::AddressSpaceExhausted);
        }
        let pages = align_up(min_bytes, PAGE_SIZE) / PAGE_SIZE;
        if wasm32::memory_grow(0, pages) == usize::MAX {
            return Err(GrowError::AddressSpaceExhausted);
        }
        Ok(old_end)
    }
}

pub type NativeHeap = WasmHeap;

pub fn heap() -> Result<NativeHeap, GrowError> {
    let base = unsafe { &raw const __heap_base } as usize;
    Ok(WasmHeap { base })
}

fn path_open_raw(path: &CStr, rights: Rights, flags: OpenFlags) -> Result<FileDescriptor, FileError> {
    let bytes = path.to_bytes();
    let mut opened = 0u32;
    let errno = unsafe {
        path_open(
            PREOPEN_DIR,
            0,
            bytes.as_ptr(),
            bytes.len(),
            flags.bits(),
            rights.bits(),
            0,
            0,
            &mut opened,
        )
    };
    if errno != 0 {
        return Err(wasi_error(errno));
    }
    Ok(FileDescriptor(opened as u64))
}

pub fn open(path: &CStr, rights: Rights, flags: OpenFlags) -> Result<FileDescriptor, FileError> {
    let fd = path_open_raw(path, rights, flags)?;
    // Reopening must not truncate the file a second time.
    let reopen_flags = flags - OpenFlags::TRUNCATE;
    renumber_reserved(
        fd,
        |_| path_open_raw(path, rights, reopen_flags),
        |low| {
            let _ = close(low);
        },
    )
}

pub fn close(fd: FileDescriptor) -> Result<(), FileError> {
    match unsafe { fd_close(fd.0 as u32) } {
        0 => Ok(()),
        errno => Err(wasi_error(errno)),
    }
}

pub fn read(fd: FileDescriptor, buf: &mut [u8]) -> Result<usize, FileError> {
    let iov = Iovec {
        buf: buf.as_mut_ptr(),
        len: buf.len(),
    };
    let mut nread = 0usize;
    match unsafe { fd_read(fd.0 as u32, &iov, 1, &mut nread) } {
        0 => Ok(nread),
        errno => Err(io_error(wasi_error(errno), FileError::ReadError)),
    }
}

pub fn write(fd: FileDescriptor, buf: &[u8]) -> Result<usize, FileError> {
    let iov = Ciovec {
        buf: buf.as_ptr(),
        len: buf.len(),
    };
    let mut written = 0usize;
    match unsafe { fd_write(fd.0 as u32, &iov, 1, &mut written) } {
        0 => Ok(written),
        errno => Err(io_error(wasi_error(errno), FileError::WriteError)),
    }
}

pub fn seek(fd: FileDescriptor, offset: i64, whence: Whence) -> Result<u64, FileError> {
    let mut position = 0u64;
    match unsafe { fd_seek(fd.0 as u32, offset, whence as u8, &mut position) } {
        0 => Ok(position),
        errno => Err(wasi_error(errno)),
    }
}

pub fn exit(status: i32) -> ! {
    unsafe { proc_exit(status as u32) }
}
