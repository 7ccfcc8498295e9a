#![cfg_attr(not(test), no_std)]

pub mod fd;
pub mod fixed;
pub mod flags;
mod output;
pub mod reserved;

#[cfg(all(
    target_os = "linux",
    any(target_arch = "x86_64", target_arch = "aarch64")
))]
mod linux;
#[cfg(all(
    target_os = "linux",
    any(target_arch = "x86_64", target_arch = "aarch64")
))]
use linux as native;

#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "macos")]
use macos as native;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
use windows as native;

#[cfg(target_arch = "wasm32")]
mod wasm;
#[cfg(target_arch = "wasm32")]
use wasm as native;

use core::ffi::CStr;

use system::file::{File, FileDescriptor, FileError, OpenFlags, Rights, Whence};
use system::memory::GrowError;

pub use fixed::FixedHeap;
pub use native::{NativeHeap, close, exit, read, seek, write};
pub use output::StderrOutput;
pub use reserved::{ReservedHeap, VirtualMemory};

/// Commit granularity of every backend. Matches the WebAssembly page.
pub const PAGE_SIZE: usize = 64 * 1024;

#[cfg(target_pointer_width = "64")]
pub const RESERVED_SIZE: usize = 1 << 32;
#[cfg(target_pointer_width = "32")]
pub const RESERVED_SIZE: usize = 1 << 30;

/// Sets up the heap provider of the build target.
pub fn native_heap() -> Result<NativeHeap, GrowError> {
    native::heap()
}

/// Opens `path`. The returned descriptor is never one of the standard streams.
pub fn open(path: &CStr, rights: Rights, flags: OpenFlags) -> Result<FileDescriptor, FileError> {
    native::open(path, rights, flags)
}

pub fn write_all(fd: FileDescriptor, mut buf: &[u8]) -> Result<(), FileError> {
    while !buf.is_empty() {
        match write(fd, buf)? {
            0 => return Err(FileError::WriteError),
            n => buf = &buf[n..],
        }
    }
    Ok(())
}

pub fn tell(fd: FileDescriptor) -> Result<u64, FileError> {
    seek(fd, 0, Whence::Current)
}

/// An open file that is closed when dropped.
pub struct NativeFile {
    fd: FileDescriptor,
}

impl NativeFile {
    pub fn open(path: &CStr, rights: Rights, flags: OpenFlags) -> Result<Self, FileError> {
        Ok(NativeFile {
            fd: open(path, rights, flags)?,
        })
    }

    pub fn descriptor(&self) -> FileDescriptor {
        self.fd
    }
}

impl File for NativeFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, FileError> {
        read(self.fd, buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, FileError> {
        write(self.fd, buf)
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64, FileError> {
        seek(self.fd, offset, whence)
    }
}

impl Drop for NativeFile {
    fn drop(&mut self) {
        let _ = close(self.fd);
    }
}
