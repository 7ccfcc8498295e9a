//! Translation of the portable open model into each host's native flag values.
//! Everything here is pure so every backend's mapping is tested on any host.

use system::file::{AccessMode, OpenFlags, Rights};

pub mod linux {
    pub const O_RDONLY: usize = 0x0;
    pub const O_WRONLY: usize = 0x1;
    pub const O_RDWR: usize = 0x2;
    pub const O_CREAT: usize = 0x40;
    pub const O_TRUNC: usize = 0x200;
}

pub mod macos {
    pub const O_RDONLY: i32 = 0x0;
    pub const O_WRONLY: i32 = 0x1;
    pub const O_RDWR: i32 = 0x2;
    pub const O_CREAT: i32 = 0x200;
    pub const O_TRUNC: i32 = 0x400;
}

pub mod windows {
    pub const GENERIC_READ: u32 = 0x8000_0000;
    pub const GENERIC_WRITE: u32 = 0x4000_0000;
    pub const CREATE_ALWAYS: u32 = 2;
    pub const OPEN_EXISTING: u32 = 3;
    pub const OPEN_ALWAYS: u32 = 4;
    pub const TRUNCATE_EXISTING: u32 = 5;
}

/// Permission bits for files created by `open`.
pub const CREATE_MODE: u32 = 0o644;

pub fn linux_open_flags(rights: Rights, flags: OpenFlags) -> usize {
    let mut native = match rights.access_mode() {
        AccessMode::ReadOnly => linux::O_RDONLY,
        AccessMode::WriteOnly => linux::O_WRONLY,
        AccessMode::ReadWrite => linux::O_RDWR,
    };
    if flags.contains(OpenFlags::CREATE) {
        native |= linux::O_CREAT;
    }
    if flags.contains(OpenFlags::TRUNCATE) {
        native |= linux::O_TRUNC;
    }
    native
}

pub fn macos_open_flags(rights: Rights, flags: OpenFlags) -> i32 {
    let mut native = match rights.access_mode() {
        AccessMode::ReadOnly => macos::O_RDONLY,
        AccessMode::WriteOnly => macos::O_WRONLY,
        AccessMode::ReadWrite => macos::O_RDWR,
    };
    if flags.contains(OpenFlags::CREATE) {
        native |= macos::O_CREAT;
    }
    if flags.contains(OpenFlags::TRUNCATE) {
        native |= macos::O_TRUNC;
    }
    native
}

pub fn windows_access(rights: Rights) -> u32 {
    match rights.access_mode() {
        AccessMode::ReadOnly => windows::GENERIC_READ,
        AccessMode::WriteOnly => windows::GENERIC_WRITE,
        AccessMode::ReadWrite => windows::GENERIC_READ | windows::GENERIC_WRITE,
    }
}

pub fn windows_disposition(flags: OpenFlags) -> u32 {
    let create = flags.contains(OpenFlags::CREATE);
    let truncate = flags.contains(OpenFlags::TRUNCATE);
    match (create, truncate) {
        (true, true) => windows::CREATE_ALWAYS,
        (true, false) => windows::OPEN_ALWAYS,
        (false, true) => windows::TRUNCATE_EXISTING,
        (false, false) => windows::OPEN_EXISTING,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linux_flags_combine_access_and_creation() {
        assert_eq!(linux_open_flags(Rights::READ, OpenFlags::empty()), 0);
        assert_eq!(linux_open_flags(Rights::WRITE, OpenFlags::CREATE), 0x41);
        assert_eq!(
            linux_open_flags(Rights::READ_WRITE, OpenFlags::CREATE | OpenFlags::TRUNCATE),
            0x242
        );
    }

    #[test]
    fn macos_uses_bsd_creation_bits() {
        assert_eq!(macos_open_flags(Rights::READ, OpenFlags::TRUNCATE), 0x400);
        assert_eq!(
            macos_open_flags(Rights::WRITE, OpenFlags::CREATE | OpenFlags::TRUNCATE),
            0x601
        );
    }

    #[test]
    fn windows_access_follows_rights() {
        assert_eq!(windows_access(Rights::READ), windows::GENERIC_READ);
        assert_eq!(windows_access(Rights::WRITE), windows::GENERIC_WRITE);
        assert_eq!(windows_access(Rights::READ_WRITE), 0xC000_0000);
        assert_eq!(windows_access(Rights::empty()), windows::GENERIC_READ);
    }

    #[test]
    fn windows_disposition_covers_every_combination() {
        assert_eq!(windows_disposition(OpenFlags::empty()), windows::OPEN_EXISTING);
        assert_eq!(windows_disposition(OpenFlags::CREATE), windows::OPEN_ALWAYS);
        assert_eq!(windows_disposition(OpenFlags::TRUNCATE), windows::TRUNCATE_EXISTING);
        assert_eq!(
            windows_disposition(OpenFlags::CREATE | OpenFlags::TRUNCATE),
            windows::CREATE_ALWAYS
        );
    }
}
