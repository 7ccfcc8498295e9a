use bitflags::bitflags;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileError {
    NotFound,
    InvalidDescriptor,
    ReadError,
    WriteError,
    PermissionDenied,
    /// The OS kept handing back stdin/stdout/stderr and no renumbering worked.
    ReservedDescriptor,
    Os(i32),
}

impl FileError {
    /// Maps a POSIX errno value.
    pub fn from_errno(errno: i32) -> Self {
        match errno {
            1 | 13 => FileError::PermissionDenied,
            2 => FileError::NotFound,
            9 => FileError::InvalidDescriptor,
            _ => FileError::Os(errno),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileDescriptor(pub u64);

impl FileDescriptor {
    pub const STDIN: FileDescriptor = FileDescriptor(0);
    pub const STDOUT: FileDescriptor = FileDescriptor(1);
    pub const STDERR: FileDescriptor = FileDescriptor(2);

    pub fn is_reserved(&self) -> bool {
        self.0 <= Self::STDERR.0
    }
}

bitflags! {
    /// Capabilities requested when opening a file. Values match WASI rights.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Rights: u64 {
        const FD_READ = 0x2;
        const FD_SEEK = 0x4;
        const FD_TELL = 0x20;
        const FD_WRITE = 0x40;

        const READ = Self::FD_READ.bits() | Self::FD_SEEK.bits() | Self::FD_TELL.bits();
        const WRITE = Self::FD_WRITE.bits() | Self::FD_SEEK.bits() | Self::FD_TELL.bits();
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
    }
}

bitflags! {
    /// Creation flags. Values match WASI oflags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u16 {
        const CREATE = 0x1;
        const TRUNCATE = 0x8;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl Rights {
    /// Write without read opens write-only; no read or write right falls back to read-only.
    pub fn access_mode(&self) -> AccessMode {
        match (self.contains(Rights::FD_READ), self.contains(Rights::FD_WRITE)) {
            (true, true) => AccessMode::ReadWrite,
            (false, true) => AccessMode::WriteOnly,
            _ => AccessMode::ReadOnly,
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set = 0,
    Current = 1,
    End = 2,
}

pub trait File {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, FileError>;
    fn write(&mut self, buf: &[u8]) -> Result<usize, FileError>;
    fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64, FileError>;

    fn tell(&mut self) -> Result<u64, FileError> {
        self.seek(0, Whence::Current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rights_select_access_mode() {
        assert_eq!(Rights::READ.access_mode(), AccessMode::ReadOnly);
        assert_eq!(Rights::WRITE.access_mode(), AccessMode::WriteOnly);
        assert_eq!(Rights::READ_WRITE.access_mode(), AccessMode::ReadWrite);
        assert_eq!(Rights::FD_SEEK.access_mode(), AccessMode::ReadOnly);
    }

    #[test]
    fn combined_rights_use_wasi_bits() {
        assert_eq!(Rights::READ.bits(), 0x26);
        assert_eq!(Rights::WRITE.bits(), 0x64);
        assert_eq!(Rights::READ_WRITE.bits(), 0x66);
    }

    #[test]
    fn standard_descriptors_are_reserved() {
        assert!(FileDescriptor::STDIN.is_reserved());
        assert!(FileDescriptor::STDERR.is_reserved());
        assert!(!FileDescriptor(3).is_reserved());
    }

    #[test]
    fn errno_maps_to_file_error() {
        assert_eq!(FileError::from_errno(2), FileError::NotFound);
        assert_eq!(FileError::from_errno(13), FileError::PermissionDenied);
        assert_eq!(FileError::from_errno(9), FileError::InvalidDescriptor);
        assert_eq!(FileError::from_errno(28), FileError::Os(28));
    }
}
