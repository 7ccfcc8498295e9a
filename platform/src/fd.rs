use system::file::{FileDescriptor, FileError};

/// Moves a freshly opened descriptor out of the standard range 0..=2.
///
/// `duplicate` is asked for a new descriptor for the same file until one above
/// 2 comes back. Every low descriptor handed out on the way is closed before
/// returning, whatever the outcome.
pub fn renumber_reserved<D, C>(
    fd: FileDescriptor,
    mut duplicate: D,
    mut close: C,
) -> Result<FileDescriptor, FileError>
where
    D: FnMut(FileDescriptor) -> Result<FileDescriptor, FileError>,
    C: FnMut(FileDescriptor),
{
    if !fd.is_reserved() {
        return Ok(fd);
    }

    let mut held = [FileDescriptor(0); 3];
    let mut count = 0;
    let mut current = fd;
    let result = loop {
        if !current.is_reserved() {
            break Ok(current);
        }
        if count == held.len() {
            break Err(FileError::ReservedDescriptor);
        }
        held[count] = current;
        count += 1;
        match duplicate(current) {
            Ok(next) => current = next,
            Err(_) => break Err(FileError::ReservedDescriptor),
        }
    };

    for low in &held[..count] {
        close(*low);
    }
    result
}

/// Narrows an OS error to the descriptor error when it is one, else to `fallback`.
pub(crate) fn io_error(error: FileError, fallback: FileError) -> FileError {
    match error {
        FileError::InvalidDescriptor => FileError::InvalidDescriptor,
        _ => fallback,
    }
}
