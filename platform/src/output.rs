use system::debug::DebugOutput;
use system::file::FileDescriptor;

/// Debug sink writing straight to the process's standard error.
pub struct StderrOutput;

impl DebugOutput for StderrOutput {
    fn write_str(&self, s: &str) {
        let _ = crate::write_all(FileDescriptor::STDERR, s.as_bytes());
    }
}
