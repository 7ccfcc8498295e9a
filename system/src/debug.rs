use core::fmt::{self, Write};

use spin::Once;

pub trait DebugOutput: Send + Sync {
    fn write_str(&self, s: &str);
}

static DEBUG_OUTPUT: Once<&'static dyn DebugOutput> = Once::new();

/// Registers the sink for `hprint!`. Only the first registration sticks.
pub fn init_debug(output: &'static dyn DebugOutput) {
    DEBUG_OUTPUT.call_once(|| output);
}

pub fn is_initialized() -> bool {
    DEBUG_OUTPUT.get().is_some()
}

struct DebugWriter(&'static dyn DebugOutput);

impl fmt::Write for DebugWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_str(s);
        Ok(())
    }
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    if let Some(output) = DEBUG_OUTPUT.get() {
        let _ = DebugWriter(*output).write_fmt(args);
    }
}

#[macro_export]
macro_rules! hprintln {
      () => ($crate::hprint!("\n"));
      ($($arg:tt)*) => ($crate::hprint!("{}\n", format_args!($($arg)*)));
  }

#[macro_export]
macro_rules! hprint {
      ($($arg:tt)*) => ($crate::debug::_print(format_args!($($arg)*)));
  }
