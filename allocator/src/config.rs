use system::debug::DebugOutput;

/// Smallest block the buddy allocator hands out, and the alignment of every block offset.
pub const MIN_BLOCK_SIZE: usize = 4096;

/// Largest order; `MIN_BLOCK_SIZE << MAX_ORDER` is 4 GiB.
#[cfg(target_pointer_width = "64")]
pub const MAX_ORDER: usize = 20;
#[cfg(target_pointer_width = "32")]
pub const MAX_ORDER: usize = 19;

pub const ORDER_COUNT: usize = MAX_ORDER + 1;

pub const ARENA_ALIGNMENT: usize = 16;
pub const MIN_CHUNK_SIZE: usize = 4096;

pub const SCRATCH_ARENA_COUNT: usize = 2;
pub const SCRATCH_CHUNK_SIZE: usize = 64 * 1024;

/// Runtime settings of the process-wide allocator.
#[derive(Clone, Copy)]
pub struct Config {
    /// Initial chunk size of each scratch arena.
    pub scratch_chunk_size: usize,
    /// Status the process exits with when memory runs out.
    pub exhaustion_exit_status: i32,
    /// Sink registered for diagnostics. `None` keeps whatever is registered.
    pub debug_output: Option<&'static dyn DebugOutput>,
}

impl Config {
    pub const DEFAULT: Config = Config {
        scratch_chunk_size: SCRATCH_CHUNK_SIZE,
        exhaustion_exit_status: 1,
        debug_output: Some(&platform::StderrOutput),
    };
}

impl Default for Config {
    fn default() -> Self {
        Config::DEFAULT
    }
}
