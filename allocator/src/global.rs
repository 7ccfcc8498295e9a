//! The process-wide heap and scratch pool, set up implicitly on first use.
//!
//! Every function here assumes a single thread. Running out of memory is
//! terminal: a diagnostic goes to the debug output and the process exits with
//! [`Config::exhaustion_exit_status`].

use core::fmt;
use core::ptr::NonNull;

use lazy_static::lazy_static;
use platform::NativeHeap;
use spin::Once;
use system::debug::init_debug;
use system::hprintln;

use crate::arena::Arena;
use crate::buddy::{AllocError, Heap};
use crate::cell::GlobalCell;
use crate::config::Config;
use crate::scratch::{Scratch, ScratchError, ScratchPool};
use crate::stats::HeapStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    AlreadyInitialized,
}

pub(crate) struct GlobalState {
    pub(crate) heap: Heap<NativeHeap>,
    pub(crate) scratch: ScratchPool,
}

static CONFIG: Once<Config> = Once::new();

lazy_static! {
    static ref GLOBAL: GlobalCell<GlobalState> = GlobalCell::new(GlobalState::init());
}

fn config() -> &'static Config {
    CONFIG.call_once(|| Config::DEFAULT)
}

fn fatal(message: fmt::Arguments) -> ! {
    hprintln!("{}", message);
    platform::exit(config().exhaustion_exit_status)
}

impl GlobalState {
    fn init() -> Self {
        let config = config();
        if let Some(output) = config.debug_output {
            init_debug(output);
        }
        let provider = match platform::native_heap() {
            Ok(provider) => provider,
            Err(error) => fatal(format_args!("[HEAP] cannot reserve address space: {:?}", error)),
        };
        GlobalState {
            heap: Heap::new(provider),
            scratch: ScratchPool::new(config.scratch_chunk_size),
        }
    }
}

pub(crate) fn state() -> &'static mut GlobalState {
    GLOBAL.borrow_mut()
}

/// Installs `config` for the global state. Only possible before anything
/// else in this module has run.
pub fn configure(config: Config) -> Result<(), ConfigError> {
    let mut installed = false;
    CONFIG.call_once(|| {
        installed = true;
        config
    });
    if installed {
        Ok(())
    } else {
        Err(ConfigError::AlreadyInitialized)
    }
}

/// Allocates from the global heap. `None` when no block is large enough for
/// `size`; exits the process when the heap cannot grow.
pub fn allocate(size: usize) -> Option<NonNull<u8>> {
    match state().heap.allocate(size) {
        Ok(ptr) => Some(ptr),
        Err(AllocError::TooLarge) => None,
        Err(AllocError::OutOfMemory) => {
            fatal(format_args!("[HEAP] out of memory allocating {} bytes", size))
        }
    }
}

/// Returns `ptr` to the global heap. Null and rejected pointers are ignored.
///
/// # Safety
///
/// `ptr` must not be used afterwards.
pub unsafe fn free(ptr: *mut u8) {
    if let Some(ptr) = NonNull::new(ptr) {
        let _ = unsafe { state().heap.free(ptr) };
    }
}

pub fn arena_create(initial_size: usize) -> Arena {
    match Arena::create(&mut state().heap, initial_size) {
        Ok(arena) => arena,
        Err(error) => fatal(format_args!("[ARENA] cannot create arena: {:?}", error)),
    }
}

pub fn arena_allocate(arena: Arena, size: usize) -> NonNull<u8> {
    match arena.allocate(&mut state().heap, size) {
        Ok(ptr) => ptr,
        Err(error) => fatal(format_args!("[ARENA] allocation of {} bytes failed: {:?}", size, error)),
    }
}

/// # Safety
///
/// See [`Arena::destroy`].
pub unsafe fn arena_destroy(arena: Arena) {
    unsafe { arena.destroy(&mut state().heap) }
}

fn scratch_or_exit(result: Result<Scratch, ScratchError>) -> Scratch {
    match result {
        Ok(scratch) => scratch,
        Err(error) => fatal(format_args!("[SCRATCH] cannot begin scope: {:?}", error)),
    }
}

pub fn scratch_begin() -> Scratch {
    let state = state();
    scratch_or_exit(state.scratch.begin(&mut state.heap))
}

pub fn scratch_begin_avoiding_conflict(conflict: Arena) -> Scratch {
    let state = state();
    scratch_or_exit(state.scratch.begin_avoiding_conflict(&mut state.heap, conflict))
}

pub fn scratch_end(scratch: Scratch) {
    scratch.end();
}

pub fn stats() -> HeapStats {
    GLOBAL.borrow().heap.stats()
}

pub fn print_stats() {
    GLOBAL.borrow().heap.print_stats();
}

/// Serializes tests that touch the process-wide state.
#[cfg(test)]
pub(crate) static TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{read_bytes, write_bytes};

    fn lock() -> std::sync::MutexGuard<'static, ()> {
        TEST_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[test]
    fn configure_after_first_use_is_rejected() {
        let _guard = lock();
        let _ = stats();
        assert_eq!(configure(Config::DEFAULT), Err(ConfigError::AlreadyInitialized));
    }

    #[test]
    fn allocate_then_free_balances_used_blocks() {
        let _guard = lock();
        let used = stats().used_blocks();
        let ptr = allocate(100).unwrap();
        write_bytes(ptr, b"global");
        assert_eq!(read_bytes(ptr, 6), b"global");
        assert_eq!(stats().used_blocks(), used + 1);
        unsafe { free(ptr.as_ptr()) };
        assert_eq!(stats().used_blocks(), used);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn oversized_request_returns_none_without_growing() {
        let _guard = lock();
        let before = stats();
        assert_eq!(allocate((1 << 32) + 1), None);
        assert_eq!(stats().grow_calls, before.grow_calls);
    }

    #[test]
    fn committed_size_never_shrinks() {
        let _guard = lock();
        let before = stats().committed;
        let ptr = allocate(300_000).unwrap();
        let during = stats().committed;
        unsafe { free(ptr.as_ptr()) };
        assert!(during >= before);
        assert!(stats().committed >= during);
    }

    #[test]
    fn free_ignores_null_and_foreign_pointers() {
        let _guard = lock();
        let before = stats();
        let mut local = 0u64;
        unsafe {
            free(core::ptr::null_mut());
            free(&mut local as *mut u64 as *mut u8);
        }
        assert_eq!(stats(), before);
    }

    #[test]
    fn arena_round_trip() {
        let _guard = lock();
        let arena = arena_create(4096);
        let saved = arena.position();
        let first = arena_allocate(arena, 64);
        arena_allocate(arena, 64);
        arena.reset(saved);
        assert_eq!(arena_allocate(arena, 64), first);
        unsafe { arena_destroy(arena) };
    }

    #[test]
    fn scratch_scopes_over_the_global_pool() {
        let _guard = lock();
        let outer = scratch_begin();
        let inner = scratch_begin_avoiding_conflict(outer.arena());
        assert_ne!(inner.arena(), outer.arena());

        let kept = arena_allocate(outer.arena(), 16);
        write_bytes(kept, b"kept");
        arena_allocate(inner.arena(), 16);
        scratch_end(inner);
        assert_eq!(read_bytes(kept, 4), b"kept");
        scratch_end(outer);

        let again = scratch_begin();
        assert_eq!(arena_allocate(again.arena(), 16), kept);
        scratch_end(again);
    }
}
