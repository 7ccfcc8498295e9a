#![cfg_attr(not(test), no_std)]

pub mod arena;
pub mod buddy;
mod cell;
pub mod config;
pub mod global;
mod global_alloc;
pub mod scratch;
pub mod stats;
#[cfg(test)]
mod testing;

pub use arena::{Arena, ArenaPosition};
pub use buddy::{AllocError, FreeError, Heap};
pub use global_alloc::BuddyGlobalAlloc;
pub use scratch::{Scratch, ScratchError, ScratchPool};
pub use stats::{HeapStats, OrderStats};
