#![cfg_attr(not(test), no_std)]

pub mod debug;
pub mod file;
pub mod memory;
