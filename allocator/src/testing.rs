use core::ops::{Deref, DerefMut};
use std::vec;
use std::vec::Vec;

use platform::FixedHeap;
use system::memory::{GrowError, HeapProvider, MemoryRegion, align_up};

use crate::buddy::Heap;
use crate::config::MIN_BLOCK_SIZE;

/// Provider wrapper that records every growth request.
pub(crate) struct RecordingHeap<P> {
    inner: P,
    pub(crate) requests: Vec<usize>,
}

impl<P: HeapProvider> HeapProvider for RecordingHeap<P> {
    fn base(&self) -> usize {
        self.inner.base()
    }

    fn committed_size(&self) -> usize {
        self.inner.committed_size()
    }

    fn page_size(&self) -> usize {
        self.inner.page_size()
    }

    fn grow(&mut self, min_bytes: usize) -> Result<usize, GrowError> {
        self.requests.push(min_bytes);
        self.inner.grow(min_bytes)
    }
}

/// A heap over a zeroed `Vec`, which lives exactly as long as the heap.
pub(crate) struct TestHeap {
    heap: Heap<RecordingHeap<FixedHeap>>,
    _memory: Vec<u8>,
}

impl TestHeap {
    pub(crate) fn new(size: usize) -> Self {
        let mut memory = vec![0u8; size + MIN_BLOCK_SIZE];
        let start = align_up(memory.as_mut_ptr() as usize, MIN_BLOCK_SIZE);
        let provider = RecordingHeap {
            inner: unsafe { FixedHeap::new(MemoryRegion::new(start, size)) },
            requests: Vec::new(),
        };
        TestHeap {
            heap: Heap::new(provider),
            _memory: memory,
        }
    }

    pub(crate) fn requests(&self) -> &[usize] {
        &self.heap.provider().requests
    }
}

impl Deref for TestHeap {
    type Target = Heap<RecordingHeap<FixedHeap>>;

    fn deref(&self) -> &Self::Target {
        &self.heap
    }
}

impl DerefMut for TestHeap {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.heap
    }
}

pub(crate) fn write_bytes(ptr: core::ptr::NonNull<u8>, bytes: &[u8]) {
    unsafe { core::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr(), bytes.len()) }
}

pub(crate) fn read_bytes(ptr: core::ptr::NonNull<u8>, len: usize) -> Vec<u8> {
    unsafe { core::slice::from_raw_parts(ptr.as_ptr(), len).to_vec() }
}
