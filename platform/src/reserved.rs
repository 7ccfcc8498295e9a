use system::memory::{GrowError, HeapProvider, align_up};

use crate::PAGE_SIZE;

/// Address-space primitives of a host with separate reserve and commit steps.
pub trait VirtualMemory {
    /// Reserves `size` bytes of inaccessible address space and returns its start.
    fn reserve(&mut self, size: usize) -> Result<usize, GrowError>;
    /// Makes `[addr, addr + size)` of a reservation readable and writable.
    fn commit(&mut self, addr: usize, size: usize) -> Result<(), GrowError>;
}

/// Heap provider that reserves one large range up front and commits it
/// page by page as the heap grows.
pub struct ReservedHeap<V: VirtualMemory> {
    vm: V,
    base: usize,
    reserved: usize,
    committed: usize,
}

impl<V: VirtualMemory> ReservedHeap<V> {
    pub fn new(mut vm: V, reserve_size: usize) -> Result<Self, GrowError> {
        let base = vm.reserve(reserve_size)?;
        if base == 0 {
            return Err(GrowError::Unreserved);
        }
        Ok(ReservedHeap {
            vm,
            base,
            reserved: reserve_size,
            committed: 0,
        })
    }

    pub fn vm(&self) -> &V {
        &self.vm
    }
}

impl<V: VirtualMemory> HeapProvider for ReservedHeap<V> {
    fn base(&self) -> usize {
        self.base
    }

    fn committed_size(&self) -> usize {
        self.committed
    }

    fn page_size(&self) -> usize {
        PAGE_SIZE
    }

    fn grow(&mut self, min_bytes: usize) -> Result<usize, GrowError> {
        let old_end = self.base + self.committed;
        if min_bytes == 0 {
            return Ok(old_end);
        }
        let remaining = self.reserved - self.committed;
        if min_bytes > remaining {
            return Err(GrowError::AddressSpaceExhausted);
        }
        let bytes = align_up(min_bytes, PAGE_SIZE);
        if bytes > remaining {
            return Err(GrowError::AddressSpaceExhausted);
        }
        self.vm.commit(old_end, bytes)?;
        self.committed += bytes;
        Ok(old_end)
    }
}
