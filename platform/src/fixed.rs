use system::memory::{GrowError, HeapProvider, MemoryRegion, align_up};

use crate::PAGE_SIZE;

/// Heap provider over a region the caller already owns, such as a static
/// buffer. Growth hands out the region page by page.
pub struct FixedHeap {
    region: MemoryRegion,
    committed: usize,
    page_size: usize,
}

impl FixedHeap {
    /// # Safety
    ///
    /// `region` must be valid for reads and writes for the lifetime of the
    /// provider and of every heap built on it.
    pub unsafe fn new(region: MemoryRegion) -> Self {
        unsafe { FixedHeap::with_page_size(region, PAGE_SIZE) }
    }

    /// # Safety
    ///
    /// Same as [`FixedHeap::new`]. `page_size` must be a power of two.
    pub unsafe fn with_page_size(region: MemoryRegion, page_size: usize) -> Self {
        debug_assert!(page_size.is_power_of_two());
        FixedHeap {
            region,
            committed: 0,
            page_size,
        }
    }
}

impl HeapProvider for FixedHeap {
    fn base(&self) -> usize {
        self.region.start
    }

    fn committed_size(&self) -> usize {
        self.committed
    }

    fn page_size(&self) -> usize {
        self.page_size
    }

    fn grow(&mut self, min_bytes: usize) -> Result<usize, GrowError> {
        let old_end = self.region.start + self.committed;
        if min_bytes == 0 {
            return Ok(old_end);
        }
        let remaining = self.region.size - self.committed;
        if min_bytes > remaining || align_up(min_bytes, self.page_size) > remaining {
            return Err(GrowError::AddressSpaceExhausted);
        }
        self.committed += align_up(min_bytes, self.page_size);
        Ok(old_end)
    }
}
