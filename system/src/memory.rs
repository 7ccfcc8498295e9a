#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MemoryRegion {
    pub start: usize,
    pub size: usize,
}

impl MemoryRegion {
    pub fn new(start: usize, size: usize) -> Self {
        MemoryRegion { start, size }
    }

    pub fn end(&self) -> usize {
        self.start + self.size
    }

    pub fn contains(&self, address: usize) -> bool {
        address >= self.start && address < self.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowError {
    /// The provider never obtained its address range.
    Unreserved,
    AddressSpaceExhausted,
    /// The OS refused to back the pages; carries the raw error code.
    CommitFailed(i32),
}

/// Source of committed memory for a heap.
///
/// The base address never moves once observed and the committed size only
/// ever increases. `grow` rounds the request up to `page_size()` and returns
/// the address that was `base() + committed_size()` before the call, so the
/// newly committed range always starts where the previous one ended.
pub trait HeapProvider {
    fn base(&self) -> usize;
    fn committed_size(&self) -> usize;
    fn page_size(&self) -> usize;
    fn grow(&mut self, min_bytes: usize) -> Result<usize, GrowError>;

    fn committed_end(&self) -> usize {
        self.base() + self.committed_size()
    }
}

pub const fn align_up(value: usize, alignment: usize) -> usize {
    (value + alignment - 1) & !(alignment - 1)
}
