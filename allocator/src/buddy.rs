use core::mem::size_of;
use core::ptr::NonNull;

use system::hprintln;
use system::memory::{HeapProvider, align_up};

use crate::config::{MAX_ORDER, MIN_BLOCK_SIZE, ORDER_COUNT};
use crate::stats::{self, HeapStats, OrderStats};

/// Header stored at the start of every block, free or allocated.
///
/// `order` is the block's order while it is free and `-(order + 1)` while it
/// is allocated. The links are offsets of neighbouring free blocks of the
/// same order, `NIL` when absent.
#[repr(C, align(16))]
struct BlockHeader {
    order: isize,
    prev: usize,
    next: usize,
}

pub const HEADER_SIZE: usize = size_of::<BlockHeader>();

const NIL: usize = usize::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// No order is large enough for the request plus its header.
    TooLarge,
    /// The provider refused to grow.
    OutOfMemory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeError {
    OutsideHeap,
    /// The address is not the payload of a live block.
    InvalidBlock,
}

pub const fn block_size(order: usize) -> usize {
    MIN_BLOCK_SIZE << order
}

/// Smallest order whose block holds `size` bytes after the header.
pub fn order_for(size: usize) -> Option<usize> {
    let needed = size.checked_add(HEADER_SIZE)?;
    (0..ORDER_COUNT).find(|&order| block_size(order) >= needed)
}

fn encode_allocated(order: usize) -> isize {
    -(order as isize + 1)
}

fn decode_allocated(raw: isize) -> Option<usize> {
    let order = raw.checked_neg()?.checked_sub(1)?;
    if (0..ORDER_COUNT as isize).contains(&order) {
        Some(order as usize)
    } else {
        None
    }
}

/// Buddy allocator over memory committed by a [`HeapProvider`].
///
/// Blocks are addressed by their offset from `origin`, the provider base
/// rounded up to [`MIN_BLOCK_SIZE`]. A block of order `o` always sits at an
/// offset that is a multiple of its size, so its buddy is at
/// `offset ^ block_size(o)`.
pub struct Heap<P: HeapProvider> {
    provider: P,
    origin: usize,
    end: usize,
    free_lists: [usize; ORDER_COUNT],
    used_blocks: [usize; ORDER_COUNT],
    grow_calls: usize,
}

impl<P: HeapProvider> Heap<P> {
    pub fn new(provider: P) -> Self {
        let origin = align_up(provider.base(), MIN_BLOCK_SIZE);
        let mut heap = Heap {
            provider,
            origin,
            end: 0,
            free_lists: [NIL; ORDER_COUNT],
            used_blocks: [0; ORDER_COUNT],
            grow_calls: 0,
        };
        heap.adopt_committed();
        heap
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn origin(&self) -> usize {
        self.origin
    }

    pub fn committed_size(&self) -> usize {
        self.provider.committed_size()
    }

    pub fn allocate(&mut self, size: usize) -> Result<NonNull<u8>, AllocError> {
        self.allocate_span(size).map(NonNull::cast)
    }

    /// Like [`Heap::allocate`], also reporting how many bytes the block can hold.
    pub fn allocate_span(&mut self, size: usize) -> Result<NonNull<[u8]>, AllocError> {
        let order = order_for(size).ok_or(AllocError::TooLarge)?;
        let offset = loop {
            if let Some(offset) = self.take_block(order) {
                break offset;
            }
            self.grow_for(order)?;
        };

        self.set_order(offset, encode_allocated(order));
        self.used_blocks[order] += 1;
        let payload = (self.origin + offset + HEADER_SIZE) as *mut u8;
        let span = core::ptr::slice_from_raw_parts_mut(payload, block_size(order) - HEADER_SIZE);
        // Safety: payload lies past the header of a committed block, never at address 0.
        Ok(unsafe { NonNull::new_unchecked(span) })
    }

    /// Returns the block holding `ptr` to the heap, merging it with free buddies.
    ///
    /// # Safety
    ///
    /// `ptr` must not be used after this call. Addresses that were never
    /// returned by this heap are rejected when they are outside it or their
    /// header does not describe a live block; anything else is undefined.
    pub unsafe fn free(&mut self, ptr: NonNull<u8>) -> Result<(), FreeError> {
        let (offset, order) = match self.live_block(ptr.as_ptr() as usize) {
            Ok(block) => block,
            Err(error) => {
                hprintln!("[HEAP] rejected free of {:p}: {:?}", ptr, error);
                return Err(error);
            }
        };
        self.used_blocks[order] -= 1;
        self.release(offset, order);
        Ok(())
    }

    /// Bytes available to the caller in the block holding `ptr`.
    pub fn usable_size(&self, ptr: NonNull<u8>) -> Option<usize> {
        self.live_block(ptr.as_ptr() as usize)
            .ok()
            .map(|(_, order)| block_size(order) - HEADER_SIZE)
    }

    pub fn stats(&self) -> HeapStats {
        let mut orders = [OrderStats::default(); ORDER_COUNT];
        for (order, entry) in orders.iter_mut().enumerate() {
            let mut cursor = self.free_lists[order];
            while cursor != NIL {
                entry.free += 1;
                cursor = self.header(cursor).next;
            }
            entry.used = self.used_blocks[order];
        }
        HeapStats {
            committed: self.provider.committed_size(),
            grow_calls: self.grow_calls,
            orders,
        }
    }

    pub fn print_stats(&self) {
        stats::print_stats(&self.stats());
    }

    fn live_block(&self, addr: usize) -> Result<(usize, usize), FreeError> {
        if addr < self.origin + HEADER_SIZE || addr >= self.origin + self.end {
            return Err(FreeError::OutsideHeap);
        }
        let offset = addr - HEADER_SIZE - self.origin;
        if offset % MIN_BLOCK_SIZE != 0 {
            return Err(FreeError::InvalidBlock);
        }
        let order = decode_allocated(self.order_at(offset)).ok_or(FreeError::InvalidBlock)?;
        let size = block_size(order);
        if offset % size != 0 || offset + size > self.end {
            return Err(FreeError::InvalidBlock);
        }
        Ok((offset, order))
    }

    fn take_block(&mut self, order: usize) -> Option<usize> {
        let mut current = (order..ORDER_COUNT).find(|&o| self.free_lists[o] != NIL)?;
        let offset = self.free_lists[current];
        self.unlink(current, offset);

        while current > order {
            current -= 1;
            self.push(current, offset + block_size(current));
        }
        Some(offset)
    }

    fn grow_for(&mut self, order: usize) -> Result<(), AllocError> {
        let size = block_size(order);
        let padding = align_up(self.end, size) - self.end;
        if let Err(error) = self.provider.grow(padding + size) {
            hprintln!("[HEAP] growth by {} bytes failed: {:?}", padding + size, error);
            return Err(AllocError::OutOfMemory);
        }
        self.grow_calls += 1;
        self.adopt_committed();
        Ok(())
    }

    /// Hands every whole minimum block committed past `end` to the free lists.
    ///
    /// `end` advances one block at a time so that `release` only ever looks
    /// at buddies whose headers are already written.
    fn adopt_committed(&mut self) {
        let committed = self.provider.committed_end().saturating_sub(self.origin);
        let new_end = committed - committed % MIN_BLOCK_SIZE;
        let mut offset = self.end;
        while offset < new_end {
            let mut order = 0;
            while order < MAX_ORDER
                && offset % block_size(order + 1) == 0
                && offset + block_size(order + 1) <= new_end
            {
                order += 1;
            }
            let next = offset + block_size(order);
            self.end = next;
            self.release(offset, order);
            offset = next;
        }
        self.end = self.end.max(new_end);
    }

    /// Puts a free block on its list, first merging it with every free buddy
    /// below `end`.
    fn release(&mut self, mut offset: usize, mut order: usize) {
        while order < MAX_ORDER {
            let buddy = offset ^ block_size(order);
            if buddy >= self.end || self.order_at(buddy) != order as isize {
                break;
            }
            self.unlink(order, buddy);
            offset = offset.min(buddy);
            order += 1;
        }
        self.push(order, offset);
    }

    /// True when some free block has a free buddy of the same order, a state
    /// `release` must never leave behind.
    #[cfg(test)]
    fn has_unmerged_buddies(&self) -> bool {
        (0..MAX_ORDER).any(|order| {
            let mut cursor = self.free_lists[order];
            while cursor != NIL {
                let buddy = cursor ^ block_size(order);
                if buddy < self.end && self.order_at(buddy) == order as isize {
                    return true;
                }
                cursor = self.header(cursor).next;
            }
            false
        })
    }

    fn header(&self, offset: usize) -> &BlockHeader {
        // Safety: offsets below `end` are block starts inside committed memory.
        unsafe { &*((self.origin + offset) as *const BlockHeader) }
    }

    fn header_mut(&mut self, offset: usize) -> &mut BlockHeader {
        // Safety: as in `header`; `&mut self` keeps the reference unique.
        unsafe { &mut *((self.origin + offset) as *mut BlockHeader) }
    }

    fn order_at(&self, offset: usize) -> isize {
        self.header(offset).order
    }

    fn set_order(&mut self, offset: usize, order: isize) {
        self.header_mut(offset).order = order;
    }

    fn push(&mut self, order: usize, offset: usize) {
        let head = self.free_lists[order];
        *self.header_mut(offset) = BlockHeader {
            order: order as isize,
            prev: NIL,
            next: head,
        };
        if head != NIL {
            self.header_mut(head).prev = offset;
        }
        self.free_lists[order] = offset;
    }

    fn unlink(&mut self, order: usize, offset: usize) {
        let (prev, next) = {
            let header = self.header(offset);
            (header.prev, header.next)
        };
        if prev == NIL {
            self.free_lists[order] = next;
        } else {
            self.header_mut(prev).next = next;
        }
        if next != NIL {
            self.header_mut(next).prev = prev;
        }
    }
}
