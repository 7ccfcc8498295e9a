use core::alloc::{GlobalAlloc, Layout};
use core::mem::size_of;
use core::ptr::{self, NonNull};

use system::memory::align_up;

use crate::config::ARENA_ALIGNMENT;
use crate::global::state;

/// Adapter that lets Rust programs use the process-wide buddy heap as their
/// `#[global_allocator]`.
///
/// Every payload is 16-byte aligned. Stricter alignments over-allocate and
/// keep the real block address in the word just before the returned pointer.
pub struct BuddyGlobalAlloc;

fn is_over_aligned(layout: Layout) -> bool {
    layout.align() > ARENA_ALIGNMENT
}

unsafe impl GlobalAlloc for BuddyGlobalAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let heap = &mut state().heap;
        if !is_over_aligned(layout) {
            return heap
                .allocate(layout.size())
                .map_or(ptr::null_mut(), NonNull::as_ptr);
        }

        let Some(total) = layout.size().checked_add(layout.align()) else {
            return ptr::null_mut();
        };
        let Ok(block) = heap.allocate(total) else {
            return ptr::null_mut();
        };
        let raw = block.as_ptr() as usize;
        let aligned = align_up(raw + size_of::<usize>(), layout.align());
        // Safety: `aligned - raw` is at most `align`, so the back pointer and
        // the payload both fit in the `size + align` bytes just allocated.
        unsafe {
            ((aligned - size_of::<usize>()) as *mut usize).write(raw);
        }
        aligned as *mut u8
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        let block = if is_over_aligned(layout) {
            unsafe { *(ptr as *const usize).sub(1) as *mut u8 }
        } else {
            ptr
        };
        if let Some(block) = NonNull::new(block) {
            let _ = unsafe { state().heap.free(block) };
        }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if !is_over_aligned(layout) {
            let usable = NonNull::new(ptr).and_then(|ptr| state().heap.usable_size(ptr));
            if usable.is_some_and(|usable| new_size <= usable) {
                return ptr;
            }
        }

        // Safety: the caller guarantees `new_size` forms a valid layout with this alignment.
        let new_layout = unsafe { Layout::from_size_align_unchecked(new_size, layout.align()) };
        let new_ptr = unsafe { self.alloc(new_layout) };
        if !new_ptr.is_null() {
            unsafe {
                ptr::copy_nonoverlapping(ptr, new_ptr, layout.size().min(new_size));
                self.dealloc(ptr, layout);
            }
        }
        new_ptr
    }
}
