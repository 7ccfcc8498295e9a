use core::alloc::Layout;
use core::mem::size_of;
use core::ptr::NonNull;

use system::memory::{HeapProvider, align_up};

use crate::buddy::{AllocError, Heap};
use crate::config::{ARENA_ALIGNMENT, MIN_CHUNK_SIZE};

/// Prefix of every chunk. The first chunk also carries the [`ArenaState`].
struct ChunkHeader {
    next: Option<NonNull<ChunkHeader>>,
    data_start: usize,
    end: usize,
}

struct ArenaState {
    first: NonNull<ChunkHeader>,
    current: NonNull<ChunkHeader>,
    cursor: usize,
    end: usize,
    chunk_size: usize,
}

const CHUNK_HEADER_SIZE: usize = align_up(size_of::<ChunkHeader>(), ARENA_ALIGNMENT);
const STATE_SIZE: usize = align_up(size_of::<ArenaState>(), ARENA_ALIGNMENT);

/// Bump allocator over a list of buddy blocks.
///
/// The handle is a plain pointer to state kept inside the arena's own first
/// chunk, so copies all refer to the same arena. It stays valid until
/// [`Arena::destroy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arena(NonNull<ArenaState>);

/// A saved bump position to roll back to with [`Arena::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaPosition {
    chunk: NonNull<ChunkHeader>,
    cursor: usize,
}

/// Writes a fresh chunk header at the start of `block` and returns it.
fn init_chunk(block: NonNull<[u8]>, reserved: usize) -> NonNull<ChunkHeader> {
    let start = block.cast::<u8>().as_ptr() as usize;
    let chunk = block.cast::<ChunkHeader>();
    // Safety: the block is ours, 16-byte aligned and larger than the header.
    unsafe {
        chunk.as_ptr().write(ChunkHeader {
            next: None,
            data_start: start + CHUNK_HEADER_SIZE + reserved,
            end: start + block.len(),
        });
    }
    chunk
}

impl Arena {
    /// Creates an arena whose chunks hold at least `initial_size` bytes.
    pub fn create<P: HeapProvider>(
        heap: &mut Heap<P>,
        initial_size: usize,
    ) -> Result<Arena, AllocError> {
        let chunk_size = initial_size.max(MIN_CHUNK_SIZE);
        let total = (CHUNK_HEADER_SIZE + STATE_SIZE)
            .checked_add(chunk_size)
            .ok_or(AllocError::TooLarge)?;
        let block = heap.allocate_span(total)?;
        let first = init_chunk(block, STATE_SIZE);

        let state_ptr = unsafe { first.cast::<u8>().add(CHUNK_HEADER_SIZE).cast::<ArenaState>() };
        // Safety: STATE_SIZE bytes were set aside right after the chunk header.
        unsafe {
            let header = first.as_ref();
            state_ptr.as_ptr().write(ArenaState {
                first,
                current: first,
                cursor: header.data_start,
                end: header.end,
                chunk_size,
            });
        }
        Ok(Arena(state_ptr))
    }

    #[allow(clippy::mut_from_ref)]
    fn state(&self) -> &mut ArenaState {
        // Safety: the state lives in the first chunk until `destroy`.
        unsafe { &mut *self.0.as_ptr() }
    }

    /// Bumps out `size` bytes aligned to [`ARENA_ALIGNMENT`].
    pub fn allocate<P: HeapProvider>(
        &self,
        heap: &mut Heap<P>,
        size: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        let layout =
            Layout::from_size_align(size, ARENA_ALIGNMENT).map_err(|_| AllocError::TooLarge)?;
        self.allocate_layout(heap, layout)
    }

    pub fn allocate_layout<P: HeapProvider>(
        &self,
        heap: &mut Heap<P>,
        layout: Layout,
    ) -> Result<NonNull<u8>, AllocError> {
        let align = layout.align().max(ARENA_ALIGNMENT);
        let size = layout.size();
        let state = self.state();

        loop {
            let start = align_up(state.cursor, align);
            if start <= state.end && size <= state.end - start {
                state.cursor = start + size;
                // Safety: `start` is inside a live chunk.
                return Ok(unsafe { NonNull::new_unchecked(start as *mut u8) });
            }

            // Safety: `current` is a live chunk of this arena.
            match unsafe { state.current.as_ref().next } {
                Some(next) => {
                    let header = unsafe { next.as_ref() };
                    state.current = next;
                    state.cursor = header.data_start;
                    state.end = header.end;
                }
                None => {
                    let data = size
                        .checked_add(align - ARENA_ALIGNMENT)
                        .ok_or(AllocError::TooLarge)?
                        .max(state.chunk_size);
                    let total = data
                        .checked_add(CHUNK_HEADER_SIZE)
                        .ok_or(AllocError::TooLarge)?;
                    let chunk = init_chunk(heap.allocate_span(total)?, 0);
                    unsafe {
                        state.current.as_mut().next = Some(chunk);
                        let header = chunk.as_ref();
                        state.cursor = header.data_start;
                        state.end = header.end;
                    }
                    state.current = chunk;
                }
            }
        }
    }

    pub fn position(&self) -> ArenaPosition {
        let state = self.state();
        ArenaPosition {
            chunk: state.current,
            cursor: state.cursor,
        }
    }

    /// Position of an empty arena: resetting to it discards every allocation.
    pub fn first_position(&self) -> ArenaPosition {
        let first = self.state().first;
        ArenaPosition {
            chunk: first,
            cursor: unsafe { first.as_ref().data_start },
        }
    }

    /// Rolls the arena back to `position`. Later chunks stay linked and are
    /// reused before new ones are requested.
    pub fn reset(&self, position: ArenaPosition) {
        let state = self.state();
        state.current = position.chunk;
        state.cursor = position.cursor;
        state.end = unsafe { position.chunk.as_ref().end };
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks().count()
    }

    /// Zero-based index of the chunk currently being bumped.
    pub fn current_chunk_index(&self) -> usize {
        let current = self.state().current;
        self.chunks().take_while(|&chunk| chunk != current).count()
    }

    fn chunks(&self) -> impl Iterator<Item = NonNull<ChunkHeader>> {
        let mut next = Some(self.state().first);
        core::iter::from_fn(move || {
            let chunk = next?;
            next = unsafe { chunk.as_ref().next };
            Some(chunk)
        })
    }

    /// Returns every chunk to `heap`.
    ///
    /// # Safety
    ///
    /// The arena, every copy of the handle and every pointer it handed out
    /// are dangling afterwards. `heap` must be the heap the arena was created on.
    pub unsafe fn destroy<P: HeapProvider>(self, heap: &mut Heap<P>) {
        let mut next = Some(self.state().first);
        while let Some(chunk) = next {
            next = unsafe { chunk.as_ref().next };
            let freed = unsafe { heap.free(chunk.cast()) };
            debug_assert!(freed.is_ok(), "arena chunk rejected by heap: {:?}", freed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TestHeap, read_bytes, write_bytes};
    use std::vec::Vec;

    const MIB: usize = 1024 * 1024;

    #[test]
    fn allocations_are_aligned_and_disjoint() {
        let mut heap = TestHeap::new(MIB);
        let arena = Arena::create(&mut heap, 4096).unwrap();
        let a = arena.allocate(&mut heap, 3).unwrap();
        let b = arena.allocate(&mut heap, 17).unwrap();
        let c = arena.allocate(&mut heap, 1).unwrap();
        assert_eq!(a.as_ptr() as usize % ARENA_ALIGNMENT, 0);
        assert_eq!(b.as_ptr() as usize - a.as_ptr() as usize, 16);
        assert_eq!(c.as_ptr() as usize - b.as_ptr() as usize, 32);
    }

    #[test]
    fn reset_reuses_the_same_memory() {
        let mut heap = TestHeap::new(MIB);
        let arena = Arena::create(&mut heap, 4096).unwrap();
        arena.allocate(&mut heap, 40).unwrap();

        let saved = arena.position();
        let first = arena.allocate(&mut heap, 100).unwrap();
        for _ in 0..10 {
            arena.allocate(&mut heap, 100).unwrap();
        }
        arena.reset(saved);
        assert_eq!(arena.allocate(&mut heap, 100).unwrap(), first);
    }

    #[test]
    fn overflowing_a_chunk_links_a_new_one() {
        let mut heap = TestHeap::new(MIB);
        let arena = Arena::create(&mut heap, 4096).unwrap();
        assert_eq!(arena.chunk_count(), 1);

        let ptrs: Vec<_> = (0..10).map(|_| arena.allocate(&mut heap, 1000).unwrap()).collect();
        assert!(arena.chunk_count() > 1);
        assert_eq!(arena.current_chunk_index(), arena.chunk_count() - 1);
        for (i, ptr) in ptrs.iter().enumerate() {
            write_bytes(*ptr, &[i as u8; 1000]);
        }
        for (i, ptr) in ptrs.iter().enumerate() {
            assert!(read_bytes(*ptr, 1000).iter().all(|&byte| byte == i as u8));
        }
    }

    #[test]
    fn reset_walks_existing_chunks_before_growing() {
        let mut heap = TestHeap::new(MIB);
        let arena = Arena::create(&mut heap, 4096).unwrap();
        for _ in 0..20 {
            arena.allocate(&mut heap, 1000).unwrap();
        }
        let chunks = arena.chunk_count();
        let used = heap.stats().used_blocks();

        arena.reset(arena.first_position());
        assert_eq!(arena.current_chunk_index(), 0);
        for _ in 0..20 {
            arena.allocate(&mut heap, 1000).unwrap();
        }
        assert_eq!(arena.chunk_count(), chunks);
        assert_eq!(heap.stats().used_blocks(), used);
    }

    #[test]
    fn oversized_request_gets_a_dedicated_chunk() {
        let mut heap = TestHeap::new(MIB);
        let arena = Arena::create(&mut heap, 4096).unwrap();
        let big = arena.allocate(&mut heap, 100_000).unwrap();
        write_bytes(big, &[7; 100_000]);
        assert_eq!(arena.chunk_count(), 2);
    }

    #[test]
    fn layout_alignment_is_honoured() {
        let mut heap = TestHeap::new(MIB);
        let arena = Arena::create(&mut heap, 4096).unwrap();
        arena.allocate(&mut heap, 1).unwrap();
        let layout = Layout::from_size_align(64, 256).unwrap();
        let ptr = arena.allocate_layout(&mut heap, layout).unwrap();
        assert_eq!(ptr.as_ptr() as usize % 256, 0);

        let wide = Layout::from_size_align(5000, 4096).unwrap();
        let ptr = arena.allocate_layout(&mut heap, wide).unwrap();
        assert_eq!(ptr.as_ptr() as usize % 4096, 0);
    }

    #[test]
    fn destroy_returns_every_chunk() {
        let mut heap = TestHeap::new(MIB);
        let free_before = {
            let probe = heap.allocate(0).unwrap();
            unsafe { heap.free(probe).unwrap() };
            heap.stats().free_bytes()
        };

        let arena = Arena::create(&mut heap, 4096).unwrap();
        for _ in 0..30 {
            arena.allocate(&mut heap, 1000).unwrap();
        }
        unsafe { arena.destroy(&mut heap) };

        let stats = heap.stats();
        assert_eq!(stats.used_blocks(), 0);
        assert_eq!(stats.free_bytes(), free_before);
        assert_eq!(stats.largest_free_block(), stats.committed);
    }

    #[test]
    #[should_panic(expected = "arena chunk rejected by heap")]
    #[cfg(debug_assertions)]
    fn destroy_on_another_heap_panics_in_debug_builds() {
        let mut owner = TestHeap::new(MIB);
        let mut other = TestHeap::new(MIB);
        other.allocate(10).unwrap();
        let arena = Arena::create(&mut owner, 4096).unwrap();
        unsafe { arena.destroy(&mut other) };
    }
}
