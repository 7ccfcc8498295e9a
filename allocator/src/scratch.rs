use core::alloc::Layout;
use core::ptr::NonNull;

use system::hprintln;
use system::memory::HeapProvider;

use crate::arena::{Arena, ArenaPosition};
use crate::buddy::{AllocError, Heap};
use crate::config::SCRATCH_ARENA_COUNT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScratchError {
    /// Every pool arena is in the conflict list.
    NoFreeArena,
    Alloc(AllocError),
}

impl From<AllocError> for ScratchError {
    fn from(error: AllocError) -> Self {
        ScratchError::Alloc(error)
    }
}

/// A borrowed pool arena plus the position to roll it back to.
///
/// A plain nested [`ScratchPool::begin`] hands out the same arena as the
/// enclosing scope, so ending the inner scope also discards whatever the outer
/// scope allocated after the inner one began. Pass the outer arena to
/// [`ScratchPool::begin_avoiding_conflict`] to get a different one.
#[derive(Debug)]
pub struct Scratch {
    arena: Arena,
    position: ArenaPosition,
}

impl Scratch {
    pub fn arena(&self) -> Arena {
        self.arena
    }

    pub fn allocate<P: HeapProvider>(
        &self,
        heap: &mut Heap<P>,
        size: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        self.arena.allocate(heap, size)
    }

    pub fn allocate_layout<P: HeapProvider>(
        &self,
        heap: &mut Heap<P>,
        layout: Layout,
    ) -> Result<NonNull<u8>, AllocError> {
        self.arena.allocate_layout(heap, layout)
    }

    pub fn end(self) {
        self.arena.reset(self.position);
    }
}

/// Small set of arenas reused for short-lived allocations, created on first use.
pub struct ScratchPool {
    arenas: [Option<Arena>; SCRATCH_ARENA_COUNT],
    chunk_size: usize,
}

impl ScratchPool {
    pub const fn new(chunk_size: usize) -> Self {
        ScratchPool {
            arenas: [None; SCRATCH_ARENA_COUNT],
            chunk_size,
        }
    }

    /// Starts a scope on the first pool arena.
    pub fn begin<P: HeapProvider>(&mut self, heap: &mut Heap<P>) -> Result<Scratch, ScratchError> {
        self.begin_avoiding(heap, &[])
    }

    pub fn begin_avoiding_conflict<P: HeapProvider>(
        &mut self,
        heap: &mut Heap<P>,
        conflict: Arena,
    ) -> Result<Scratch, ScratchError> {
        self.begin_avoiding(heap, &[conflict])
    }

    /// Starts a scope on the first pool arena not listed in `conflicts`.
    pub fn begin_avoiding<P: HeapProvider>(
        &mut self,
        heap: &mut Heap<P>,
        conflicts: &[Arena],
    ) -> Result<Scratch, ScratchError> {
        for slot in self.arenas.iter_mut() {
            let arena = match *slot {
                Some(arena) if conflicts.contains(&arena) => continue,
                Some(arena) => arena,
                None => *slot.insert(Arena::create(heap, self.chunk_size)?),
            };
            return Ok(Scratch {
                arena,
                position: arena.position(),
            });
        }
        hprintln!("[SCRATCH] all {} arenas conflict", SCRATCH_ARENA_COUNT);
        Err(ScratchError::NoFreeArena)
    }

    /// Number of pool arenas created so far.
    pub fn created(&self) -> usize {
        self.arenas.iter().flatten().count()
    }
}
