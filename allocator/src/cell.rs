use core::cell::UnsafeCell;
use core::sync::atomic::{Ordering, compiler_fence};

/// Holder for the process-wide heap state.
///
/// The allocator API is single-threaded, so the cell hands out references
/// without locking. Callers must not keep a reference from `borrow_mut`
/// alive across another call into the global functions.
pub(crate) struct GlobalCell<T> {
    data: UnsafeCell<T>,
}

// Safety: every access happens from the one thread that uses the allocator.
unsafe impl<T> Sync for GlobalCell<T> {}
// Safety: the value never actually crosses threads; see above.
unsafe impl<T> Send for GlobalCell<T> {}

impl<T> GlobalCell<T> {
    pub(crate) const fn new(data: T) -> Self {
        GlobalCell {
            data: UnsafeCell::new(data),
        }
    }

    pub(crate) fn borrow(&self) -> &T {
        compiler_fence(Ordering::SeqCst);
        // Safety: no `borrow_mut` reference outlives the call that took it.
        unsafe { &*self.data.get() }
    }

    #[allow(clippy::mut_from_ref)]
    pub(crate) fn borrow_mut(&self) -> &mut T {
        compiler_fence(Ordering::SeqCst);
        // Safety: see the type documentation.
        unsafe { &mut *self.data.get() }
    }
}
