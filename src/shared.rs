//! Strong handles.

use core::fmt;
use core::marker::PhantomData;
use core::mem;
use core::ptr;
use core::sync::atomic::Ordering;

use crate::block::Block;
use crate::drain;

/// A shared owning handle, comparable to [`Arc`](std::sync::Arc) but
/// publishable through an [`AtomicShared`](crate::AtomicShared) cell.
///
/// A handle is either null or owns exactly one unit of its block's counter.
/// Cloning takes an additional unit; dropping gives one back and destroys
/// the value when the last unit goes.
pub struct Shared<T> {
    block: *mut Block<T>,
    _marker: PhantomData<T>,
}

// SAFETY: a handle hands out `&T` to any thread holding it and may run
// `T`'s destructor on whichever thread drops last.
unsafe impl<T: Send + Sync> Send for Shared<T> {}
unsafe impl<T: Send + Sync> Sync for Shared<T> {}

impl<T> Shared<T> {
    /// Allocates a new block owning `value`.
    pub fn new(value: T) -> Self {
        Self { block: Block::alloc(value), _marker: PhantomData }
    }

    /// The null handle.
    #[inline]
    pub const fn null() -> Self {
        Self { block: ptr::null_mut(), _marker: PhantomData }
    }

    /// Wraps one already-owned unit of `block`'s counter.
    ///
    /// # Safety
    ///
    /// The caller must own one unit of the block's counter (or pass null)
    /// and transfers it to the handle.
    #[inline]
    pub(crate) unsafe fn from_block(block: *mut Block<T>) -> Self {
        Self { block, _marker: PhantomData }
    }

    /// Disassembles the handle, passing its counter unit to the caller.
    #[inline]
    pub(crate) fn into_block(this: Self) -> *mut Block<T> {
        let block = this.block;
        mem::forget(this);
        block
    }

    /// Returns `true` for the null handle.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.block.is_null()
    }

    /// The payload address, or null for the null handle.
    ///
    /// Payloads live inside their block, so two handles return the same
    /// address exactly when they name the same block; this is the identity
    /// [`compare_exchange`](crate::AtomicShared::compare_exchange) matches
    /// against.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        if self.block.is_null() {
            ptr::null()
        } else {
            // SAFETY: a non-null handle keeps its block alive.
            unsafe { ptr::addr_of!((*self.block).value) }
        }
    }

    /// Borrows the payload.
    #[inline]
    pub fn as_ref(&self) -> Option<&T> {
        if self.block.is_null() {
            None
        } else {
            // SAFETY: a non-null handle keeps its block alive.
            Some(unsafe { &(*self.block).value })
        }
    }

    /// Mutable access to the payload, available only while this handle is
    /// the sole owner of its block.
    ///
    /// A block published through a cell always carries the cell's own unit
    /// on top of this handle's, so a count of one proves nobody else can
    /// observe the payload.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        if self.block.is_null() {
            return None;
        }
        if unsafe { (*self.block).refs.load(Ordering::Acquire) } == 1 {
            // SAFETY: the single counter unit is ours; no other handle,
            // snapshot or cell can reach the block.
            Some(unsafe { &mut (*self.block).value })
        } else {
            None
        }
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        if !self.block.is_null() {
            // SAFETY: our own unit keeps the counter at one or more, so the
            // block stays alive across the increment.
            unsafe { (*self.block).refs.fetch_add(1, Ordering::Relaxed) };
        }
        Self { block: self.block, _marker: PhantomData }
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        // SAFETY: a non-null handle owns one unit of the counter.
        unsafe { drain::unref(self.block) };
    }
}

impl<T> Default for Shared<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shared({:p})", self.as_ptr())
    }
}
