//! The packed pointer word: a control-block address and a 16-bit transient
//! counter in one atomic word.
//!
//! The block address occupies the upper 48 bits (shifted left by
//! [`COUNT_BITS`]), the counter the low 16. Packing relies on user-space
//! addresses fitting in 48 bits; `Block::alloc` asserts this at allocation
//! time.

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::block::Block;

/// Width of the outer counter field.
pub(crate) const COUNT_BITS: u32 = 16;

/// Mask selecting the outer counter field.
pub(crate) const COUNT_MASK: usize = (1 << COUNT_BITS) - 1;

/// Outer units beyond this level are migrated into the block's counter by
/// the acquirer that observes them. Keeps the 16-bit field far from
/// saturation.
pub(crate) const RECONCILE_THRESHOLD: usize = 1000;

/// Debug ceiling for the outer counter.
pub(crate) const OUTER_LIMIT: usize = 1 << 14;

/// Packs `block` into a word with a zero counter.
#[inline]
pub(crate) fn compose<T>(block: *mut Block<T>) -> usize {
    (block as usize) << COUNT_BITS
}

/// The block named by `word` (null for an empty cell).
#[inline]
pub(crate) fn block_of<T>(word: usize) -> *mut Block<T> {
    (word >> COUNT_BITS) as *mut Block<T>
}

/// The outer counter carried by `word`.
#[inline]
pub(crate) fn count_of(word: usize) -> usize {
    word & COUNT_MASK
}

/// The single shared mutable word of an [`AtomicShared`](crate::AtomicShared).
pub(crate) struct PackedWord {
    raw: AtomicUsize,
}

impl PackedWord {
    pub(crate) fn new<T>(block: *mut Block<T>) -> Self {
        Self { raw: AtomicUsize::new(compose(block)) }
    }

    pub(crate) const fn null() -> Self {
        Self { raw: AtomicUsize::new(0) }
    }

    #[inline]
    pub(crate) fn load(&self, order: Ordering) -> usize {
        self.raw.load(order)
    }

    /// Non-atomic read through exclusive access (cell teardown).
    #[inline]
    pub(crate) fn load_mut(&mut self) -> usize {
        *self.raw.get_mut()
    }

    #[inline]
    pub(crate) fn fetch_add(&self, n: usize, order: Ordering) -> usize {
        self.raw.fetch_add(n, order)
    }

    #[inline]
    pub(crate) fn compare_exchange(
        &self,
        current: usize,
        new: usize,
        success: Ordering,
        failure: Ordering,
    ) -> Result<usize, usize> {
        self.raw.compare_exchange(current, new, success, failure)
    }

    #[inline]
    pub(crate) fn compare_exchange_weak(
        &self,
        current: usize,
        new: usize,
        success: Ordering,
        failure: Ordering,
    ) -> Result<usize, usize> {
        self.raw.compare_exchange_weak(current, new, success, failure)
    }
}
