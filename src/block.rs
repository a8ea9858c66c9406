//! Control blocks.

use core::sync::atomic::{fence, AtomicUsize, Ordering};

use crate::word::COUNT_BITS;

/// Heap record behind every strong handle and every published cell value.
///
/// `refs` counts strong handles, plus one unit for each cell currently
/// publishing the block, plus any outer units migrated in by reconciliation.
/// Payload and block are destroyed together when it reaches zero.
#[repr(C)]
pub(crate) struct Block<T> {
    pub(crate) refs: AtomicUsize,
    pub(crate) value: T,
}

impl<T> Block<T> {
    /// Allocates a block owning `value` with a single reference.
    pub(crate) fn alloc(value: T) -> *mut Block<T> {
        let block = Box::into_raw(Box::new(Block { refs: AtomicUsize::new(1), value }));
        // The packed word stores this address shifted into the upper 48
        // bits; an allocation above that range cannot be published.
        assert!(
            (block as usize) >> (usize::BITS - COUNT_BITS) == 0,
            "allocation outside the 48-bit address range"
        );
        block
    }
}

/// Drops one unit of `block`'s counter, destroying payload and block on the
/// last one.
///
/// # Safety
///
/// `block` must be non-null and the caller must own one unit of `refs`.
/// Only [`drain`](crate::drain) may call this; everyone else goes through
/// `drain::unref` so that nested destructor releases stay iterative.
pub(crate) unsafe fn release<T>(block: *mut Block<T>) {
    if unsafe { (*block).refs.fetch_sub(1, Ordering::Release) } == 1 {
        fence(Ordering::Acquire);
        drop(unsafe { Box::from_raw(block) });
    }
}
