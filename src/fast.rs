//! Fast handles: read-only access that defers the block-counter update.

use core::fmt;
use core::ptr;
use core::sync::atomic::Ordering;

use crate::block::Block;
use crate::drain;
use crate::word::{block_of, count_of, PackedWord, OUTER_LIMIT, RECONCILE_THRESHOLD};

/// A short-lived read handle produced by
/// [`AtomicShared::load_fast`](crate::AtomicShared::load_fast).
///
/// Acquisition is a single fetch-add on the cell word. The matching update
/// of the block's own counter is deferred until the snapshot drops, and on
/// the happy path is avoided entirely by rolling the word's outer counter
/// back. The borrow of the cell keeps a snapshot from outliving it.
///
/// Snapshots are move-only; there is no way to duplicate the outer unit one
/// represents. To keep the value past the snapshot's lifetime, take a
/// [`Shared`](crate::Shared) via [`AtomicShared::load`](crate::AtomicShared::load)
/// instead.
pub struct Snapshot<'a, T> {
    /// Cell word observed right after the acquiring fetch-add. While `word`
    /// is set, the counter in here is at least one and the pointer field
    /// names `block`.
    known: usize,
    /// Cell the outer unit lives in; `None` once the unit has been migrated
    /// into the block's own counter (or for a snapshot of an empty cell).
    word: Option<&'a PackedWord>,
    block: *mut Block<T>,
}

// SAFETY: same access as `Shared`: `&T` plus a possible final release.
unsafe impl<T: Send + Sync> Send for Snapshot<'_, T> {}
unsafe impl<T: Send + Sync> Sync for Snapshot<'_, T> {}

impl<'a, T> Snapshot<'a, T> {
    /// Takes one outer unit on `word`, pinning the block it names.
    pub(crate) fn acquire(word: &'a PackedWord) -> Self {
        let known = word.fetch_add(1, Ordering::Acquire) + 1;
        debug_assert!(count_of(known) < OUTER_LIMIT);

        let block = block_of::<T>(known);
        if block.is_null() {
            // Empty cell: the unit pins nothing, give it back right away.
            // SAFETY: the fetch-add above took the unit we return.
            unsafe { release_outer(word, known, block) };
            return Self { known: 0, word: None, block: ptr::null_mut() };
        }

        let mut snapshot = Self { known, word: Some(word), block };
        snapshot.reconcile(word);
        snapshot
    }

    /// Outer-to-inner migration, run by the acquirer that observes the
    /// counter past [`RECONCILE_THRESHOLD`].
    fn reconcile(&mut self, word: &'a PackedWord) {
        let block = self.block;
        let mut diff = count_of(self.known);
        while diff > RECONCILE_THRESHOLD {
            // Move every unit currently in the word, ours included, into
            // the block's counter, then try to zero the counter field.
            unsafe { (*block).refs.fetch_add(diff, Ordering::Relaxed) };
            match word.compare_exchange(
                self.known,
                self.known - diff,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    // This snapshot now owns one of the migrated units.
                    self.word = None;
                    return;
                }
                Err(observed) => {
                    unsafe { (*block).refs.fetch_sub(diff, Ordering::Release) };
                    if block_of::<T>(observed) != block || count_of(observed) == 0 {
                        // A writer drained the word first, migrating our
                        // unit along with the rest.
                        self.word = None;
                        return;
                    }
                    // Counter moved but the block is still in place; keep
                    // `known` naming the same block so the release path's
                    // invariant holds.
                    self.known = observed;
                    diff = count_of(observed);
                }
            }
        }
    }

    /// Returns `true` for a snapshot of an empty cell.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.block.is_null()
    }

    /// The payload address, or null for an empty snapshot.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        if self.block.is_null() {
            ptr::null()
        } else {
            // SAFETY: the snapshot pins its block.
            unsafe { ptr::addr_of!((*self.block).value) }
        }
    }

    /// Borrows the payload for the life of the snapshot.
    #[inline]
    pub fn as_ref(&self) -> Option<&T> {
        if self.block.is_null() {
            None
        } else {
            // SAFETY: the snapshot pins its block.
            Some(unsafe { &(*self.block).value })
        }
    }

    #[inline]
    pub(crate) fn block(&self) -> *mut Block<T> {
        self.block
    }
}

impl<T> Drop for Snapshot<'_, T> {
    fn drop(&mut self) {
        match self.word {
            // SAFETY: while `word` is set the snapshot owns one outer unit
            // taken while the word named `block`.
            Some(word) => unsafe { release_outer(word, self.known, self.block) },
            // SAFETY: a detached snapshot owns one unit of the block's own
            // counter (none at all when null, which `unref` ignores).
            None => unsafe { drain::unref(self.block) },
        }
    }
}

impl<T> fmt::Debug for Snapshot<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Snapshot({:p})", self.as_ptr())
    }
}

/// Gives back one outer unit taken from `word` while it named `block`.
///
/// Rolls the counter field back by one if the word still names `block`.
/// If the word has moved on or been drained, the unit has already been
/// migrated and one unit of the block's own counter is released instead.
///
/// # Safety
///
/// The caller must own one unit that was counted into `word`'s counter
/// field while the word's pointer field named `block`.
pub(crate) unsafe fn release_outer<T>(word: &PackedWord, known: usize, block: *mut Block<T>) {
    let mut expected = known;
    loop {
        match word.compare_exchange_weak(
            expected,
            expected - 1,
            Ordering::Release,
            Ordering::Relaxed,
        ) {
            Ok(_) => return,
            Err(observed) => {
                if block_of::<T>(observed) != block || count_of(observed) == 0 {
                    // SAFETY: a writer migrated the unit into the block's
                    // counter before moving the word on; that unit is ours
                    // to release.
                    unsafe { drain::unref(block) };
                    return;
                }
                expected = observed;
            }
        }
    }
}
