//! The atomic shared cell.

use core::fmt;
use core::marker::PhantomData;
use core::sync::atomic::Ordering;

use crate::block::Block;
use crate::drain;
use crate::fast::{release_outer, Snapshot};
use crate::shared::Shared;
use crate::word::{block_of, compose, count_of, PackedWord};

/// A lock-free atomically updatable shared-ownership pointer.
///
/// The cell is one atomic word holding the current block's address and a
/// 16-bit outer counter. Readers pin the block with a single fetch-add on
/// that word; each unit taken this way is a promise of one increment on the
/// block's own counter, settled either by rolling the word back or by
/// migrating the unit before the block leaves the cell. Writers publish a
/// replacement block by compare-and-swap after draining the counter field,
/// which is what makes plain reference counting safe here without hazard
/// pointers or epochs.
///
/// A cell may also be empty ([`AtomicShared::null`]); loading from an empty
/// cell yields null handles.
///
/// # Example
///
/// ```rust
/// use ikiz::{AtomicShared, Shared};
///
/// let cell = AtomicShared::new("first");
///
/// let seen = cell.load();
/// assert!(cell.compare_exchange(seen.as_ptr(), Shared::new("second")).is_ok());
/// assert_eq!(cell.load().as_ref(), Some(&"second"));
/// ```
pub struct AtomicShared<T> {
    word: PackedWord,
    _marker: PhantomData<T>,
}

// SAFETY: the cell shares `&T` between threads and the last release may run
// `T`'s destructor on any of them.
unsafe impl<T: Send + Sync> Send for AtomicShared<T> {}
unsafe impl<T: Send + Sync> Sync for AtomicShared<T> {}

impl<T> AtomicShared<T> {
    /// Creates a cell publishing `value`.
    pub fn new(value: T) -> Self {
        Self { word: PackedWord::new(Block::alloc(value)), _marker: PhantomData }
    }

    /// Creates an empty cell.
    #[inline]
    pub const fn null() -> Self {
        Self { word: PackedWord::null(), _marker: PhantomData }
    }

    /// Takes an independent strong handle on the current value, or a null
    /// handle if the cell is empty.
    ///
    /// The acquiring fetch-add pins the block for the duration of the call;
    /// the block's own counter is incremented while pinned and the
    /// transient unit is given back before returning.
    pub fn load(&self) -> Shared<T> {
        let known = self.word.fetch_add(1, Ordering::Acquire) + 1;
        let block = block_of::<T>(known);
        if block.is_null() {
            // SAFETY: the fetch-add above took the unit we return.
            unsafe { release_outer(&self.word, known, block) };
            return Shared::null();
        }
        // SAFETY: the outer unit keeps the block alive across this
        // increment; afterwards the handle's own unit does.
        unsafe { (*block).refs.fetch_add(1, Ordering::Relaxed) };
        unsafe { release_outer(&self.word, known, block) };
        // SAFETY: the increment above produced the unit this handle owns.
        unsafe { Shared::from_block(block) }
    }

    /// Takes a read-only snapshot of the current value without touching the
    /// block's counter on the happy path.
    #[inline]
    pub fn load_fast(&self) -> Snapshot<'_, T> {
        Snapshot::acquire(&self.word)
    }

    /// Publishes a freshly allocated value, retrying over concurrent
    /// writers until it lands.
    pub fn store(&self, value: T) {
        self.store_shared(Shared::new(value));
    }

    /// Publishes the value behind `new`, retrying over concurrent writers
    /// until it lands. The cell takes over the handle's counter unit.
    pub fn store_shared(&self, mut new: Shared<T>) {
        loop {
            let current = self.load_fast();
            match self.compare_exchange(current.as_ptr(), new) {
                Ok(()) => return,
                Err(handed_back) => new = handed_back,
            }
        }
    }

    /// Publishes `new` iff the cell currently holds the block whose payload
    /// address is `expected` (strong semantics: no spurious failure).
    ///
    /// On success the cell takes over `new`'s counter unit and releases the
    /// replaced block's; on failure `new` is handed back untouched. The
    /// expectation is compared against block identity, so an address
    /// recycled by the allocator cannot satisfy a stale expectation: the
    /// snapshot taken internally keeps the expected block alive across the
    /// swap.
    ///
    /// One quirk is deliberate: when `new`'s own payload address equals
    /// `expected` the call reports success without storing, since the cell
    /// could not be told apart from one that performed the swap. `new` is
    /// dropped in that case.
    pub fn compare_exchange(&self, expected: *const T, new: Shared<T>) -> Result<(), Shared<T>> {
        if new.as_ptr() == expected {
            return Ok(());
        }
        let current = self.load_fast();
        if current.as_ptr() != expected {
            return Err(new);
        }

        let old_block = current.block();
        let new_block = Shared::into_block(new);
        let desired = compose(new_block);
        let mut observed = compose(old_block);
        while block_of::<T>(observed) == old_block {
            let outer = count_of(observed);
            if outer != 0 {
                // Every outstanding unit in the word promises an increment
                // on the old block; settle them all before the block can
                // leave the cell.
                if !old_block.is_null() {
                    unsafe { (*old_block).refs.fetch_add(outer, Ordering::Relaxed) };
                }
                match self.word.compare_exchange_weak(
                    observed,
                    observed - outer,
                    Ordering::Release,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => observed -= outer,
                    Err(reread) => {
                        if !old_block.is_null() {
                            unsafe { (*old_block).refs.fetch_sub(outer, Ordering::Release) };
                        }
                        observed = reread;
                    }
                }
                continue;
            }
            match self.word.compare_exchange_weak(
                observed,
                desired,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    // The cell's unit moves from the old block to the new;
                    // `current` keeps the old block pinned until it drops.
                    // SAFETY: the cell owned one unit of the old block.
                    unsafe { drain::unref(old_block) };
                    return Ok(());
                }
                Err(reread) => observed = reread,
            }
        }

        // Lost to a concurrent writer.
        // SAFETY: the unit taken from `new` above was never consumed.
        Err(unsafe { Shared::from_block(new_block) })
    }
}

impl<T> Drop for AtomicShared<T> {
    fn drop(&mut self) {
        let word = self.word.load_mut();
        let block = block_of::<T>(word);
        if block.is_null() {
            return;
        }
        let outer = count_of(word);
        if outer != 0 {
            // Units left behind by leaked snapshots; settle them so the
            // block's counter reflects them before the cell's unit goes.
            unsafe { (*block).refs.fetch_add(outer, Ordering::Relaxed) };
        }
        // SAFETY: the cell owns one unit of the block's counter.
        unsafe { drain::unref(block) };
    }
}

impl<T> Default for AtomicShared<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> fmt::Debug for AtomicShared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = self.word.load(Ordering::Relaxed);
        f.debug_struct("AtomicShared")
            .field("block", &block_of::<T>(word))
            .field("outer", &count_of(word))
            .finish()
    }
}
