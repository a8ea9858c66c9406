//! Deferred release of control blocks.
//!
//! Payloads may themselves own strong handles (a stack node chains to its
//! successor this way), so dropping the last handle to a long chain from a
//! destructor would recurse once per link. Every counter release therefore
//! goes through a per-thread queue: the outermost release drains the queue
//! iteratively, and releases triggered from inside a payload destructor
//! only enqueue.

use core::cell::{Cell, RefCell};

use crate::block::{self, Block};

struct PendingRelease {
    block: *mut (),
    release: unsafe fn(*mut ()),
}

struct DrainQueue {
    pending: RefCell<Vec<PendingRelease>>,
    draining: Cell<bool>,
}

std::thread_local! {
    static QUEUE: DrainQueue = const {
        DrainQueue {
            pending: RefCell::new(Vec::new()),
            draining: Cell::new(false),
        }
    };
}

/// Gives up one unit of `block`'s inner counter, destroying the block if it
/// was the last. When called from inside a payload destructor the decrement
/// runs later, from the drain loop further up this thread's stack.
///
/// # Safety
///
/// The caller must own one unit of the block's counter. Null blocks are
/// ignored.
pub(crate) unsafe fn unref<T>(block: *mut Block<T>) {
    unsafe fn release_erased<T>(block: *mut ()) {
        // SAFETY: enqueued below from a `*mut Block<T>` of the same `T`.
        unsafe { block::release(block as *mut Block<T>) };
    }

    if block.is_null() {
        return;
    }
    QUEUE.with(|queue| {
        queue.pending.borrow_mut().push(PendingRelease {
            block: block.cast(),
            release: release_erased::<T>,
        });
        if queue.draining.get() {
            // The drain loop below us on this thread's stack picks it up.
            return;
        }
        queue.draining.set(true);
        loop {
            // The borrow must end before the release runs: destroying a
            // payload can re-enter `unref` on this thread.
            let next = queue.pending.borrow_mut().pop();
            match next {
                Some(entry) => unsafe { (entry.release)(entry.block) },
                None => break,
            }
        }
        queue.draining.set(false);
    });
}
