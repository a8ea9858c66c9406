//! Ikiz: lock-free atomic shared pointers with differential reference counting.
//!
//! An [`AtomicShared<T>`] is a shared-ownership pointer that any number of
//! threads may load, store and compare-exchange concurrently without locks.
//! The cell is a single machine word packing the current control block's
//! address together with a small transient counter, so a reader can announce
//! its intent to hold the value with one atomic fetch-add ("ikiz" is Turkish
//! for twin: the reference count lives in two places at once).
//!
//! # Key properties
//!
//! - **Single-word hot path**: acquiring a [`Snapshot`] is one fetch-add on
//!   the cell, with no per-reader bookkeeping elsewhere
//! - **Lock-free progress**: every operation is a bounded CAS retry loop;
//!   a failed step means another thread made progress
//! - **No deferred reclamation machinery**: each transient unit in the cell
//!   word is migrated into the block's own counter before the block can
//!   leave the cell, so plain reference counting decides lifetime
//! - **Reentrancy-safe teardown**: releases run through a per-thread queue,
//!   so values that chain to further values (long linked structures) are
//!   destroyed iteratively rather than by destructor recursion
//!
//! # Example
//!
//! ```rust
//! use ikiz::AtomicShared;
//!
//! let cell = AtomicShared::new(1);
//!
//! // An independent owning handle on the current value.
//! let one = cell.load();
//!
//! // Writers replace the value wholesale; existing handles are unaffected.
//! cell.store(2);
//!
//! assert_eq!(one.as_ref(), Some(&1));
//! assert_eq!(cell.load().as_ref(), Some(&2));
//! ```

#![warn(missing_docs)]

#[cfg(not(target_pointer_width = "64"))]
compile_error!("ikiz packs a 48-bit address and a 16-bit counter into one word and requires a 64-bit target");

mod atomic;
mod block;
mod drain;
mod fast;
mod shared;
mod word;

pub use atomic::AtomicShared;
pub use fast::Snapshot;
pub use shared::Shared;
