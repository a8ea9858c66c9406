//! Lock-free LIFO stack built on ikiz atomic shared pointers.
//!
//! The top of the stack is a single [`AtomicShared`] cell over the head
//! node; each node chains to its successor through a strong handle.
//! Publication compares block identity rather than node addresses, and the
//! snapshot taken before each compare-exchange keeps the observed node
//! alive, so a node address recycled by the allocator can never satisfy a
//! stale expectation.
//!
//! ```rust
//! use ikiz_stack::Stack;
//!
//! let stack = Stack::new();
//! stack.push(1);
//! stack.push(2);
//! assert_eq!(stack.pop(), Some(2));
//! assert_eq!(stack.pop(), Some(1));
//! assert_eq!(stack.pop(), None);
//! ```

#![warn(missing_docs)]

use crossbeam_utils::{Backoff, CachePadded};
use ikiz::{AtomicShared, Shared};

struct Node<T> {
    next: Shared<Node<T>>,
    value: T,
}

/// An unbounded lock-free LIFO stack.
pub struct Stack<T> {
    top: CachePadded<AtomicShared<Node<T>>>,
}

impl<T> Default for Stack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Stack<T> {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Stack { top: CachePadded::new(AtomicShared::null()) }
    }

    /// Pushes a value onto the stack.
    pub fn push(&self, value: T) {
        let backoff = Backoff::new();
        let mut node = Shared::new(Node { next: self.top.load(), value });

        loop {
            let expected = node.as_ref().unwrap().next.as_ptr();
            match self.top.compare_exchange(expected, node) {
                Ok(()) => return,
                Err(handed_back) => {
                    node = handed_back;
                    let current = self.top.load();
                    // The node is still unpublished, so the unique-access
                    // check cannot fail.
                    node.get_mut().unwrap().next = current;
                    backoff.spin();
                }
            }
        }
    }
}

impl<T: Clone> Stack<T> {
    /// Pops the most recently pushed value, or `None` when the stack is
    /// empty.
    pub fn pop(&self) -> Option<T> {
        let backoff = Backoff::new();
        loop {
            let top = self.top.load_fast();
            let node = top.as_ref()?;
            let next = node.next.clone();
            match self.top.compare_exchange(top.as_ptr(), next) {
                Ok(()) => return Some(node.value.clone()),
                Err(_stale) => backoff.spin(),
            }
        }
    }
}
