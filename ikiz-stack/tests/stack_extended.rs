use ikiz_stack::Stack;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_many_items() {
    let s = Stack::new();
    let n = 50_000;
    for i in 0..n {
        s.push(i);
    }
    for i in (0..n).rev() {
        assert_eq!(s.pop(), Some(i));
    }
    assert_eq!(s.pop(), None);
}

/// Dropping a deep stack must tear the node chain down iteratively; a
/// recursive release would overflow the thread stack long before 100k
/// links.
#[test]
#[cfg_attr(miri, ignore)]
fn test_deep_teardown() {
    let s = Stack::new();
    for i in 0..100_000u64 {
        s.push(i);
    }
    drop(s);
}

struct Tally {
    value: u64,
    drops: Arc<AtomicUsize>,
}

impl Clone for Tally {
    fn clone(&self) -> Self {
        Tally { value: self.value, drops: self.drops.clone() }
    }
}

impl Drop for Tally {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::Relaxed);
    }
}

#[test]
fn test_drop_accounting() {
    let drops = Arc::new(AtomicUsize::new(0));
    let s = Stack::new();
    for value in 0..1000 {
        s.push(Tally { value, drops: drops.clone() });
    }
    // Popped copies are dropped by the caller, node payloads by the chain.
    for _ in 0..400 {
        assert!(s.pop().is_some());
    }
    drop(s);
    // 1000 payloads in nodes plus 400 popped clones.
    assert_eq!(drops.load(Ordering::Relaxed), 1400);
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_concurrent_multiset() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 10_000;

    let s = Arc::new(Stack::new());
    let barrier = Arc::new(Barrier::new(THREADS));
    let mut handles = vec![];

    for tid in 0..THREADS {
        let s = s.clone();
        let barrier = barrier.clone();
        handles.push(thread::spawn(move || {
            barrier.wait();
            for j in 0..PER_THREAD {
                s.push((tid * 1_000_000 + j) as u64);
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let mut handles = vec![];
    for _ in 0..THREADS {
        let s = s.clone();
        handles.push(thread::spawn(move || {
            let mut popped = Vec::new();
            while let Some(value) = s.pop() {
                popped.push(value);
            }
            popped
        }));
    }

    let mut popped: Vec<u64> = Vec::with_capacity(THREADS * PER_THREAD);
    for h in handles {
        popped.extend(h.join().unwrap());
    }

    let mut expected: Vec<u64> = (0..THREADS)
        .flat_map(|tid| (0..PER_THREAD).map(move |j| (tid * 1_000_000 + j) as u64))
        .collect();
    expected.sort_unstable();
    popped.sort_unstable();

    // No losses, no duplicates.
    assert_eq!(popped, expected);
    assert!(s.pop().is_none());
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_push_pop_storm() {
    const THREADS: usize = 8;
    const ITERATIONS: usize = 20_000;

    let s = Arc::new(Stack::new());
    let pushed = Arc::new(AtomicUsize::new(0));
    let popped = Arc::new(AtomicUsize::new(0));
    let mut handles = vec![];

    for tid in 0..THREADS {
        let s = s.clone();
        let pushed = pushed.clone();
        let popped = popped.clone();
        handles.push(thread::spawn(move || {
            for i in 0..ITERATIONS {
                if (tid + i) % 2 == 0 {
                    s.push(1u64);
                    pushed.fetch_add(1, Ordering::Relaxed);
                } else if s.pop().is_some() {
                    popped.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let mut remaining = 0;
    while s.pop().is_some() {
        remaining += 1;
    }
    assert_eq!(
        pushed.load(Ordering::Relaxed),
        popped.load(Ordering::Relaxed) + remaining
    );
}
