//! Blocking bounded priority queue
//!
//! A min-heap shaped by a user-supplied precedence relation, with a
//! capacity bound enforced by blocking: `push` waits while the queue
//! is full, `pop` waits while it is empty. Items for which neither
//! `takes_precedence_over` direction holds are equals; FIFO behavior
//! among equals comes from tie keys inside the relation itself (the
//! engine uses stream ids and enqueue sequence numbers).

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Condvar, Mutex};

/// Ordering relation for queue items.
pub trait Precedence {
    /// Whether `self` should be popped before `other`.
    fn takes_precedence_over(&self, other: &Self) -> bool;
}

struct HeapItem<T>(T);

impl<T: Precedence> PartialEq for HeapItem<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T: Precedence> Eq for HeapItem<T> {}

impl<T: Precedence> PartialOrd for HeapItem<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Precedence> Ord for HeapItem<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.0.takes_precedence_over(&other.0) {
            Ordering::Greater
        } else if other.0.takes_precedence_over(&self.0) {
            Ordering::Less
        } else {
            Ordering::Equal
        }
    }
}

/// Blocking priority queue with a fixed capacity.
pub struct BlockingPriorityQueue<T: Precedence> {
    heap: Mutex<BinaryHeap<HeapItem<T>>>,
    capacity: usize,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T: Precedence> BlockingPriorityQueue<T> {
    /// Create a queue holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> BlockingPriorityQueue<T> {
        assert!(capacity > 0, "queue capacity must be positive");
        BlockingPriorityQueue {
            heap: Mutex::new(BinaryHeap::with_capacity(capacity)),
            capacity,
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Insert an item, blocking while the queue is full.
    pub fn push(&self, item: T) {
        let mut heap = self.heap.lock().expect("queue lock poisoned");
        while heap.len() >= self.capacity {
            heap = self.not_full.wait(heap).expect("queue lock poisoned");
        }
        heap.push(HeapItem(item));
        self.not_empty.notify_one();
    }

    /// Remove the item with the highest precedence, blocking while the
    /// queue is empty.
    pub fn pop(&self) -> T {
        let mut heap = self.heap.lock().expect("queue lock poisoned");
        loop {
            if let Some(HeapItem(item)) = heap.pop() {
                self.not_full.notify_one();
                return item;
            }
            heap = self.not_empty.wait(heap).expect("queue lock poisoned");
        }
    }

    pub fn len(&self) -> usize {
        self.heap.lock().expect("queue lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
