//! Timestamp ordered exchange of bursts between threads.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::timed::TimedBlock;

/// Priority queue of bursts where the earliest time comes out first.
///
/// Shared between the burst producer and slot driven consumers,
/// usually through an `Arc`.
pub struct BurstQueue<T> {
    heap: Mutex<BinaryHeap<Reverse<TimedBlock<T>>>>,
    /// Signalled on every push.
    written: Condvar,
}

impl<T: Ord + Copy> Default for BurstQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord + Copy> BurstQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            written: Condvar::new(),
        }
    }

    // Heap operations never leave it half modified, so a panic in
    // another thread holding the lock does not invalidate it.
    fn lock(&self) -> MutexGuard<'_, BinaryHeap<Reverse<TimedBlock<T>>>> {
        self.heap.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, block: TimedBlock<T>) {
        self.lock().push(Reverse(block));
        self.written.notify_all();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Time of the earliest burst, waiting for one to arrive if empty.
    pub fn next_time(&self) -> T {
        let mut heap = self.lock();
        loop {
            if let Some(Reverse(block)) = heap.peek() {
                return block.time();
            }
            heap = self.written.wait(heap).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like `next_time` but gives up after `timeout`.
    pub fn next_time_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut heap = self.lock();
        loop {
            if let Some(Reverse(block)) = heap.peek() {
                return Some(block.time());
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            heap = self
                .written
                .wait_timeout(heap, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Remove the earliest burst if it is older than `target`.
    pub fn get_stale_burst(&self, target: T) -> Option<TimedBlock<T>> {
        self.pop_if(|time| time < target)
    }

    /// Remove the earliest burst if it belongs exactly to `target`.
    pub fn get_current_burst(&self, target: T) -> Option<TimedBlock<T>> {
        self.pop_if(|time| time == target)
    }

    fn pop_if(&self, accept: impl FnOnce(T) -> bool) -> Option<TimedBlock<T>> {
        let mut heap = self.lock();
        let time = heap.peek()?.0.time();
        if accept(time) {
            heap.pop().map(|Reverse(block)| block)
        } else {
            None
        }
    }
}
