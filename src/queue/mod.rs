//! Work queue shared by the trace producer and worker threads
//!
//! `WorkQueue` is a FIFO protected by a single mutex that is only held for
//! the O(1) push or pop itself; no lock is ever held across a cache call.
//!
//! # Capacity
//!
//! A bounded queue refuses to grow past its capacity. The producer either gets
//! the item handed back (`try_push`) or waits for space (`push_wait`), which
//! keeps memory bounded and throttles the producer to the real consumption
//! rate. An unbounded queue grows by doubling (see [`fifo::FifoQueue`]).
//!
//! # Empty queues
//!
//! An empty queue is the normal state between bursts, not an error.
//! `try_pop` returns `None` and `pop_wait` returns [`Popped::Empty`] after
//! its timeout, so the caller can check its stop flag and try again.
//!
//! # Waiting
//!
//! With [`WaitStrategy::Spin`] waiters poll with a short backoff, matching the
//! busy-poll methodology of the benchmark. With [`WaitStrategy::Block`] they
//! park on a condition variable until the predicate may have changed.
//!
//! # Example
//!
//! ```
//! use kvpulse::queue::{WorkQueue, QueueError};
//! use kvpulse::config::workload::WaitStrategy;
//!
//! let queue = WorkQueue::bounded(2, WaitStrategy::Block);
//! queue.try_push("a").unwrap();
//! queue.try_push("b").unwrap();
//! assert!(matches!(queue.try_push("c"), Err(QueueError::Full("c"))));
//! assert_eq!(queue.try_pop(), Some("a"));
//! ```

pub mod fifo;

pub use crate::config::workload::WaitStrategy;
use crossbeam::utils::Backoff;
use fifo::FifoQueue;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Sleep between full-queue checks in spin mode
pub const PUSH_SPIN_SLEEP: Duration = Duration::from_micros(100);

/// Sleep between empty-queue checks once spinning has backed off
const POP_SPIN_SLEEP: Duration = Duration::from_micros(50);

/// Push failure; the rejected item is handed back to the caller
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError<T> {
    #[error("work queue is full")]
    Full(T),
    #[error("work queue is closed")]
    Closed(T),
}

impl<T> QueueError<T> {
    /// Recover the item that could not be queued
    pub fn into_inner(self) -> T {
        match self {
            Self::Full(item) | Self::Closed(item) => item,
        }
    }
}

/// Outcome of a waiting pop
#[derive(Debug, PartialEq, Eq)]
pub enum Popped<T> {
    /// The next item in FIFO order
    Item(T),
    /// Nothing arrived before the timeout
    Empty,
    /// The queue is closed and fully drained
    Closed,
}

struct Inner<T> {
    items: FifoQueue<T>,
    closed: bool,
}

/// Mutex-protected FIFO with optional capacity limit
pub struct WorkQueue<T> {
    inner: Mutex<Inner<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: Option<usize>,
    wait: WaitStrategy,
}

impl<T> WorkQueue<T> {
    /// Create a queue holding at most `capacity` items
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn bounded(capacity: usize, wait: WaitStrategy) -> Self {
        assert!(capacity > 0, "Queue capacity must be greater than 0");
        Self::build(Some(capacity), FifoQueue::with_capacity(capacity), wait)
    }

    /// Create a queue that grows by doubling and never reports `Full`
    pub fn unbounded(wait: WaitStrategy) -> Self {
        Self::build(None, FifoQueue::new(), wait)
    }

    fn build(capacity: Option<usize>, items: FifoQueue<T>, wait: WaitStrategy) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items,
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
            wait,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_full(&self, inner: &Inner<T>) -> bool {
        self.capacity.is_some_and(|cap| inner.items.len() >= cap)
    }

    /// Append an item without waiting
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Full` when the queue is at capacity and
    /// `QueueError::Closed` after [`close`](Self::close); the item is
    /// returned inside the error in both cases and never dropped.
    pub fn try_push(&self, item: T) -> Result<(), QueueError<T>> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(QueueError::Closed(item));
        }
        if self.is_full(&inner) {
            return Err(QueueError::Full(item));
        }

        inner.items.push(item);
        drop(inner);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Append an item, waiting up to `timeout` for space
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Full` with the item if no space freed up within
    /// `timeout`, or `QueueError::Closed` if the queue was closed.
    pub fn push_wait(&self, item: T, timeout: Duration) -> Result<(), QueueError<T>> {
        let deadline = Instant::now() + timeout;

        match self.wait {
            WaitStrategy::Spin => {
                let mut item = item;
                loop {
                    match self.try_push(item) {
                        Err(QueueError::Full(rejected)) if Instant::now() < deadline => {
                            item = rejected;
                            thread::sleep(PUSH_SPIN_SLEEP);
                        }
                        other => return other,
                    }
                }
            }
            WaitStrategy::Block => {
                let mut inner = self.lock();
                loop {
                    if inner.closed {
                        return Err(QueueError::Closed(item));
                    }
                    if !self.is_full(&inner) {
                        inner.items.push(item);
                        drop(inner);
                        self.not_empty.notify_one();
                        return Ok(());
                    }

                    let now = Instant::now();
                    if now >= deadline {
                        return Err(QueueError::Full(item));
                    }
                    inner = self
                        .not_full
                        .wait_timeout(inner, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }
    }

    /// Remove the front item without waiting
    pub fn try_pop(&self) -> Option<T> {
        let mut inner = self.lock();
        let item = inner.items.pop();
        drop(inner);
        if item.is_some() && self.capacity.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Remove the front item, waiting up to `timeout` for one to arrive
    ///
    /// Items still queued when the queue is closed are delivered before
    /// `Popped::Closed` is reported.
    pub fn pop_wait(&self, timeout: Duration) -> Popped<T> {
        let deadline = Instant::now() + timeout;

        match self.wait {
            WaitStrategy::Spin => {
                let backoff = Backoff::new();
                loop {
                    {
                        let mut inner = self.lock();
                        if let Some(item) = inner.items.pop() {
                            drop(inner);
                            if self.capacity.is_some() {
                                self.not_full.notify_one();
                            }
                            return Popped::Item(item);
                        }
                        if inner.closed {
                            return Popped::Closed;
                        }
                    }

                    if Instant::now() >= deadline {
                        return Popped::Empty;
                    }
                    if backoff.is_completed() {
                        thread::sleep(POP_SPIN_SLEEP);
                    } else {
                        backoff.snooze();
                    }
                }
            }
            WaitStrategy::Block => {
                let mut inner = self.lock();
                loop {
                    if let Some(item) = inner.items.pop() {
                        drop(inner);
                        if self.capacity.is_some() {
                            self.not_full.notify_one();
                        }
                        return Popped::Item(item);
                    }
                    if inner.closed {
                        return Popped::Closed;
                    }

                    let now = Instant::now();
                    if now >= deadline {
                        return Popped::Empty;
                    }
                    inner = self
                        .not_empty
                        .wait_timeout(inner, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }
    }

    /// Refuse further pushes and wake every waiter
    ///
    /// Consumers keep draining whatever is already queued.
    pub fn close(&self) {
        self.lock().closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Current number of queued items
    pub fn size(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Capacity limit, or `None` for an unbounded queue
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn wait_strategy(&self) -> WaitStrategy {
        self.wait
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const STRATEGIES: [WaitStrategy; 2] = [WaitStrategy::Spin, WaitStrategy::Block];

    #[test]
    fn test_fifo_law() {
        for wait in STRATEGIES {
            let queue = WorkQueue::bounded(16, wait);
            for i in 0..16 {
                queue.try_push(i).unwrap();
            }
            let popped: Vec<i32> = (0..16).filter_map(|_| queue.try_pop()).collect();
            assert_eq!(popped, (0..16).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_full_queue_hands_item_back() {
        let queue = WorkQueue::bounded(1, WaitStrategy::Block);
        queue.try_push(String::from("kept")).unwrap();

        let err = queue.try_push(String::from("rejected")).unwrap_err();
        assert_eq!(err, QueueError::Full(String::from("rejected")));
        assert_eq!(err.into_inner(), "rejected");

        assert_eq!(queue.size(), 1);
        assert_eq!(queue.try_pop().as_deref(), Some("kept"));
    }

    #[test]
    fn test_capacity_four_scenario() {
        for wait in STRATEGIES {
            let queue = WorkQueue::bounded(4, wait);
            for item in ["A", "B", "C", "D"] {
                queue.try_push(item).unwrap();
            }

            assert_eq!(queue.try_push("E"), Err(QueueError::Full("E")));
            assert_eq!(
                queue.push_wait("E", Duration::from_millis(5)),
                Err(QueueError::Full("E"))
            );

            assert_eq!(queue.try_pop(), Some("A"));
            queue.try_push("E").unwrap();

            let rest: Vec<&str> = (0..4).filter_map(|_| queue.try_pop()).collect();
            assert_eq!(rest, vec!["B", "C", "D", "E"]);
            assert!(queue.is_empty());
        }
    }

    #[test]
    fn test_size_tracks_pushes_and_pops() {
        let queue = WorkQueue::bounded(100, WaitStrategy::Spin);
        for k in 0..50 {
            queue.try_push(k).unwrap();
        }
        for j in 1..=20 {
            queue.try_pop();
            assert_eq!(queue.size(), 50 - j);
        }
    }

    #[test]
    fn test_unbounded_never_full() {
        let queue = WorkQueue::unbounded(WaitStrategy::Block);
        for i in 0..10_000 {
            queue.try_push(i).unwrap();
        }
        assert_eq!(queue.capacity(), None);
        assert_eq!(queue.size(), 10_000);
        assert_eq!(queue.try_pop(), Some(0));
    }

    #[test]
    fn test_pop_wait_empty_times_out() {
        for wait in STRATEGIES {
            let queue: WorkQueue<u32> = WorkQueue::bounded(4, wait);
            assert_eq!(queue.pop_wait(Duration::from_millis(5)), Popped::Empty);
        }
    }

    #[test]
    fn test_close_drains_then_reports_closed() {
        for wait in STRATEGIES {
            let queue = WorkQueue::bounded(4, wait);
            queue.try_push(1).unwrap();
            queue.close();

            assert_eq!(queue.try_push(2), Err(QueueError::Closed(2)));
            assert_eq!(queue.pop_wait(Duration::from_millis(5)), Popped::Item(1));
            assert_eq!(queue.pop_wait(Duration::from_millis(5)), Popped::Closed);
        }
    }

    #[test]
    fn test_blocked_push_resumes_after_pop() {
        for wait in STRATEGIES {
            let queue = Arc::new(WorkQueue::bounded(1, wait));
            queue.try_push(0).unwrap();

            let producer = {
                let queue = Arc::clone(&queue);
                thread::spawn(move || queue.push_wait(1, Duration::from_secs(5)))
            };

            thread::sleep(Duration::from_millis(20));
            assert_eq!(queue.try_pop(), Some(0));

            assert!(producer.join().unwrap().is_ok());
            assert_eq!(queue.try_pop(), Some(1));
        }
    }

    #[test]
    fn test_single_producer_order_across_threads() {
        for wait in STRATEGIES {
            let queue = Arc::new(WorkQueue::bounded(8, wait));
            let total = 5_000u32;

            let producer = {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..total {
                        queue.push_wait(i, Duration::from_secs(10)).unwrap();
                    }
                    queue.close();
                })
            };

            let mut seen = Vec::with_capacity(total as usize);
            loop {
                match queue.pop_wait(Duration::from_millis(10)) {
                    Popped::Item(i) => seen.push(i),
                    Popped::Empty => continue,
                    Popped::Closed => break,
                }
            }
            producer.join().unwrap();

            assert_eq!(seen, (0..total).collect::<Vec<_>>());
        }
    }
}
