//! Start barrier
//!
//! Workers announce they have finished warmup with [`StartBarrier::arrive`],
//! then wait in [`StartBarrier::wait_released`]. The harness waits for every
//! arrival and calls [`StartBarrier::release`], which refuses to open the
//! barrier until the ready count equals the worker count. The release instant
//! is recorded before the released flag is published, so any worker that sees
//! the barrier open also sees a release time no later than its own start.
//!
//! Both sides take an abort predicate (normally "stop requested" or "a worker
//! failed") so a failed run never leaves a thread parked on the barrier.

use crate::config::workload::WaitStrategy;
use crossbeam::utils::Backoff;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, OnceLock, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// Longest a blocked waiter sleeps before rechecking its abort predicate
const BLOCK_POLL: Duration = Duration::from_millis(10);

/// One-shot start gate for a fixed number of workers
#[derive(Debug)]
pub struct StartBarrier {
    workers: usize,
    ready: AtomicUsize,
    released: AtomicBool,
    released_at: OnceLock<Instant>,
    lock: Mutex<()>,
    cond: Condvar,
    wait: WaitStrategy,
}

impl StartBarrier {
    pub fn new(workers: usize, wait: WaitStrategy) -> Self {
        Self {
            workers,
            ready: AtomicUsize::new(0),
            released: AtomicBool::new(false),
            released_at: OnceLock::new(),
            lock: Mutex::new(()),
            cond: Condvar::new(),
            wait,
        }
    }

    /// Worker side: warmup finished
    pub fn arrive(&self) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.ready.fetch_add(1, Ordering::AcqRel);
        self.cond.notify_all();
    }

    pub fn ready_count(&self) -> usize {
        self.ready.load(Ordering::Acquire)
    }

    pub fn worker_count(&self) -> usize {
        self.workers
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// When the barrier opened, if it has
    pub fn released_at(&self) -> Option<Instant> {
        self.released_at.get().copied()
    }

    /// Harness side: wait until every worker has arrived
    ///
    /// Returns false if `abort` turned true or `timeout` passed first; the
    /// barrier stays closed in that case.
    pub fn wait_all_ready(&self, abort: impl Fn() -> bool, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.wait_until(|| self.ready_count() >= self.workers, || abort() || Instant::now() >= deadline)
    }

    /// Harness side: open the barrier
    ///
    /// Returns the release instant, or None if not every worker has arrived.
    /// Opening an already open barrier returns the original instant.
    pub fn release(&self) -> Option<Instant> {
        if self.ready_count() < self.workers {
            return None;
        }

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let at = *self.released_at.get_or_init(Instant::now);
        self.released.store(true, Ordering::Release);
        self.cond.notify_all();
        Some(at)
    }

    /// Worker side: wait for the harness to open the barrier
    ///
    /// Returns true once released, false if `abort` turned true first.
    pub fn wait_released(&self, abort: impl Fn() -> bool) -> bool {
        self.wait_until(|| self.is_released(), abort)
    }

    fn wait_until(&self, done: impl Fn() -> bool, abort: impl Fn() -> bool) -> bool {
        match self.wait {
            WaitStrategy::Spin => {
                let backoff = Backoff::new();
                loop {
                    if done() {
                        return true;
                    }
                    if abort() {
                        return false;
                    }
                    if backoff.is_completed() {
                        thread::yield_now();
                    } else {
                        backoff.snooze();
                    }
                }
            }
            WaitStrategy::Block => {
                let mut guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
                loop {
                    if done() {
                        return true;
                    }
                    if abort() {
                        return false;
                    }
                    guard = self
                        .cond
                        .wait_timeout(guard, BLOCK_POLL)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }
    }
}
