//! Statistics collection
//!
//! Lock-free request counters with cache-line alignment, interval snapshots
//! and per-worker latency histograms.
//!
//! - **Counters**: four monotonically increasing totals shared by every
//!   worker (`getAttempts`, `getFailures`, `setAttempts`, `setFailures`),
//!   updated with relaxed atomics
//! - **Snapshots**: the reporter reads all four at sampling time; the read is
//!   not linearizable with concurrent increments, but every counter is
//!   non-decreasing between snapshots
//! - **Latency**: each worker keeps its own `LatencyHistogram`s and hands them
//!   back at join, so recording never contends
//!
//! # Example
//!
//! ```
//! use kvpulse::stats::Counters;
//!
//! let counters = Counters::new();
//! counters.get_attempts.add(3);
//! counters.get_failures.add(1);
//!
//! let snap = counters.snapshot();
//! assert_eq!(snap.ok_gets(), 2);
//! ```

pub mod histogram;
pub mod live;

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Cache-line aligned atomic counter to prevent false sharing
///
/// Workers on different cores bump these counters on every request. Giving
/// each counter its own 64-byte line keeps one counter's traffic from
/// invalidating its neighbours.
///
/// ```text
/// [value: 8 bytes][padding: 56 bytes] = 64 bytes total
/// ```
#[repr(align(64))]
#[derive(Debug)]
pub struct AlignedCounter {
    value: AtomicU64,
    _padding: [u8; 56],
}

impl AlignedCounter {
    /// Create a new counter with initial value 0
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
            _padding: [0; 56],
        }
    }

    /// Increment the counter by the specified amount
    ///
    /// Uses `Ordering::Relaxed`; no ordering is needed between counters.
    #[inline]
    pub fn add(&self, val: u64) {
        self.value.fetch_add(val, Ordering::Relaxed);
    }

    #[inline]
    pub fn incr(&self) {
        self.add(1);
    }

    /// Get the current value of the counter
    #[inline]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Default for AlignedCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared request counters for one run
#[derive(Debug, Default)]
pub struct Counters {
    pub get_attempts: AlignedCounter,
    pub get_failures: AlignedCounter,
    pub set_attempts: AlignedCounter,
    pub set_failures: AlignedCounter,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read all four counters
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            get_attempts: self.get_attempts.get(),
            get_failures: self.get_failures.get(),
            set_attempts: self.set_attempts.get(),
            set_failures: self.set_failures.get(),
        }
    }
}

/// Counter values at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub get_attempts: u64,
    pub get_failures: u64,
    pub set_attempts: u64,
    pub set_failures: u64,
}

impl CounterSnapshot {
    /// Per-counter difference from an earlier snapshot
    ///
    /// Saturates at zero, so a snapshot taken out of order never yields a
    /// wrapped-around delta.
    pub fn delta(&self, earlier: &CounterSnapshot) -> CounterSnapshot {
        CounterSnapshot {
            get_attempts: self.get_attempts.saturating_sub(earlier.get_attempts),
            get_failures: self.get_failures.saturating_sub(earlier.get_failures),
            set_attempts: self.set_attempts.saturating_sub(earlier.set_attempts),
            set_failures: self.set_failures.saturating_sub(earlier.set_failures),
        }
    }

    /// GETs that returned the expected value
    pub fn ok_gets(&self) -> u64 {
        self.get_attempts.saturating_sub(self.get_failures)
    }

    /// SETs the server accepted
    pub fn ok_sets(&self) -> u64 {
        self.set_attempts.saturating_sub(self.set_failures)
    }

    /// True if no counter is below its value in `earlier`
    pub fn dominates(&self, earlier: &CounterSnapshot) -> bool {
        self.get_attempts >= earlier.get_attempts
            && self.get_failures >= earlier.get_failures
            && self.set_attempts >= earlier.set_attempts
            && self.set_failures >= earlier.set_failures
    }
}

/// One sampling interval as seen by the reporter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalSample {
    /// Time since the barrier was released
    pub elapsed: Duration,
    /// Time since the previous sample (or since release for the first)
    pub interval: Duration,
    /// Cumulative counters
    pub totals: CounterSnapshot,
    /// Change since the previous sample
    pub delta: CounterSnapshot,
}

impl IntervalSample {
    fn rate(&self, count: u64) -> f64 {
        crate::util::time::calculate_rate(count, self.interval.as_secs_f64())
    }

    /// Successful GETs per second in this interval
    pub fn ok_gets_per_sec(&self) -> f64 {
        self.rate(self.delta.ok_gets())
    }

    /// GET attempts per second in this interval
    pub fn gets_per_sec(&self) -> f64 {
        self.rate(self.delta.get_attempts)
    }

    /// SET attempts per second in this interval
    pub fn sets_per_sec(&self) -> f64 {
        self.rate(self.delta.set_attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_aligned_counter_layout() {
        assert_eq!(std::mem::size_of::<AlignedCounter>(), 64);
        assert_eq!(std::mem::align_of::<AlignedCounter>(), 64);
    }

    #[test]
    fn test_aligned_counter_concurrent_adds() {
        let counter = Arc::new(AlignedCounter::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        counter.incr();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counter.get(), 40_000);
    }

    #[test]
    fn test_snapshot_delta() {
        let counters = Counters::new();
        counters.get_attempts.add(10);
        counters.get_failures.add(2);
        let first = counters.snapshot();

        counters.get_attempts.add(5);
        counters.set_attempts.add(3);
        counters.set_failures.add(1);
        let second = counters.snapshot();

        let delta = second.delta(&first);
        assert_eq!(
            delta,
            CounterSnapshot {
                get_attempts: 5,
                get_failures: 0,
                set_attempts: 3,
                set_failures: 1,
            }
        );
        assert!(second.dominates(&first));
        assert!(!first.dominates(&second));
        assert_eq!(second.ok_gets(), 13);
        assert_eq!(second.ok_sets(), 2);
    }

    #[test]
    fn test_delta_against_zero() {
        let snap = CounterSnapshot {
            get_attempts: 7,
            get_failures: 1,
            set_attempts: 1,
            set_failures: 0,
        };
        assert_eq!(snap.delta(&CounterSnapshot::default()), snap);
    }

    #[test]
    fn test_interval_rates() {
        let sample = IntervalSample {
            elapsed: Duration::from_secs(2),
            interval: Duration::from_millis(500),
            totals: CounterSnapshot::default(),
            delta: CounterSnapshot {
                get_attempts: 100,
                get_failures: 20,
                set_attempts: 20,
                set_failures: 0,
            },
        };
        assert_eq!(sample.ok_gets_per_sec(), 160.0);
        assert_eq!(sample.gets_per_sec(), 200.0);
        assert_eq!(sample.sets_per_sec(), 40.0);
    }
}
