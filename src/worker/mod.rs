//! Worker thread implementation
//!
//! A `Worker` is the execution unit that issues requests against the cache.
//! Each worker runs on its own thread with its own client connection, its own
//! PRNG and its own latency histograms; the only state it shares is the
//! [`HarnessState`] (start barrier, stop flag, done count and request
//! counters) and the read-only [`ValuePool`].
//!
//! # Architecture
//!
//! The worker owns the request mechanics, the benchmark owns the policy:
//! - **Benchmark**: decides what to do during warmup and which operations to
//!   issue while running (self-generated keys or operations pulled from the
//!   replay queue)
//! - **Worker**: executes GET/SET against the client, performs repair SETs,
//!   updates the shared counters and records latency
//!
//! # Request semantics
//!
//! - GET hit: counted as an attempt only
//! - GET miss: counted as a GET failure, followed by one repair SET of the
//!   expected length
//! - GET hit with an unexpected length: same as a miss when
//!   `repair_on_length_mismatch` is on, a plain hit otherwise
//! - SET rejected by the server: counted as a SET failure, run continues
//! - Any transport or protocol error, or a GET the server refuses: fatal
//!
//! # Example
//!
//! ```no_run
//! use kvpulse::bench::fill_then_read::FillThenRead;
//! use kvpulse::client::mock::MockClient;
//! use kvpulse::config::workload::{KeyOrder, WaitStrategy};
//! use kvpulse::harness::HarnessState;
//! use kvpulse::util::buffer::ValuePool;
//! use kvpulse::worker::{Worker, WorkerSettings};
//!
//! let state = HarnessState::new(1, WaitStrategy::Spin);
//! let pool = ValuePool::new();
//! let bench = FillThenRead::new(1000, KeyOrder::Sequential);
//!
//! let worker = Worker::new(0, Box::new(MockClient::new()), &pool, &state, WorkerSettings::default());
//! // Some other thread releases the barrier and later raises the stop flag
//! let report = worker.run(&bench)?;
//! println!("worker {} issued {} requests", report.id, report.ops);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod affinity;

use crate::bench::Benchmark;
use crate::client::CacheClient;
use crate::config::Config;
use crate::harness::HarnessState;
use crate::stats::histogram::LatencyHistogram;
use crate::util::buffer::ValuePool;
use crate::util::prng::Prng;
use crate::workload::{OpKind, Operation};
use crate::Result;
use anyhow::Context;
use std::fmt;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Time-to-live sent with every SET (0 = never expires)
const SET_TTL: u32 = 0;

/// Lifecycle position of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Created,
    WarmingUp,
    ReadyWaiting,
    Running,
    Done,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Created => write!(f, "created"),
            WorkerState::WarmingUp => write!(f, "warming-up"),
            WorkerState::ReadyWaiting => write!(f, "ready-waiting"),
            WorkerState::Running => write!(f, "running"),
            WorkerState::Done => write!(f, "done"),
        }
    }
}

/// Per-worker request settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Configured value length; used by self-driving benchmarks
    pub value_length: usize,
    /// Treat a GET hit of the wrong length as a miss
    pub repair_on_length_mismatch: bool,
}

impl WorkerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            value_length: config.workload.value_length,
            repair_on_length_mismatch: config.workload.repair_on_length_mismatch,
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            value_length: 1024,
            repair_on_length_mismatch: true,
        }
    }
}

/// What a worker hands back at join
#[derive(Debug)]
pub struct WorkerReport {
    pub id: usize,
    /// Requests issued, repair SETs included
    pub ops: u64,
    pub get_latency: LatencyHistogram,
    pub set_latency: LatencyHistogram,
    /// When the worker observed the barrier open; None if it never started
    pub run_started: Option<Instant>,
    /// Time spent running
    pub run_time: Duration,
}

/// Counts the worker done when it leaves `run`, unwinding included.
/// A panic in a benchmark hook or client also marks the harness failed.
struct ExitGuard<'a> {
    shared: &'a HarnessState,
}

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.shared.mark_failed();
        }
        self.shared.mark_done();
    }
}

/// Worker thread that issues cache requests
///
/// # Lifecycle
///
/// 1. **Created**: `Worker::new()` on the harness thread
/// 2. **WarmingUp**: `run()` calls the benchmark's warmup hook
/// 3. **ReadyWaiting**: arrives at the start barrier and waits for release
/// 4. **Running**: calls the benchmark's run hook until it returns
/// 5. **Done**: increments the shared done count and returns a report
///
/// The done count is incremented on every exit path, a panic included. A
/// worker whose warmup or run fails or panics also marks the harness as
/// failed.
///
/// # Thread Safety
///
/// A worker is moved onto its thread and never shared. Its client and PRNG
/// are private; everything it shares is behind atomics in `HarnessState`.
pub struct Worker<'a> {
    id: usize,
    state: WorkerState,
    client: Box<dyn CacheClient>,
    prng: Prng,
    pool: &'a ValuePool,
    shared: &'a HarnessState,
    settings: WorkerSettings,
    get_latency: LatencyHistogram,
    set_latency: LatencyHistogram,
    ops: u64,
    run_started: Option<Instant>,
}

impl<'a> Worker<'a> {
    pub fn new(
        id: usize,
        client: Box<dyn CacheClient>,
        pool: &'a ValuePool,
        shared: &'a HarnessState,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            id,
            state: WorkerState::Created,
            client,
            prng: Prng::new(),
            pool,
            shared,
            settings,
            get_latency: LatencyHistogram::new(),
            set_latency: LatencyHistogram::new(),
            ops: 0,
            run_started: None,
        }
    }

    /// Run the worker through its whole lifecycle
    ///
    /// # Errors
    ///
    /// Returns the first fatal error from warmup or the run, with the worker
    /// ID attached.
    pub fn run(mut self, bench: &dyn Benchmark) -> Result<WorkerReport> {
        let exit = ExitGuard {
            shared: self.shared,
        };
        let result = self.run_phases(bench);

        if result.is_err() {
            self.shared.mark_failed();
        }
        self.state = WorkerState::Done;
        drop(exit);

        result.with_context(|| format!("worker {} failed", self.id))?;

        let run_time = self.run_started.map_or(Duration::ZERO, |t| t.elapsed());
        debug!(worker = self.id, ops = self.ops, ?run_time, "worker done");

        Ok(WorkerReport {
            id: self.id,
            ops: self.ops,
            get_latency: self.get_latency,
            set_latency: self.set_latency,
            run_started: self.run_started,
            run_time,
        })
    }

    fn run_phases(&mut self, bench: &dyn Benchmark) -> Result<()> {
        self.state = WorkerState::WarmingUp;
        bench.warmup(self).context("warmup failed")?;

        self.state = WorkerState::ReadyWaiting;
        let shared = self.shared;
        shared.barrier.arrive();
        if !shared
            .barrier
            .wait_released(|| shared.stop_requested() || shared.has_failed())
        {
            debug!(worker = self.id, "stopped before the barrier opened");
            return Ok(());
        }

        self.state = WorkerState::Running;
        self.run_started = Some(Instant::now());
        bench.run(self)
    }

    /// Issue a GET and repair a miss
    ///
    /// `expected_length` is the length a hit should have and the length of
    /// the repair SET.
    ///
    /// # Errors
    ///
    /// Returns an error for transport and protocol failures, or if the server
    /// refuses the GET.
    pub fn issue_get(&mut self, key: &str, expected_length: usize) -> Result<()> {
        let shared = self.shared;
        shared.counters.get_attempts.incr();
        self.ops += 1;

        let started = Instant::now();
        let result = self.client.get(key.as_bytes());
        self.get_latency.record(started.elapsed());

        match result {
            Ok(response) => {
                if response.value.len() != expected_length && self.settings.repair_on_length_mismatch {
                    trace!(
                        worker = self.id,
                        key,
                        got = response.value.len(),
                        expected = expected_length,
                        "stale value"
                    );
                    shared.counters.get_failures.incr();
                    self.issue_set(key, expected_length)?;
                }
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                shared.counters.get_failures.incr();
                self.issue_set(key, expected_length)
            }
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("GET {} via {} failed", key, self.client.name()))),
        }
    }

    /// Issue a SET of a synthesized value of `value_length` bytes
    ///
    /// # Errors
    ///
    /// Returns an error for transport and protocol failures. A rejection by
    /// the server only counts as a SET failure.
    pub fn issue_set(&mut self, key: &str, value_length: usize) -> Result<()> {
        let shared = self.shared;
        let pool = self.pool;
        let value = pool.value(&mut self.prng, value_length);

        shared.counters.set_attempts.incr();
        self.ops += 1;

        let started = Instant::now();
        let result = self.client.set(key.as_bytes(), value, SET_TTL);
        self.set_latency.record(started.elapsed());

        match result {
            Ok(()) => Ok(()),
            Err(e) if !e.is_fatal() => {
                trace!(worker = self.id, key, "SET failed: {}", e);
                shared.counters.set_failures.incr();
                Ok(())
            }
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("SET {} via {} failed", key, self.client.name()))),
        }
    }

    /// Execute one replayed operation
    pub fn execute(&mut self, op: &Operation) -> Result<()> {
        match op.kind {
            OpKind::Get => self.issue_get(&op.key, op.value_length),
            OpKind::Set => self.issue_set(&op.key, op.value_length),
        }
    }

    /// True once the harness has raised the stop signal
    #[inline]
    pub fn should_stop(&self) -> bool {
        self.shared.stop_requested()
    }

    /// Reset the PRNG to the stream derived from `seed`
    pub fn reseed(&mut self, seed: u64) {
        self.prng.reseed(seed);
    }

    pub fn prng(&mut self) -> &mut Prng {
        &mut self.prng
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    pub fn shared(&self) -> &'a HarnessState {
        self.shared
    }

    /// Requests issued so far
    pub fn ops(&self) -> u64 {
        self.ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::Benchmark;
    use crate::client::mock::{Fault, MockCache};
    use crate::config::workload::WaitStrategy;
    use crate::stats::live::{DefaultFormat, ReportFormat};
    use crate::stats::CounterSnapshot;
    use std::sync::Mutex;

    fn settings() -> WorkerSettings {
        WorkerSettings {
            value_length: 16,
            repair_on_length_mismatch: true,
        }
    }

    fn totals(state: &HarnessState) -> CounterSnapshot {
        state.counters.snapshot()
    }

    #[test]
    fn test_get_miss_repairs_once() {
        let cache = MockCache::new();
        let state = HarnessState::new(1, WaitStrategy::Spin);
        let pool = ValuePool::with_size(1000, 1);
        let mut worker = Worker::new(0, Box::new(cache.client()), &pool, &state, settings());

        worker.issue_get("user1", 16).unwrap();

        let t = totals(&state);
        assert_eq!((t.get_attempts, t.get_failures), (1, 1));
        assert_eq!((t.set_attempts, t.set_failures), (1, 0));
        assert_eq!(cache.value(b"user1").unwrap().len(), 16);
        assert_eq!(worker.ops(), 2);

        // Now a hit
        worker.issue_get("user1", 16).unwrap();
        let t = totals(&state);
        assert_eq!((t.get_attempts, t.get_failures, t.set_attempts), (2, 1, 1));
    }

    #[test]
    fn test_length_mismatch_repairs_when_enabled() {
        let cache = MockCache::new();
        cache.insert(b"user2", b"short");
        let state = HarnessState::new(1, WaitStrategy::Spin);
        let pool = ValuePool::with_size(1000, 1);
        let mut worker = Worker::new(0, Box::new(cache.client()), &pool, &state, settings());

        worker.issue_get("user2", 16).unwrap();

        let t = totals(&state);
        assert_eq!((t.get_attempts, t.get_failures, t.set_attempts), (1, 1, 1));
        assert_eq!(cache.value(b"user2").unwrap().len(), 16);
    }

    #[test]
    fn test_length_mismatch_ignored_when_disabled() {
        let cache = MockCache::new();
        cache.insert(b"user2", b"short");
        let state = HarnessState::new(1, WaitStrategy::Spin);
        let pool = ValuePool::with_size(1000, 1);
        let settings = WorkerSettings {
            repair_on_length_mismatch: false,
            ..settings()
        };
        let mut worker = Worker::new(0, Box::new(cache.client()), &pool, &state, settings);

        worker.issue_get("user2", 16).unwrap();

        let t = totals(&state);
        assert_eq!((t.get_attempts, t.get_failures, t.set_attempts), (1, 0, 0));
        assert_eq!(cache.value(b"user2").unwrap(), b"short");
    }

    #[test]
    fn test_rejected_set_counts_failure() {
        let cache = MockCache::new();
        cache.set_set_fault(Some(Fault::Reject));
        let state = HarnessState::new(1, WaitStrategy::Spin);
        let pool = ValuePool::with_size(1000, 1);
        let mut worker = Worker::new(0, Box::new(cache.client()), &pool, &state, settings());

        worker.issue_set("user3", 16).unwrap();
        worker.issue_get("user3", 16).unwrap();

        let t = totals(&state);
        assert_eq!((t.set_attempts, t.set_failures), (2, 2));
        assert_eq!((t.get_attempts, t.get_failures), (1, 1));
    }

    #[test]
    fn test_transport_errors_are_fatal() {
        for fault in [Fault::Io, Fault::Protocol] {
            let cache = MockCache::new();
            cache.set_get_fault(Some(fault));
            cache.set_set_fault(Some(fault));
            let state = HarnessState::new(1, WaitStrategy::Spin);
            let pool = ValuePool::with_size(1000, 1);
            let mut worker = Worker::new(0, Box::new(cache.client()), &pool, &state, settings());

            assert!(worker.issue_get("k", 16).is_err());
            assert!(worker.issue_set("k", 16).is_err());
            assert_eq!(totals(&state).set_failures, 0);
        }
    }

    #[test]
    fn test_refused_get_is_fatal() {
        let cache = MockCache::new();
        cache.set_get_fault(Some(Fault::Reject));
        let state = HarnessState::new(1, WaitStrategy::Spin);
        let pool = ValuePool::with_size(1000, 1);
        let mut worker = Worker::new(0, Box::new(cache.client()), &pool, &state, settings());

        assert!(worker.issue_get("k", 16).is_err());
    }

    #[test]
    fn test_execute_dispatches_by_kind() {
        let cache = MockCache::new();
        let state = HarnessState::new(1, WaitStrategy::Spin);
        let pool = ValuePool::with_size(1000, 1);
        let mut worker = Worker::new(0, Box::new(cache.client()), &pool, &state, settings());

        worker.execute(&Operation::set("a", 8)).unwrap();
        worker.execute(&Operation::get("a", 8)).unwrap();

        let t = totals(&state);
        assert_eq!((t.get_attempts, t.get_failures, t.set_attempts), (1, 0, 1));
        assert_eq!(cache.value(b"a").unwrap().len(), 8);
    }

    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Fail {
        Never,
        RunError,
        RunPanic,
        WarmupPanic,
    }

    /// Records the states it observes and issues one SET per run
    struct Recorder {
        seen: Mutex<Vec<WorkerState>>,
        fail: Fail,
    }

    impl Recorder {
        fn new(fail: Fail) -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    impl Benchmark for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn format(&self) -> &dyn ReportFormat {
            &DefaultFormat
        }

        fn warmup(&self, worker: &mut Worker<'_>) -> Result<()> {
            self.seen.lock().unwrap().push(worker.state());
            if self.fail == Fail::WarmupPanic {
                panic!("warmup blew up");
            }
            worker.reseed(worker.id() as u64);
            Ok(())
        }

        fn run(&self, worker: &mut Worker<'_>) -> Result<()> {
            self.seen.lock().unwrap().push(worker.state());
            match self.fail {
                Fail::RunError => anyhow::bail!("boom"),
                Fail::RunPanic => panic!("run blew up"),
                _ => worker.issue_set("recorded", 4),
            }
        }
    }

    #[test]
    fn test_lifecycle_states() {
        let cache = MockCache::new();
        let state = HarnessState::new(1, WaitStrategy::Spin);
        let pool = ValuePool::with_size(1000, 1);
        let recorder = Recorder::new(Fail::Never);

        let report = std::thread::scope(|s| {
            let worker = Worker::new(0, Box::new(cache.client()), &pool, &state, settings());
            let handle = s.spawn(|| worker.run(&recorder));
            assert!(state.barrier.wait_all_ready(|| false, Duration::from_secs(10)));
            let released = state.barrier.release().unwrap();
            let report = handle.join().unwrap().unwrap();
            assert!(report.run_started.unwrap() >= released);
            report
        });

        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec![WorkerState::WarmingUp, WorkerState::Running]
        );
        assert_eq!(report.ops, 1);
        assert_eq!(report.set_latency.len(), 1);
        assert!(state.all_done());
        assert!(!state.has_failed());
    }

    #[test]
    fn test_stop_before_release_skips_run() {
        let cache = MockCache::new();
        let state = HarnessState::new(2, WaitStrategy::Block);
        let pool = ValuePool::with_size(1000, 1);
        let recorder = Recorder::new(Fail::Never);

        state.request_stop();
        let worker = Worker::new(0, Box::new(cache.client()), &pool, &state, settings());
        let report = worker.run(&recorder).unwrap();

        assert!(report.run_started.is_none());
        assert_eq!(report.ops, 0);
        assert_eq!(*recorder.seen.lock().unwrap(), vec![WorkerState::WarmingUp]);
        assert_eq!(state.done_count(), 1);
    }

    #[test]
    fn test_run_error_marks_failed_and_done() {
        let cache = MockCache::new();
        let state = HarnessState::new(1, WaitStrategy::Spin);
        let pool = ValuePool::with_size(1000, 1);
        let recorder = Recorder::new(Fail::RunError);

        let result = std::thread::scope(|s| {
            let worker = Worker::new(0, Box::new(cache.client()), &pool, &state, settings());
            let handle = s.spawn(|| worker.run(&recorder));
            assert!(state.barrier.wait_all_ready(|| false, Duration::from_secs(10)));
            state.barrier.release().unwrap();
            handle.join().unwrap()
        });

        let err = result.unwrap_err();
        assert!(format!("{:#}", err).contains("boom"));
        assert!(state.has_failed());
        assert!(state.all_done());
    }

    #[test]
    fn test_run_panic_marks_failed_and_done() {
        let cache = MockCache::new();
        let state = HarnessState::new(1, WaitStrategy::Spin);
        let pool = ValuePool::with_size(1000, 1);
        let recorder = Recorder::new(Fail::RunPanic);

        let joined = std::thread::scope(|s| {
            let worker = Worker::new(0, Box::new(cache.client()), &pool, &state, settings());
            let handle = s.spawn(|| worker.run(&recorder));
            assert!(state.barrier.wait_all_ready(|| false, Duration::from_secs(10)));
            state.barrier.release().unwrap();
            handle.join()
        });

        assert!(joined.is_err());
        assert!(state.has_failed());
        assert!(state.all_done());
        assert_eq!(state.done_count(), 1);
    }

    #[test]
    fn test_warmup_panic_aborts_ready_wait() {
        let cache = MockCache::new();
        let state = HarnessState::new(2, WaitStrategy::Block);
        let pool = ValuePool::with_size(1000, 1);
        let recorder = Recorder::new(Fail::WarmupPanic);

        std::thread::scope(|s| {
            let worker = Worker::new(0, Box::new(cache.client()), &pool, &state, settings());
            let handle = s.spawn(|| worker.run(&recorder));
            // Worker 1 never arrives, so only the failure can end the wait early
            let started = Instant::now();
            assert!(!state
                .barrier
                .wait_all_ready(|| state.has_failed(), Duration::from_secs(10)));
            assert!(started.elapsed() < Duration::from_secs(5));
            assert!(handle.join().is_err());
        });

        assert!(state.has_failed());
        assert_eq!(state.done_count(), 1);
    }
}
