//! Run orchestration
//!
//! The `Harness` owns the worker pool for one run and drives it through
//! warmup, a synchronized start, the timed run and shutdown:
//!
//! 1. The benchmark's `prepare` hook runs on the calling thread (prefill)
//! 2. The report header is written
//! 3. One scoped thread per worker is spawned, plus a feeder thread for
//!    benchmarks that replay a workload
//! 4. Workers warm up and arrive at the [`StartBarrier`]; the harness opens it
//!    once every worker is ready
//! 5. The supervisory loop wakes every millisecond, emits a sample each
//!    report interval and ends the run at the deadline or as soon as every
//!    worker has finished
//! 6. The stop flag is raised and every thread is joined
//!
//! All threads live inside `std::thread::scope`, so every exit path,
//! including a worker failing mid-run, joins the whole pool before `start`
//! returns.
//!
//! # Shared state
//!
//! [`HarnessState`] is the only state threads share. Each field has a single
//! writer:
//!
//! - ready count: incremented by workers, once each
//! - released: set by the harness, once
//! - stop: set by the harness, once
//! - done count: incremented by workers, once each on exit
//! - failed: set by whichever thread hits a fatal error or panics
//! - counters: incremented by workers

pub mod barrier;

use crate::bench::Benchmark;
use crate::client::CacheClient;
use crate::config::workload::WaitStrategy;
use crate::config::Config;
use crate::stats::histogram::LatencyHistogram;
use crate::stats::live::StatsReporter;
use crate::stats::{CounterSnapshot, Counters};
use crate::util::buffer::ValuePool;
use crate::worker::affinity::{
    core_for_worker, parse_cpu_list, set_cpu_affinity, warn_if_oversubscribed,
};
use crate::worker::{Worker, WorkerReport, WorkerSettings};
use crate::workload::producer::ProducerStats;
use crate::Result;
use anyhow::Context;
use barrier::StartBarrier;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Sleep between supervisory clock checks
pub const SUPERVISOR_TICK: Duration = Duration::from_millis(1);

/// Default limit on how long warmup may take
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(60);

/// State shared between the harness and its threads for one run
#[derive(Debug)]
pub struct HarnessState {
    /// Start gate
    pub barrier: StartBarrier,
    /// Request counters
    pub counters: Counters,
    stop: AtomicBool,
    done: AtomicUsize,
    failed: AtomicBool,
    workers: usize,
}

impl HarnessState {
    pub fn new(workers: usize, wait: WaitStrategy) -> Self {
        Self {
            barrier: StartBarrier::new(workers, wait),
            counters: Counters::new(),
            stop: AtomicBool::new(false),
            done: AtomicUsize::new(0),
            failed: AtomicBool::new(false),
            workers,
        }
    }

    /// Raise the stop signal (harness only)
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    #[inline]
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// The stop flag itself, for components that poll a plain `AtomicBool`
    pub fn stop_flag(&self) -> &AtomicBool {
        &self.stop
    }

    /// Worker exit; called exactly once per worker
    pub fn mark_done(&self) {
        self.done.fetch_add(1, Ordering::AcqRel);
    }

    pub fn done_count(&self) -> usize {
        self.done.load(Ordering::Acquire)
    }

    pub fn all_done(&self) -> bool {
        self.done_count() >= self.workers
    }

    /// Record a fatal error somewhere in the pool
    pub fn mark_failed(&self) {
        self.failed.store(true, Ordering::Release);
    }

    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

/// Marks the harness failed if the thread holding it panics
struct FailOnUnwind<'a>(&'a HarnessState);

impl Drop for FailOnUnwind<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.mark_failed();
        }
    }
}

/// Run parameters the harness needs
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub threads: usize,
    pub duration: Duration,
    pub report_interval: Duration,
    pub wait: WaitStrategy,
    /// Cores to pin worker `i` to (`cores[i % len]`)
    pub cpu_cores: Option<Vec<usize>>,
    /// Abort if workers are not all ready within this time
    pub ready_timeout: Duration,
    pub worker: WorkerSettings,
}

impl HarnessConfig {
    /// Derive harness parameters from a validated configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let cpu_cores = match config.workers.cpu_cores {
            Some(ref spec) => Some(parse_cpu_list(spec).context("Invalid cpu_cores")?),
            None => None,
        };

        Ok(Self {
            threads: config.workers.threads,
            duration: config.workload.duration(),
            report_interval: config.output.report_interval(),
            wait: config.workers.wait,
            cpu_cores,
            ready_timeout: DEFAULT_READY_TIMEOUT,
            worker: WorkerSettings::from_config(config),
        })
    }
}

/// Outcome of one run
#[derive(Debug)]
pub struct RunReport {
    pub benchmark: &'static str,
    pub threads: usize,
    /// Counters after every thread was joined
    pub totals: CounterSnapshot,
    /// Time from barrier release to the end of the supervisory loop
    pub elapsed: Duration,
    /// True if every worker finished on its own before the deadline
    pub completed: bool,
    /// Interval lines emitted
    pub samples: u64,
    /// GET latency merged across workers
    pub get_latency: LatencyHistogram,
    /// SET latency merged across workers
    pub set_latency: LatencyHistogram,
    pub workers: Vec<WorkerReport>,
    /// Replay producer counts, for benchmarks that have one
    pub producer: Option<ProducerStats>,
}

/// Timing of the supervised phase
struct Supervised {
    released: Instant,
    elapsed: Duration,
    completed: bool,
}

/// Worker pool orchestrator for one run
pub struct Harness<'b> {
    config: HarnessConfig,
    bench: &'b dyn Benchmark,
    clients: Vec<Box<dyn CacheClient>>,
    pool: ValuePool,
    reporter: StatsReporter,
}

impl<'b> Harness<'b> {
    /// Create a harness with one client per worker
    ///
    /// # Errors
    ///
    /// Returns an error if the number of clients does not match
    /// `config.threads`.
    pub fn new(
        config: HarnessConfig,
        bench: &'b dyn Benchmark,
        clients: Vec<Box<dyn CacheClient>>,
        reporter: StatsReporter,
    ) -> Result<Self> {
        if config.threads == 0 {
            anyhow::bail!("harness needs at least one worker");
        }
        if clients.len() != config.threads {
            anyhow::bail!(
                "expected {} clients (one per worker), got {}",
                config.threads,
                clients.len()
            );
        }

        Ok(Self {
            config,
            bench,
            clients,
            pool: ValuePool::new(),
            reporter,
        })
    }

    /// Use `pool` for synthesized values instead of the default one
    pub fn with_pool(mut self, pool: ValuePool) -> Self {
        self.pool = pool;
        self
    }

    /// Run the benchmark to completion
    ///
    /// Blocks until the deadline passes or every worker has finished, whichever
    /// comes first. Every spawned thread is joined before this returns, on
    /// success and on error.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error raised by a worker or the feeder, a
    /// warmup timeout, or a failure to write the report.
    pub fn start(self) -> Result<RunReport> {
        let Self {
            config,
            bench,
            mut clients,
            pool,
            mut reporter,
        } = self;

        if let Some(client) = clients.first_mut() {
            bench
                .prepare(client.as_mut(), &pool)
                .with_context(|| format!("{} preparation failed", bench.name()))?;
        }

        if config.cpu_cores.is_some() {
            warn_if_oversubscribed(config.threads);
        }

        reporter.header(bench.format())?;

        let state = HarnessState::new(config.threads, config.wait);
        let settings = config.worker;

        info!(
            benchmark = bench.name(),
            threads = config.threads,
            duration = ?config.duration,
            "starting run"
        );

        thread::scope(|s| {
            let mut workers = Vec::with_capacity(config.threads);
            let mut spawn_error = None;

            for (id, client) in clients.into_iter().enumerate() {
                let worker = Worker::new(id, client, &pool, &state, settings);
                let core = config
                    .cpu_cores
                    .as_deref()
                    .and_then(|cores| core_for_worker(id, cores));

                let spawned = thread::Builder::new()
                    .name(format!("kvpulse-worker-{}", id))
                    .spawn_scoped(s, move || {
                        if let Some(core) = core {
                            if let Err(e) = set_cpu_affinity(&[core]) {
                                warn!(worker = id, core, "CPU pinning failed: {:#}", e);
                            }
                        }
                        worker.run(bench)
                    });

                match spawned {
                    Ok(handle) => workers.push(handle),
                    Err(e) => {
                        spawn_error = Some(
                            anyhow::Error::new(e).context(format!("Failed to spawn worker {}", id)),
                        );
                        break;
                    }
                }
            }

            let feeder = if spawn_error.is_none() && bench.has_feeder() {
                let state = &state;
                let spawned = thread::Builder::new()
                    .name("kvpulse-feeder".to_string())
                    .spawn_scoped(s, move || {
                        let _unwind = FailOnUnwind(state);
                        let result = bench.feed(state);
                        if result.is_err() {
                            state.mark_failed();
                        }
                        result
                    });
                match spawned {
                    Ok(handle) => Some(handle),
                    Err(e) => {
                        spawn_error = Some(anyhow::Error::new(e).context("Failed to spawn feeder"));
                        None
                    }
                }
            } else {
                None
            };

            let supervised = match spawn_error {
                Some(e) => Err(e),
                None => supervise(&config, bench, &state, &mut reporter),
            };
            state.request_stop();

            // Join everything; keep the first error
            let mut first_error: Option<anyhow::Error> = None;
            let mut reports = Vec::with_capacity(workers.len());
            for (id, handle) in workers.into_iter().enumerate() {
                match handle.join() {
                    Ok(Ok(report)) => reports.push(report),
                    Ok(Err(e)) => {
                        error!(worker = id, "worker failed: {:#}", e);
                        first_error.get_or_insert(e);
                    }
                    Err(_) => {
                        first_error.get_or_insert_with(|| anyhow::anyhow!("worker {} panicked", id));
                    }
                }
            }

            let mut producer = None;
            if let Some(handle) = feeder {
                match handle.join() {
                    Ok(Ok(stats)) => producer = stats,
                    Ok(Err(e)) => {
                        error!("feeder failed: {:#}", e);
                        first_error.get_or_insert(e);
                    }
                    Err(_) => {
                        first_error.get_or_insert_with(|| anyhow::anyhow!("feeder panicked"));
                    }
                }
            }

            if let Some(e) = first_error {
                return Err(e);
            }
            let supervised = supervised?;

            let mut get_latency = LatencyHistogram::new();
            let mut set_latency = LatencyHistogram::new();
            for report in &reports {
                get_latency.merge(&report.get_latency)?;
                set_latency.merge(&report.set_latency)?;
                if let Some(started) = report.run_started {
                    debug_assert!(started >= supervised.released);
                }
            }

            let totals = state.counters.snapshot();
            info!(
                elapsed = ?supervised.elapsed,
                completed = supervised.completed,
                get_attempts = totals.get_attempts,
                set_attempts = totals.set_attempts,
                "run finished"
            );

            Ok(RunReport {
                benchmark: bench.name(),
                threads: config.threads,
                totals,
                elapsed: supervised.elapsed,
                completed: supervised.completed,
                samples: reporter.samples(),
                get_latency,
                set_latency,
                workers: reports,
                producer,
            })
        })
    }
}

/// Release the barrier and run the timed supervisory loop
fn supervise(
    config: &HarnessConfig,
    bench: &dyn Benchmark,
    state: &HarnessState,
    reporter: &mut StatsReporter,
) -> Result<Supervised> {
    if !state
        .barrier
        .wait_all_ready(|| state.has_failed(), config.ready_timeout)
    {
        if state.has_failed() {
            anyhow::bail!("a worker failed during warmup");
        }
        anyhow::bail!(
            "only {} of {} workers became ready within {:?}",
            state.barrier.ready_count(),
            config.threads,
            config.ready_timeout
        );
    }

    let released = state
        .barrier
        .release()
        .ok_or_else(|| anyhow::anyhow!("start barrier refused to open"))?;
    debug!(workers = config.threads, "start barrier released");

    let deadline = released + config.duration;
    let mut next_sample = released + config.report_interval;
    let mut last_elapsed = Duration::ZERO;

    loop {
        let now = Instant::now();
        if now >= next_sample {
            let elapsed = now - released;
            reporter.sample(
                bench.format(),
                state.counters.snapshot(),
                elapsed,
                elapsed - last_elapsed,
            )?;
            last_elapsed = elapsed;
            next_sample += config.report_interval;
        }

        if state.has_failed() {
            break;
        }
        if state.all_done() {
            return Ok(Supervised {
                released,
                elapsed: released.elapsed(),
                completed: true,
            });
        }
        if now >= deadline {
            break;
        }

        thread::sleep(SUPERVISOR_TICK);
    }

    Ok(Supervised {
        released,
        elapsed: released.elapsed(),
        completed: false,
    })
}
