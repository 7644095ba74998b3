//! Benchmark variants
//!
//! A [`Benchmark`] supplies the per-variant behavior the harness composes into
//! a run: an optional preparation step, the worker warmup and run hooks, an
//! optional feeder thread and the live report layout.
//!
//! Two variants exist:
//! - [`fill_then_read::FillThenRead`]: workers generate GETs over a fixed key
//!   space; misses are repaired with SETs, so the cache fills as the run
//!   proceeds
//! - [`replay::Replay`]: a feeder thread parses a workload trace into a
//!   bounded queue that the workers drain

pub mod fill_then_read;
pub mod replay;

use crate::client::CacheClient;
use crate::config::workload::BenchmarkMode;
use crate::config::Config;
use crate::harness::HarnessState;
use crate::stats::live::ReportFormat;
use crate::util::buffer::{ValuePool, DEFAULT_POOL_SIZE};
use crate::worker::Worker;
use crate::workload::producer::ProducerStats;
use crate::workload::ParseOptions;
use crate::Result;
use fill_then_read::FillThenRead;
use replay::Replay;

/// Per-variant hooks driven by the harness
pub trait Benchmark: Send + Sync {
    /// Short name used in logs and the summary
    fn name(&self) -> &'static str;

    /// Layout of the live report
    fn format(&self) -> &dyn ReportFormat;

    /// Runs once on the harness thread before any worker starts
    ///
    /// Requests issued here are not counted.
    fn prepare(&self, _client: &mut dyn CacheClient, _pool: &ValuePool) -> Result<()> {
        Ok(())
    }

    /// Warmup hook, run on the worker thread before it reports ready
    ///
    /// The default reseeds the worker's PRNG with its ID so every run
    /// produces the same value stream per worker.
    fn warmup(&self, worker: &mut Worker<'_>) -> Result<()> {
        let seed = worker.id() as u64;
        worker.reseed(seed);
        Ok(())
    }

    /// Run hook; returns when the worker should stop
    fn run(&self, worker: &mut Worker<'_>) -> Result<()>;

    /// Whether `feed` must run on its own thread
    fn has_feeder(&self) -> bool {
        false
    }

    /// Feeder body, run concurrently with the workers
    fn feed(&self, _state: &HarnessState) -> Result<Option<ProducerStats>> {
        Ok(None)
    }
}

/// Build the benchmark selected by `config`
///
/// # Errors
///
/// Returns an error if replay mode has no workload file.
pub fn from_config(config: &Config) -> Result<Box<dyn Benchmark>> {
    let workload = &config.workload;

    match workload.mode {
        BenchmarkMode::FillThenRead => {
            let mut bench = FillThenRead::new(workload.keys, workload.key_order);
            if workload.prefill {
                bench = bench.with_prefill(workload.value_length);
            }
            Ok(Box::new(bench))
        }
        BenchmarkMode::Replay => {
            let path = workload
                .workload_file
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("replay mode requires a workload file"))?;
            let options = ParseOptions {
                source: workload.value_length_source,
                value_length: workload.value_length,
                max_value_length: DEFAULT_POOL_SIZE,
            };
            Ok(Box::new(Replay::new(
                path,
                options,
                workload.queue_capacity,
                config.workers.wait,
            )))
        }
    }
}
