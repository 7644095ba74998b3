//! kvpulse - key-value cache load generator
//!
//! kvpulse drives synthetic or trace-replayed GET/SET traffic against a
//! memcached-compatible cache from a pool of worker threads and reports
//! throughput and failure counts once per interval.
//!
//! # Architecture
//!
//! - **Harness**: warmup, synchronized start, timed or completion-bounded run,
//!   guaranteed join of every thread
//! - **Benchmarks**: fill-then-read over a fixed key space, or replay of a
//!   workload trace through a bounded queue
//! - **Workers**: one thread and one connection each; GET misses are repaired
//!   with SETs
//! - **Stats**: shared atomic counters sampled into a live report, per-worker
//!   latency histograms merged at the end

pub mod bench;
pub mod client;
pub mod config;
pub mod harness;
pub mod output;
pub mod queue;
pub mod stats;
pub mod util;
pub mod worker;
pub mod workload;

// Re-export commonly used types
pub use bench::Benchmark;
pub use client::CacheClient;
pub use config::Config;
pub use harness::{Harness, RunReport};
pub use worker::Worker;

/// Result type used throughout kvpulse
pub type Result<T> = anyhow::Result<T>;
