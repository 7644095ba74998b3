//! CLI argument parsing using clap

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// kvpulse - multi-threaded load generator for key-value caches
#[derive(Parser, Debug)]
#[command(name = "kvpulse")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Benchmark mode: fill-then-read or replay
    #[arg(long, value_enum)]
    pub mode: Option<Mode>,

    /// Recorded workload file (replay mode)
    #[arg(value_name = "WORKLOAD")]
    pub workload: Option<PathBuf>,

    // === Basic Options ===
    /// Run duration (e.g., 10s, 500ms, 2m)
    #[arg(short = 'd', long)]
    pub duration: Option<String>,

    /// Number of worker threads
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Value length in bytes for SETs
    #[arg(short = 's', long)]
    pub value_length: Option<usize>,

    /// Number of distinct keys (fill-then-read mode)
    #[arg(short = 'k', long)]
    pub keys: Option<u64>,

    // === Server Options ===
    /// Cache server host
    #[arg(long, env = "KVPULSE_HOST")]
    pub host: Option<String>,

    /// Cache server port
    #[arg(short = 'p', long, env = "KVPULSE_PORT")]
    pub port: Option<u16>,

    /// Per-request I/O timeout (e.g., 5s, 250ms)
    #[arg(long)]
    pub io_timeout: Option<String>,

    // === Workload Options ===
    /// Where replayed SET value lengths come from
    #[arg(long, value_enum)]
    pub value_length_source: Option<LengthSource>,

    /// Derive replayed SET value lengths from the bracketed field span
    #[arg(long, conflicts_with = "value_length_source")]
    pub value_length_from_file: bool,

    /// Maximum queued operations in replay mode
    #[arg(long)]
    pub queue_capacity: Option<usize>,

    /// Key walk order (fill-then-read mode)
    #[arg(long, value_enum)]
    pub key_order: Option<KeyWalk>,

    /// SET every key once before the timed run
    #[arg(long)]
    pub prefill: bool,

    /// Count a wrong-length hit as a success instead of rewriting the value
    #[arg(long)]
    pub no_repair_on_length_mismatch: bool,

    // === Worker Options ===
    /// How threads wait on the start barrier and the work queue
    #[arg(long, value_enum)]
    pub wait: Option<Wait>,

    /// CPU cores to bind workers to (e.g., "0-3,8")
    #[arg(long)]
    pub cpu_cores: Option<String>,

    // === Output Options ===
    /// Sampling interval (e.g., 1s, 500ms)
    #[arg(long)]
    pub report_interval: Option<String>,

    /// CSV time-series output file
    #[arg(long)]
    pub csv_output: Option<PathBuf>,

    /// JSON run summary output file
    #[arg(long)]
    pub json_output: Option<PathBuf>,

    // === Configuration File ===
    /// TOML configuration file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Dry run - validate configuration without executing
    #[arg(long)]
    pub dry_run: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,
}

/// Benchmark mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Self-driving GETs over the key space, repairing misses
    FillThenRead,
    /// Replay a recorded workload through the work queue
    Replay,
}

/// Replayed value length source
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LengthSource {
    /// Configured value length
    Fixed,
    /// Width of the bracketed field span
    Bracket,
    /// Trailing numeric field
    Trailing,
}

/// Wait strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Wait {
    /// Busy-poll with backoff
    Spin,
    /// Condition variable
    Block,
}

/// Key walk order
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KeyWalk {
    /// Round-robin
    Sequential,
    /// PRNG-chosen
    Random,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
