//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.

pub mod cli;
pub mod cli_convert;
pub mod toml;
pub mod validator;
pub mod workload;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use workload::*;

/// Complete benchmark configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub workload: WorkloadConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// What traffic is generated and for how long
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Benchmark variant
    pub mode: BenchmarkMode,
    /// Recorded workload to replay (replay mode only)
    pub workload_file: Option<PathBuf>,
    /// Run duration in seconds
    pub duration_secs: f64,
    /// Value length in bytes for synthesized and repair SETs
    pub value_length: usize,
    /// Number of distinct keys in self-driving mode
    pub keys: u64,
    /// Source of SET value lengths in replay mode
    pub value_length_source: ValueLengthSource,
    /// Key walk order in self-driving mode
    pub key_order: KeyOrder,
    /// Treat a hit with an unexpected value length as a miss and rewrite it
    pub repair_on_length_mismatch: bool,
    /// SET every key once before the timed run
    pub prefill: bool,
    /// Maximum number of queued operations in replay mode
    pub queue_capacity: usize,
}

impl WorkloadConfig {
    /// Run duration, or zero if the configured value is not representable
    pub fn duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.duration_secs).unwrap_or(Duration::ZERO)
    }
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            mode: BenchmarkMode::default(),
            workload_file: None,
            duration_secs: 10.0,
            value_length: 1024,
            keys: 10_000,
            value_length_source: ValueLengthSource::default(),
            key_order: KeyOrder::default(),
            repair_on_length_mismatch: true,
            prefill: false,
            queue_capacity: 1000,
        }
    }
}

/// Cache server connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Per-request read/write timeout in milliseconds
    pub io_timeout_ms: u64,
}

impl ServerConfig {
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 11211,
            io_timeout_ms: 5000,
        }
    }
}

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of worker threads
    pub threads: usize,
    /// CPU cores to pin workers to (e.g. "0-3,8")
    pub cpu_cores: Option<String>,
    /// How threads wait on the barrier and the queue
    pub wait: WaitStrategy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            cpu_cores: None,
            wait: WaitStrategy::default(),
        }
    }
}

/// Reporting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Sampling interval in seconds
    pub report_interval_secs: f64,
    /// CSV time-series file
    pub csv_output: Option<PathBuf>,
    /// JSON run summary file
    pub json_output: Option<PathBuf>,
}

impl OutputConfig {
    pub fn report_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.report_interval_secs).unwrap_or(Duration::ZERO)
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 1.0,
            csv_output: None,
            json_output: None,
        }
    }
}

/// Runtime switches
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Validate and print the configuration, then exit
    pub dry_run: bool,
    /// Verbose diagnostics
    pub debug: bool,
}

impl RuntimeConfig {
    /// Default log filter when `RUST_LOG` is unset
    pub fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration:")?;
        writeln!(f, "  Workload: {}", self.workload)?;
        writeln!(f, "  Server: {}", self.server)?;
        writeln!(f, "  Workers: {}", self.workers)?;
        writeln!(f, "  Output: {}", self.output)?;
        Ok(())
    }
}

impl fmt::Display for WorkloadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mode={}, duration={}s, value_length={}, keys={}",
            self.mode, self.duration_secs, self.value_length, self.keys
        )?;
        match self.mode {
            BenchmarkMode::FillThenRead => {
                write!(f, ", key_order={}", self.key_order)?;
                if self.prefill {
                    write!(f, ", prefill")?;
                }
            }
            BenchmarkMode::Replay => {
                if let Some(ref path) = self.workload_file {
                    write!(f, ", file={}", path.display())?;
                }
                write!(
                    f,
                    ", value_length_source={}, queue_capacity={}",
                    self.value_length_source, self.queue_capacity
                )?;
            }
        }
        if !self.repair_on_length_mismatch {
            write!(f, ", no length repair")?;
        }
        Ok(())
    }
}

impl fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (timeout {}ms)", self.address(), self.io_timeout_ms)
    }
}

impl fmt::Display for WorkerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} thread(s), wait={}", self.threads, self.wait)?;
        if let Some(ref cores) = self.cpu_cores {
            write!(f, ", cpu_cores={}", cores)?;
        }
        Ok(())
    }
}

impl fmt::Display for OutputConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "interval={}s", self.report_interval_secs)?;
        if let Some(ref path) = self.csv_output {
            write!(f, ", csv={}", path.display())?;
        }
        if let Some(ref path) = self.json_output {
            write!(f, ", json={}", path.display())?;
        }
        Ok(())
    }
}
