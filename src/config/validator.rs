//! Configuration validation

use super::*;
use crate::util::buffer::DEFAULT_POOL_SIZE;
use crate::worker::affinity::parse_cpu_list;
use anyhow::{Context, Result};
use std::fs::File;
use tracing::warn;

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_workload(&config.workload)?;
    validate_server(&config.server)?;
    validate_workers(&config.workers)?;
    validate_output(&config.output)?;

    Ok(())
}

/// Validate workload configuration
pub fn validate_workload(workload: &WorkloadConfig) -> Result<()> {
    if !(workload.duration_secs.is_finite() && workload.duration_secs > 0.0) {
        anyhow::bail!("duration must be positive, got {}s", workload.duration_secs);
    }
    if workload.duration().is_zero() {
        anyhow::bail!("duration {}s is too small", workload.duration_secs);
    }

    if workload.value_length == 0 {
        anyhow::bail!("value_length must be at least 1");
    }
    if workload.value_length > DEFAULT_POOL_SIZE {
        anyhow::bail!(
            "value_length must be <= {} bytes, got {}",
            DEFAULT_POOL_SIZE,
            workload.value_length
        );
    }

    if workload.keys == 0 {
        anyhow::bail!("keys must be at least 1");
    }

    if workload.queue_capacity == 0 {
        anyhow::bail!("queue_capacity must be at least 1");
    }

    match workload.mode {
        BenchmarkMode::Replay => {
            let path = workload
                .workload_file
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("replay mode requires a workload file"))?;
            File::open(path)
                .with_context(|| format!("Cannot open workload file: {}", path.display()))?;
        }
        BenchmarkMode::FillThenRead => {
            if workload.workload_file.is_some() {
                warn!("workload file is ignored in fill-then-read mode");
            }
        }
    }

    Ok(())
}

/// Validate server configuration
pub fn validate_server(server: &ServerConfig) -> Result<()> {
    if server.host.trim().is_empty() {
        anyhow::bail!("server host cannot be empty");
    }
    if server.port == 0 {
        anyhow::bail!("server port must be greater than 0");
    }
    if server.io_timeout_ms == 0 {
        anyhow::bail!("io_timeout must be greater than 0");
    }

    Ok(())
}

/// Validate workers configuration
pub fn validate_workers(workers: &WorkerConfig) -> Result<()> {
    if workers.threads == 0 {
        anyhow::bail!("workers.threads must be at least 1");
    }

    // Warn if thread count is very high
    if workers.threads > 1024 {
        warn!(
            threads = workers.threads,
            "very high thread count, this may cause performance issues"
        );
    }

    if let Some(ref cores) = workers.cpu_cores {
        parse_cpu_list(cores).context("Invalid cpu_cores")?;
    }

    Ok(())
}

/// Validate output configuration
pub fn validate_output(output: &OutputConfig) -> Result<()> {
    if !(output.report_interval_secs.is_finite() && output.report_interval_secs > 0.0) {
        anyhow::bail!(
            "report_interval must be positive, got {}s",
            output.report_interval_secs
        );
    }
    if output.report_interval().is_zero() {
        anyhow::bail!("report_interval {}s is too small", output.report_interval_secs);
    }

    Ok(())
}
