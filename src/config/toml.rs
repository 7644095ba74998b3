//! TOML configuration file parsing

use super::cli::Cli;
use super::cli_convert::*;
use super::*;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config =
        ::toml::from_str(contents).context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Build the effective configuration from the CLI, loading the TOML file
/// named by `--config` first when present
pub fn load_config(cli: &Cli) -> Result<Config> {
    let base = match cli.config {
        Some(ref path) => parse_toml_file(path)?,
        None => Config::default(),
    };
    merge_cli_with_config(cli, base)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Result<Config> {
    // Workload
    if let Some(mode) = cli.mode {
        config.workload.mode = convert_mode(mode);
    }
    if let Some(ref path) = cli.workload {
        config.workload.workload_file = Some(path.clone());
        // A workload file on the command line implies replay unless a mode was given
        if cli.mode.is_none() {
            config.workload.mode = BenchmarkMode::Replay;
        }
    }
    if let Some(ref duration) = cli.duration {
        config.workload.duration_secs = parse_duration_secs(duration)
            .with_context(|| format!("Invalid --duration: {}", duration))?;
    }
    if let Some(len) = cli.value_length {
        config.workload.value_length = len;
    }
    if let Some(keys) = cli.keys {
        config.workload.keys = keys;
    }
    if let Some(source) = cli.value_length_source {
        config.workload.value_length_source = convert_length_source(source);
    }
    if cli.value_length_from_file {
        config.workload.value_length_source = ValueLengthSource::Bracket;
    }
    if let Some(capacity) = cli.queue_capacity {
        config.workload.queue_capacity = capacity;
    }
    if let Some(order) = cli.key_order {
        config.workload.key_order = convert_key_order(order);
    }
    if cli.prefill {
        config.workload.prefill = true;
    }
    if cli.no_repair_on_length_mismatch {
        config.workload.repair_on_length_mismatch = false;
    }

    // Server
    if let Some(ref host) = cli.host {
        config.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(ref timeout) = cli.io_timeout {
        let timeout = parse_duration(timeout)
            .with_context(|| format!("Invalid --io-timeout: {}", timeout))?;
        config.server.io_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    }

    // Workers
    if let Some(threads) = cli.threads {
        config.workers.threads = threads;
    }
    if let Some(ref cores) = cli.cpu_cores {
        config.workers.cpu_cores = Some(cores.clone());
    }
    if let Some(wait) = cli.wait {
        config.workers.wait = convert_wait(wait);
    }

    // Output
    if let Some(ref interval) = cli.report_interval {
        config.output.report_interval_secs = parse_duration_secs(interval)
            .with_context(|| format!("Invalid --report-interval: {}", interval))?;
    }
    if let Some(ref path) = cli.csv_output {
        config.output.csv_output = Some(path.clone());
    }
    if let Some(ref path) = cli.json_output {
        config.output.json_output = Some(path.clone());
    }

    // Runtime
    if cli.dry_run {
        config.runtime.dry_run = true;
    }
    if cli.debug {
        config.runtime.debug = true;
    }

    Ok(config)
}
