//! JSON output formatting
//!
//! Serializes the run summary for post-processing: run metadata (timestamp,
//! hostname, configuration digest), request totals with average rates, the
//! producer counts for replay runs and per-operation latency percentiles.

use crate::config::Config;
use crate::harness::RunReport;
use crate::stats::histogram::LatencySummary;
use crate::stats::CounterSnapshot;
use crate::util::time::{calculate_rate, percent};
use crate::workload::producer::ProducerStats;
use crate::Result;
use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Settings that shaped the run
#[derive(Debug, Clone, Serialize)]
pub struct JsonRunConfig {
    pub mode: String,
    pub server: String,
    pub threads: usize,
    pub duration_secs: f64,
    pub value_length: usize,
    pub keys: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workload_file: Option<String>,
    pub value_length_source: String,
    pub key_order: String,
    pub wait: String,
}

impl JsonRunConfig {
    pub fn from_config(config: &Config) -> Self {
        let workload = &config.workload;
        Self {
            mode: workload.mode.to_string(),
            server: config.server.address(),
            threads: config.workers.threads,
            duration_secs: workload.duration_secs,
            value_length: workload.value_length,
            keys: workload.keys,
            workload_file: workload
                .workload_file
                .as_ref()
                .map(|p| p.display().to_string()),
            value_length_source: workload.value_length_source.to_string(),
            key_order: workload.key_order.to_string(),
            wait: config.workers.wait.to_string(),
        }
    }
}

/// Average request rates over the whole run
#[derive(Debug, Clone, Copy, Serialize)]
pub struct JsonRates {
    pub gets_per_sec: f64,
    pub sets_per_sec: f64,
    pub ok_gets_per_sec: f64,
    pub miss_percent: f64,
}

/// Run summary document
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub benchmark: String,
    pub config: JsonRunConfig,
    pub elapsed_secs: f64,
    pub completed: bool,
    pub samples: u64,
    pub totals: CounterSnapshot,
    pub rates: JsonRates,
    pub get_latency: LatencySummary,
    pub set_latency: LatencySummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub producer: Option<JsonProducer>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct JsonProducer {
    pub lines: u64,
    pub enqueued: u64,
    pub skipped: u64,
}

impl From<ProducerStats> for JsonProducer {
    fn from(stats: ProducerStats) -> Self {
        Self {
            lines: stats.lines,
            enqueued: stats.enqueued,
            skipped: stats.skipped,
        }
    }
}

/// Name of this machine, if it can be determined
pub fn local_hostname() -> Option<String> {
    hostname::get().ok().and_then(|h| h.into_string().ok())
}

/// Build the summary document for a finished run
pub fn build_summary(report: &RunReport, config: &Config, hostname: Option<String>) -> JsonSummary {
    let totals = report.totals;
    let secs = report.elapsed.as_secs_f64();

    JsonSummary {
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        hostname,
        benchmark: report.benchmark.to_string(),
        config: JsonRunConfig::from_config(config),
        elapsed_secs: secs,
        completed: report.completed,
        samples: report.samples,
        totals,
        rates: JsonRates {
            gets_per_sec: calculate_rate(totals.get_attempts, secs),
            sets_per_sec: calculate_rate(totals.set_attempts, secs),
            ok_gets_per_sec: calculate_rate(totals.ok_gets(), secs),
            miss_percent: percent(totals.get_failures, totals.get_attempts),
        },
        get_latency: report.get_latency.summary(),
        set_latency: report.set_latency.summary(),
        producer: report.producer.map(JsonProducer::from),
    }
}

/// Write `summary` to `path` as pretty-printed JSON
pub fn write_json_output(path: &Path, summary: &JsonSummary) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create JSON output file: {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), summary)
        .with_context(|| format!("Failed to write JSON output: {}", path.display()))?;
    Ok(())
}
