//! Latency histogram using HdrHistogram
//!
//! Each worker records the latency of every GET and SET it issues into its
//! own histogram; the harness merges them after join. Values are stored in
//! nanoseconds from 1ns to 1 hour with 3 significant digits.
//!
//! # Example
//!
//! ```
//! use kvpulse::stats::histogram::LatencyHistogram;
//! use std::time::Duration;
//!
//! let mut hist = LatencyHistogram::new();
//! hist.record(Duration::from_micros(100));
//! hist.record(Duration::from_micros(150));
//!
//! let summary = hist.summary();
//! assert_eq!(summary.count, 2);
//! ```

use crate::Result;
use hdrhistogram::Histogram;
use serde::Serialize;
use std::time::Duration;

/// Largest trackable latency (1 hour in nanoseconds)
const MAX_LATENCY_NS: u64 = 3_600_000_000_000;

/// Request latency histogram
#[derive(Debug, Clone)]
pub struct LatencyHistogram {
    histogram: Histogram<u64>,
}

impl LatencyHistogram {
    /// Create an empty histogram covering 1ns to 1 hour
    pub fn new() -> Self {
        let histogram = Histogram::new_with_bounds(1, MAX_LATENCY_NS, 3)
            .expect("Failed to create histogram with valid bounds");

        Self { histogram }
    }

    /// Record a latency sample, clamped to the trackable range
    #[inline]
    pub fn record(&mut self, latency: Duration) {
        let nanos = u64::try_from(latency.as_nanos()).unwrap_or(MAX_LATENCY_NS);
        let value = nanos.clamp(1, MAX_LATENCY_NS);
        let _ = self.histogram.record(value);
    }

    /// Latency at `percentile` (0.0 - 100.0), or None if empty
    pub fn percentile(&self, percentile: f64) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }
        Some(Duration::from_nanos(
            self.histogram.value_at_percentile(percentile),
        ))
    }

    pub fn max(&self) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }
        Some(Duration::from_nanos(self.histogram.max()))
    }

    pub fn mean(&self) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }
        Some(Duration::from_nanos(self.histogram.mean() as u64))
    }

    /// Number of samples recorded
    pub fn len(&self) -> u64 {
        self.histogram.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histogram.len() == 0
    }

    /// Merge another histogram into this one
    ///
    /// # Errors
    ///
    /// Returns an error if the histograms have incompatible bounds.
    pub fn merge(&mut self, other: &LatencyHistogram) -> Result<()> {
        self.histogram
            .add(&other.histogram)
            .map_err(|e| anyhow::anyhow!("Failed to merge histograms: {:?}", e))?;
        Ok(())
    }

    /// Percentile digest in microseconds
    pub fn summary(&self) -> LatencySummary {
        let micros = |d: Option<Duration>| d.map_or(0.0, |d| d.as_secs_f64() * 1_000_000.0);
        LatencySummary {
            count: self.len(),
            mean_us: micros(self.mean()),
            p50_us: micros(self.percentile(50.0)),
            p90_us: micros(self.percentile(90.0)),
            p99_us: micros(self.percentile(99.0)),
            p999_us: micros(self.percentile(99.9)),
            max_us: micros(self.max()),
        }
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency digest reported in the run summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencySummary {
    pub count: u64,
    pub mean_us: f64,
    pub p50_us: f64,
    pub p90_us: f64,
    pub p99_us: f64,
    pub p999_us: f64,
    pub max_us: f64,
}
