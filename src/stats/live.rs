//! Live statistics reporting
//!
//! `StatsReporter` turns the cumulative run counters into one time-series line
//! per sampling interval. It remembers the previous snapshot (zero before the
//! first sample) so each line can show interval-local rates next to the
//! running totals.
//!
//! Line layout belongs to the benchmark variant through [`ReportFormat`]; the
//! default is the whitespace-separated
//!
//! ```text
//! time getAttempts getFailures setAttempts setFailures okGetsPerSec
//! ```
//!
//! Every sample can also be appended to a CSV file.
//!
//! # Example
//!
//! ```
//! use kvpulse::stats::live::{DefaultFormat, StatsReporter};
//! use kvpulse::stats::CounterSnapshot;
//! use std::time::Duration;
//!
//! let mut reporter = StatsReporter::new(Box::new(Vec::<u8>::new()));
//! reporter.header(&DefaultFormat).unwrap();
//!
//! let totals = CounterSnapshot { get_attempts: 100, get_failures: 10, ..Default::default() };
//! let sample = reporter
//!     .sample(&DefaultFormat, totals, Duration::from_secs(1), Duration::from_secs(1))
//!     .unwrap();
//! assert_eq!(sample.ok_gets_per_sec(), 90.0);
//! ```

use crate::output::csv::CsvWriter;
use crate::stats::{CounterSnapshot, IntervalSample};
use crate::Result;
use anyhow::Context;
use std::io::{self, Write};
use std::time::Duration;

/// Column layout of the live report
pub trait ReportFormat {
    /// Write the header line
    fn write_header(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(
            out,
            "time getAttempts getFailures setAttempts setFailures okGetsPerSec"
        )
    }

    /// Write one sample line
    fn write_sample(&self, out: &mut dyn Write, sample: &IntervalSample) -> io::Result<()> {
        writeln!(
            out,
            "{:.3} {} {} {} {} {:.0}",
            sample.elapsed.as_secs_f64(),
            sample.totals.get_attempts,
            sample.totals.get_failures,
            sample.totals.set_attempts,
            sample.totals.set_failures,
            sample.ok_gets_per_sec()
        )
    }
}

/// The default column layout
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFormat;

impl ReportFormat for DefaultFormat {}

/// Interval reporter writing measurement lines to `out`
pub struct StatsReporter {
    out: Box<dyn Write>,
    last: CounterSnapshot,
    samples: u64,
    csv: Option<CsvWriter>,
}

impl StatsReporter {
    /// Create a reporter writing to `out` (usually stdout)
    pub fn new(out: Box<dyn Write>) -> Self {
        Self {
            out,
            last: CounterSnapshot::default(),
            samples: 0,
            csv: None,
        }
    }

    /// Also append every sample to `csv`
    pub fn with_csv(mut self, csv: CsvWriter) -> Self {
        self.csv = Some(csv);
        self
    }

    /// Emit the header line; called once before the run
    pub fn header(&mut self, format: &dyn ReportFormat) -> Result<()> {
        format
            .write_header(&mut self.out)
            .and_then(|()| self.out.flush())
            .context("Failed to write report header")
    }

    /// Emit one interval line and advance the remembered snapshot
    ///
    /// # Arguments
    ///
    /// * `format` - Line layout
    /// * `totals` - Cumulative counters read just now
    /// * `elapsed` - Time since the run started
    /// * `interval` - Time since the previous sample
    ///
    /// # Errors
    ///
    /// Returns an error if the report or CSV line cannot be written.
    pub fn sample(
        &mut self,
        format: &dyn ReportFormat,
        totals: CounterSnapshot,
        elapsed: Duration,
        interval: Duration,
    ) -> Result<IntervalSample> {
        let sample = IntervalSample {
            elapsed,
            interval,
            totals,
            delta: totals.delta(&self.last),
        };

        format
            .write_sample(&mut self.out, &sample)
            .and_then(|()| self.out.flush())
            .context("Failed to write report sample")?;
        if let Some(ref mut csv) = self.csv {
            csv.append(&sample)?;
        }

        self.last = totals;
        self.samples += 1;
        Ok(sample)
    }

    /// Snapshot used for the next delta
    pub fn last(&self) -> CounterSnapshot {
        self.last
    }

    /// Number of samples emitted so far
    pub fn samples(&self) -> u64 {
        self.samples
    }
}
