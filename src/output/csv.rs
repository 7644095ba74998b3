//! CSV output formatting
//!
//! Appends one row per sampling interval so a run can be plotted or loaded
//! into pandas afterwards. Rows are written as they are produced, so a run that
//! is interrupted still leaves every completed interval on disk.

use crate::stats::IntervalSample;
use crate::Result;
use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

const HEADER: &str = "timestamp,elapsed_sec,interval_sec,get_attempts,get_failures,set_attempts,set_failures,ok_gets_per_sec,gets_per_sec,sets_per_sec";

/// CSV writer for time-series data
pub struct CsvWriter {
    file: File,
    path: PathBuf,
}

impl CsvWriter {
    /// Create (truncating) `path` and write the header row
    pub fn create(path: &Path) -> Result<Self> {
        let mut file = File::create(path)
            .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
        writeln!(file, "{}", HEADER)
            .with_context(|| format!("Failed to write CSV header: {}", path.display()))?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Append one interval row
    pub fn append(&mut self, sample: &IntervalSample) -> Result<()> {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        writeln!(
            self.file,
            "{},{:.3},{:.3},{},{},{},{},{:.1},{:.1},{:.1}",
            timestamp,
            sample.elapsed.as_secs_f64(),
            sample.interval.as_secs_f64(),
            sample.totals.get_attempts,
            sample.totals.get_failures,
            sample.totals.set_attempts,
            sample.totals.set_failures,
            sample.ok_gets_per_sec(),
            sample.gets_per_sec(),
            sample.sets_per_sec(),
        )
        .with_context(|| format!("Failed to append to CSV file: {}", self.path.display()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
