//! CLI to Config conversion utilities

use crate::config::cli;
use crate::config::workload;
use anyhow::{Context, Result};
use std::time::Duration;

/// Parse a duration string (e.g., "500ms", "10s", "5m", "1h") to a Duration
///
/// A bare number is taken as seconds. Fractional values are accepted
/// ("1.5s", "0.25").
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix("ms") {
        (n, 0.001)
    } else if let Some(n) = s.strip_suffix("us") {
        (n, 0.000_001)
    } else if let Some(n) = s.strip_suffix("sec") {
        (n, 1.0)
    } else if let Some(n) = s.strip_suffix("min") {
        (n, 60.0)
    } else if let Some(n) = s.strip_suffix("hr") {
        (n, 3600.0)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1.0)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60.0)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 3600.0)
    } else {
        (s.as_str(), 1.0)
    };

    let num: f64 = num_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid duration format: {}", s))?;

    Duration::try_from_secs_f64(num * multiplier)
        .with_context(|| format!("Duration out of range: {}", s))
}

/// Parse a duration string to fractional seconds
pub fn parse_duration_secs(s: &str) -> Result<f64> {
    Ok(parse_duration(s)?.as_secs_f64())
}

/// Convert CLI Mode to workload BenchmarkMode
pub fn convert_mode(cli_mode: cli::Mode) -> workload::BenchmarkMode {
    match cli_mode {
        cli::Mode::FillThenRead => workload::BenchmarkMode::FillThenRead,
        cli::Mode::Replay => workload::BenchmarkMode::Replay,
    }
}

/// Convert CLI LengthSource to workload ValueLengthSource
pub fn convert_length_source(cli_source: cli::LengthSource) -> workload::ValueLengthSource {
    match cli_source {
        cli::LengthSource::Fixed => workload::ValueLengthSource::Fixed,
        cli::LengthSource::Bracket => workload::ValueLengthSource::Bracket,
        cli::LengthSource::Trailing => workload::ValueLengthSource::Trailing,
    }
}

/// Convert CLI Wait to workload WaitStrategy
pub fn convert_wait(cli_wait: cli::Wait) -> workload::WaitStrategy {
    match cli_wait {
        cli::Wait::Spin => workload::WaitStrategy::Spin,
        cli::Wait::Block => workload::WaitStrategy::Block,
    }
}

/// Convert CLI KeyWalk to workload KeyOrder
pub fn convert_key_order(cli_order: cli::KeyWalk) -> workload::KeyOrder {
    match cli_order {
        cli::KeyWalk::Sequential => workload::KeyOrder::Sequential,
        cli::KeyWalk::Random => workload::KeyOrder::Random,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_seconds() {
        assert_eq!(parse_duration("60").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("60s").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("60sec").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
    }

    #[test]
    fn test_parse_duration_sub_second() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("250us").unwrap(), Duration::from_micros(250));
    }

    #[test]
    fn test_parse_duration_minutes_hours() {
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("5min").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("2hr").unwrap(), Duration::from_secs(7200));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("ten").is_err());
        assert!(parse_duration("-5s").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn test_convert_enums() {
        assert_eq!(
            convert_mode(cli::Mode::Replay),
            workload::BenchmarkMode::Replay
        );
        assert_eq!(
            convert_length_source(cli::LengthSource::Trailing),
            workload::ValueLengthSource::Trailing
        );
        assert_eq!(convert_wait(cli::Wait::Block), workload::WaitStrategy::Block);
        assert_eq!(
            convert_key_order(cli::KeyWalk::Random),
            workload::KeyOrder::Random
        );
    }
}
