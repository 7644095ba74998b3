//! Latency and request-rate formatting for the run summary

use std::time::Duration;

/// Format a request latency
///
/// Cache round trips sit in the microsecond range, so anything under a
/// millisecond is shown in microseconds with one decimal. Slower requests
/// switch to milliseconds, and stalls of a second or more to seconds.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use kvpulse::util::time::format_latency;
///
/// assert_eq!(format_latency(Duration::from_nanos(87_340)), "87.3us");
/// assert_eq!(format_latency(Duration::from_micros(2500)), "2.50ms");
/// assert_eq!(format_latency(Duration::from_secs(3)), "3.00s");
/// ```
pub fn format_latency(latency: Duration) -> String {
    let micros = latency.as_nanos() as f64 / 1_000.0;

    if micros < 1_000.0 {
        format!("{:.1}us", micros)
    } else if micros < 1_000_000.0 {
        format!("{:.2}ms", micros / 1_000.0)
    } else {
        format!("{:.2}s", micros / 1_000_000.0)
    }
}

/// Format a request rate in requests per second
///
/// Rates below 10 000 req/s print as whole numbers; above that the `K` and
/// `M` suffixes keep the column short.
///
/// ```
/// use kvpulse::util::time::format_req_rate;
///
/// assert_eq!(format_req_rate(375.0), "375");
/// assert_eq!(format_req_rate(48_260.0), "48.3K");
/// assert_eq!(format_req_rate(1_500_000.0), "1.50M");
/// ```
pub fn format_req_rate(rate: f64) -> String {
    if rate < 10_000.0 {
        format!("{:.0}", rate)
    } else if rate < 1_000_000.0 {
        format!("{:.1}K", rate / 1_000.0)
    } else {
        format!("{:.2}M", rate / 1_000_000.0)
    }
}

/// Requests per second over `seconds`, or 0 for a non-positive interval
pub fn calculate_rate(requests: u64, seconds: f64) -> f64 {
    if seconds > 0.0 {
        requests as f64 / seconds
    } else {
        0.0
    }
}

/// Percentage of `part` in `whole`, or 0 when `whole` is 0
pub fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_latency_units() {
        // Sub-microsecond samples (in-memory cache) stay in microseconds
        assert_eq!(format_latency(Duration::from_nanos(400)), "0.4us");
        assert_eq!(format_latency(Duration::from_micros(120)), "120.0us");
        assert_eq!(format_latency(Duration::from_nanos(999_900)), "999.9us");
        assert_eq!(format_latency(Duration::from_micros(1_000)), "1.00ms");
        assert_eq!(format_latency(Duration::from_millis(1500)), "1.50s");
    }

    #[test]
    fn test_format_req_rate() {
        assert_eq!(format_req_rate(0.0), "0");
        assert_eq!(format_req_rate(9_999.0), "9999");
        assert_eq!(format_req_rate(10_000.0), "10.0K");
        assert_eq!(format_req_rate(250_000.0), "250.0K");
        assert_eq!(format_req_rate(2_000_000.0), "2.00M");
    }

    #[test]
    fn test_calculate_rate() {
        assert_eq!(calculate_rate(1000, 10.0), 100.0);
        assert_eq!(calculate_rate(1000, 0.0), 0.0);
        assert_eq!(calculate_rate(1000, -1.0), 0.0);
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(1, 4), 25.0);
        assert_eq!(percent(5, 0), 0.0);
    }
}
