//! Human-readable run summary

use crate::harness::RunReport;
use crate::stats::histogram::LatencyHistogram;
use crate::util::time::{calculate_rate, format_latency, format_req_rate, percent};
use std::io::{self, Write};

/// Print the run summary to stdout
pub fn print_results(report: &RunReport) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_results(&mut out, report)
}

/// Write the run summary to `out`
///
/// Covers elapsed time, request totals with average rates, the GET miss ratio,
/// SET failures and GET/SET latency percentiles.
pub fn write_results(out: &mut dyn Write, report: &RunReport) -> io::Result<()> {
    let totals = &report.totals;
    let secs = report.elapsed.as_secs_f64();

    writeln!(out)?;
    writeln!(out, "═══════════════════════════════════════════════════════════")?;
    writeln!(out, "                    RUN SUMMARY")?;
    writeln!(out, "═══════════════════════════════════════════════════════════")?;
    writeln!(out)?;

    writeln!(out, "Benchmark:    {}", report.benchmark)?;
    writeln!(out, "Threads:      {}", report.threads)?;
    writeln!(
        out,
        "Elapsed Time: {:.3}s{}",
        secs,
        if report.completed { " (workload exhausted)" } else { "" }
    )?;
    writeln!(out)?;

    writeln!(out, "Requests:")?;
    writeln!(
        out,
        "  GET: {} attempts, {} failures - {} req/s",
        totals.get_attempts,
        totals.get_failures,
        format_req_rate(calculate_rate(totals.get_attempts, secs))
    )?;
    writeln!(
        out,
        "  SET: {} attempts, {} failures - {} req/s",
        totals.set_attempts,
        totals.set_failures,
        format_req_rate(calculate_rate(totals.set_attempts, secs))
    )?;
    writeln!(
        out,
        "  OK GETs: {} - {} req/s",
        totals.ok_gets(),
        format_req_rate(calculate_rate(totals.ok_gets(), secs))
    )?;
    writeln!(
        out,
        "  Miss ratio: {:.2}%",
        percent(totals.get_failures, totals.get_attempts)
    )?;

    if let Some(producer) = report.producer {
        writeln!(out)?;
        writeln!(out, "Workload:")?;
        writeln!(out, "  Lines:    {}", producer.lines)?;
        writeln!(out, "  Enqueued: {}", producer.enqueued)?;
        writeln!(out, "  Skipped:  {}", producer.skipped)?;
    }

    writeln!(out)?;
    writeln!(out, "Latency:")?;
    write_latency(out, "GET", &report.get_latency)?;
    write_latency(out, "SET", &report.set_latency)?;

    writeln!(out, "═══════════════════════════════════════════════════════════")?;
    Ok(())
}

fn write_latency(out: &mut dyn Write, label: &str, hist: &LatencyHistogram) -> io::Result<()> {
    let (Some(mean), Some(max)) = (hist.mean(), hist.max()) else {
        return writeln!(out, "  {}: no samples", label);
    };

    writeln!(
        out,
        "  {}: mean {}, max {} ({} samples)",
        label,
        format_latency(mean),
        format_latency(max),
        hist.len()
    )?;
    for &p in &[50.0, 90.0, 99.0, 99.9] {
        if let Some(value) = hist.percentile(p) {
            writeln!(out, "    p{:<5}: {}", p, format_latency(value))?;
        }
    }
    Ok(())
}
