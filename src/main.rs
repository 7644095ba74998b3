//! kvpulse CLI entry point

use anyhow::{Context, Result};
use kvpulse::bench;
use kvpulse::client::memcached::MemcachedClient;
use kvpulse::client::CacheClient;
use kvpulse::config::cli::Cli;
use kvpulse::config::toml::load_config;
use kvpulse::config::validator::validate_config;
use kvpulse::config::Config;
use kvpulse::harness::{Harness, HarnessConfig};
use kvpulse::output::csv::CsvWriter;
use kvpulse::output::json::{build_summary, local_hostname, write_json_output};
use kvpulse::output::text::print_results;
use kvpulse::stats::live::StatsReporter;
use std::io;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse_args();

    // Log level comes from the merged config
    let result = load_config(&cli).and_then(|config| {
        init_logging(config.runtime.log_level());
        run(&config)
    });

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()),
        )
        .try_init();
}

fn run(config: &Config) -> Result<()> {
    validate_config(config).context("Configuration validation failed")?;

    if config.runtime.dry_run {
        print!("{}", config);
        println!();
        println!("Dry run mode - configuration validated successfully");
        return Ok(());
    }

    let bench = bench::from_config(config)?;
    let clients = connect_clients(config)?;

    let mut reporter = StatsReporter::new(Box::new(io::stdout()));
    if let Some(ref path) = config.output.csv_output {
        reporter = reporter.with_csv(CsvWriter::create(path)?);
    }

    let harness = Harness::new(
        HarnessConfig::from_config(config)?,
        bench.as_ref(),
        clients,
        reporter,
    )?;
    let report = harness.start()?;

    print_results(&report).context("Failed to print run summary")?;

    if let Some(ref path) = config.output.json_output {
        let summary = build_summary(&report, config, local_hostname());
        write_json_output(path, &summary)?;
        info!(path = %path.display(), "wrote JSON summary");
    }

    Ok(())
}

/// Open one connection per worker
fn connect_clients(config: &Config) -> Result<Vec<Box<dyn CacheClient>>> {
    let address = config.server.address();
    let timeout = config.server.io_timeout();

    (0..config.workers.threads)
        .map(|id| {
            MemcachedClient::connect(&address, timeout)
                .map(|client| Box::new(client) as Box<dyn CacheClient>)
                .with_context(|| format!("Worker {} could not connect to {}", id, address))
        })
        .collect()
}
