//! Catalog Harvester main entry point
//!
//! This is the command-line interface for the catalog ingestion pipeline.

use anyhow::Context;
use catalog_harvester::config::{load_config_with_hash, validate, Config, RunOverrides};
use catalog_harvester::crawler::crawl;
use catalog_harvester::output::print_summary;
use catalog_harvester::state::StopHandle;
use clap::Parser;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Catalog Harvester: a polite, resumable catalog scraper
///
/// Walks every category of the catalog, extracts one record per book, and
/// appends them to a CSV file in periodic checkpoints. Re-run with
/// --resume to continue an interrupted harvest without refetching.
#[derive(Parser, Debug)]
#[command(name = "catalog-harvester")]
#[command(version)]
#[command(about = "A polite, resumable catalog scraper", long_about = None)]
struct Cli {
    /// Optional TOML configuration file; flags below override it
    #[arg(long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// CSV output path
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Delay before every request, in seconds
    #[arg(long, value_name = "SECONDS")]
    delay: Option<f64>,

    /// Retries per request after the first attempt
    #[arg(long)]
    retries: Option<u32>,

    /// Increase logging verbosity (-v, -vv, -vvv); -v also logs every item
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Stop after collecting this many new items
    #[arg(long)]
    limit: Option<usize>,

    /// Save the CSV every N new items
    #[arg(long, value_name = "N")]
    checkpoint_every: Option<usize>,

    /// Extend the existing CSV instead of rebuilding it
    #[arg(long)]
    resume: bool,

    /// Catalog home page carrying the category index
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Validate config and show what would be done without crawling
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    fn overrides(&self) -> RunOverrides {
        RunOverrides {
            output_path: self.output.clone(),
            delay_seconds: self.delay,
            retries: self.retries,
            verbose: self.verbose > 0,
            limit: self.limit,
            checkpoint_every: self.checkpoint_every,
            resume: self.resume,
            base_url: self.base_url.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref())?;

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };
    config.apply_overrides(cli.overrides());
    validate(&config).context("invalid configuration")?;

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let summary = handle_crawl(&config).await?;
    if !cli.quiet {
        print_summary(&summary);
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr, and additionally (without colors) to `log_file`.
fn setup_logging(verbose: u8, quiet: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_harvester=info,warn"),
            1 => EnvFilter::new("catalog_harvester=debug,info"),
            2 => EnvFilter::new("catalog_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    Ok(())
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Catalog Harvester Dry Run ===\n");

    println!("Run:");
    println!("  Output: {}", config.run.output_path.display());
    println!("  Delay: {}s", config.run.delay_seconds);
    println!("  Retries: {}", config.run.retries);
    println!("  Checkpoint every: {} items", config.run.checkpoint_every);
    match config.run.limit {
        Some(limit) => println!("  Limit: {} new items", limit),
        None => println!("  Limit: none"),
    }
    println!(
        "  Mode: {}",
        if config.run.resume {
            "resume existing dataset"
        } else {
            "rebuild dataset from empty"
        }
    );

    println!("\nSource:");
    println!("  Base URL: {}", config.source.base_url);
    println!("  User agent: {}", config.source.user_agent);
    println!("  Timeout: {}s", config.source.timeout_seconds);

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
///
/// The first Ctrl-C stops the run at the next item boundary after saving
/// progress; a second one exits immediately.
async fn handle_crawl(config: &Config) -> anyhow::Result<catalog_harvester::RunSummary> {
    if config.run.resume {
        tracing::info!("Starting harvest (resuming {})", config.run.output_path.display());
    } else {
        tracing::info!("Starting fresh harvest into {}", config.run.output_path.display());
    }

    let stop = StopHandle::new();
    let signal_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current item");
            signal_stop.stop();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::error!("Second interrupt, exiting without saving");
            std::process::exit(130);
        }
    });

    match crawl(config, stop).await {
        Ok(summary) => {
            tracing::info!("Harvest finished: {}", summary.state);
            Ok(summary)
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e).context("harvest failed")
        }
    }
}
