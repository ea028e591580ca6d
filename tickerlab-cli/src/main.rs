//! TickerLab CLI: enrichment, ticker lists, archival and history commands.
//!
//! Commands:
//! - `enrich`: add derived score columns to every raw snapshot in the inbox
//! - `lists`: build the dated ticker lists from the latest enriched snapshot
//! - `archive`: move consumed files to their archive directories
//! - `history`: refresh monthly history and rank trailing 12-month windows
//! - `run`: enrich, lists and archive in sequence

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tickerlab_core::data::{run_history, CircuitBreaker, YahooProvider};
use tickerlab_core::{archive, enrich_directory, generate_lists, EnrichError, PipelineConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "tickerlab",
    about = "TickerLab: screener snapshot enrichment and ticker list generation"
)]
struct Cli {
    /// TOML file overriding the default directories and limits.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enrich raw snapshots waiting in the inbox.
    Enrich,
    /// Write the unified, threshold and worst ticker lists.
    Lists {
        /// Date stamped into the list file names (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<String>,
    },
    /// Move processed files to their archive directories.
    Archive,
    /// Fetch monthly history and write the top performers per 12-month window.
    History {
        /// Tickers to fetch (e.g. NASDAQ:AAPL). Defaults to the latest snapshot in the history directory.
        tickers: Vec<String>,

        /// Fetch even if the store was already refreshed today.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Enrich, build lists and archive.
    Run,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json);

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Enrich => run_enrich(&config),
        Commands::Lists { date } => run_lists(&config, date.as_deref()),
        Commands::Archive => run_archive(&config),
        Commands::History { tickers, force } => run_history_cmd(&config, tickers, force),
        Commands::Run => run_pipeline(&config),
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn run_enrich(config: &PipelineConfig) -> Result<()> {
    let report = enrich_directory(config).context("enrichment failed")?;
    for (path, reason) in &report.failed {
        eprintln!("Failed: {}: {reason}", path.display());
    }
    println!(
        "Enriched {} file(s), {} already enriched, {} failed",
        report.written.len(),
        report.already_enriched.len(),
        report.failed.len()
    );
    if report.processed() == 0 {
        bail!("no snapshot could be enriched");
    }
    Ok(())
}

fn run_lists(config: &PipelineConfig, date: Option<&str>) -> Result<()> {
    let date = date
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()
        .context("--date must be YYYY-MM-DD")?
        .unwrap_or_else(today);

    let report = generate_lists(config, date).context("list generation failed")?;
    println!("Source: {}", report.source.display());
    for path in [&report.unified, &report.threshold, &report.worst] {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn run_archive(config: &PipelineConfig) -> Result<()> {
    let report = archive(config).context("archival failed")?;
    println!("Moved {} file(s)", report.moved.len());
    for path in &report.conflicts {
        println!("Left in place (destination exists): {}", path.display());
    }
    Ok(())
}

fn run_history_cmd(config: &PipelineConfig, tickers: Vec<String>, force: bool) -> Result<()> {
    let breaker = Arc::new(CircuitBreaker::with_cooldown_secs(config.history.cooldown_secs));
    let provider = YahooProvider::new(breaker, config.history.max_retries)?;
    let tickers = (!tickers.is_empty()).then_some(tickers);

    let report = run_history(config, &provider, tickers, today(), force)
        .context("history retrieval failed")?;

    let summary = &report.summary;
    if !summary.all_succeeded() {
        for (ticker, err) in &summary.errors {
            eprintln!("Error for {ticker}: {err}");
        }
    }
    if summary.up_to_date {
        println!("History already up to date");
    } else {
        println!(
            "History: {}/{} succeeded, {} failed",
            summary.succeeded, summary.total, summary.failed
        );
    }
    println!("Top performers: {}", report.performers.display());

    if !summary.up_to_date && summary.succeeded == 0 && summary.total > 0 {
        bail!("no ticker history could be fetched");
    }
    Ok(())
}

fn run_pipeline(config: &PipelineConfig) -> Result<()> {
    match enrich_directory(config) {
        Ok(report) => info!(
            written = report.written.len(),
            already_enriched = report.already_enriched.len(),
            failed = report.failed.len(),
            "enrichment done"
        ),
        Err(EnrichError::NoInput { dir, .. }) => {
            warn!(dir = %dir.display(), "no new snapshots, ranking existing enriched files");
        }
        Err(e) => return Err(e).context("enrichment failed"),
    }

    run_lists(config, None)?;
    run_archive(config)
}
