//! Catalog-Harvester main entry point
//!
//! This is the command-line interface for the Catalog-Harvester dataset scraper.

use anyhow::{Context, Result};
use catalog_harvester::config::{hash_config_text, load_config_with_hash, validate, Config};
use catalog_harvester::crawler::harvest;
use catalog_harvester::storage::{open_storage, Storage};
use catalog_harvester::{FailurePolicy, MetadataField};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Catalog-Harvester: an open data catalog scraper
///
/// Crawls every section of the catalog, reads the metadata of each dataset
/// from its detail page, and stores it in SQLite keyed by detail page URL.
/// Re-running refreshes existing rows instead of duplicating them.
#[derive(Parser, Debug)]
#[command(name = "catalog-harvester")]
#[command(version)]
#[command(about = "An open data catalog scraper", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (built-in defaults when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Database file, overriding the configuration
    #[arg(long, value_name = "PATH")]
    database: Option<PathBuf>,

    /// Skip failed sections and datasets instead of aborting the crawl
    #[arg(long)]
    collect_failures: bool,

    /// Validate config and print the effective settings without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show what the database holds and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let (mut config, config_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            (Config::default(), hash_config_text(""))
        }
    };
    tracing::debug!("Configuration hash: {}", config_hash);

    if let Some(database) = &cli.database {
        config.output.database_path = database.display().to_string();
    }
    if cli.collect_failures {
        config.crawler.failure_policy = FailurePolicy::Collect;
    }
    validate(&config).context("invalid configuration")?;

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_harvest(config, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
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

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: prints the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Catalog-Harvester Dry Run ===\n");

    println!("Site:");
    println!("  Index: {}", config.site.base_url);
    println!("  Next page label: {}", config.site.next_label);
    println!("  Warning marker: {}", config.site.warning_marker);
    println!("  Suppression parameter: {}", config.site.suppress_param);

    println!("\nCrawler Configuration:");
    println!("  Requests in flight: {}", config.crawler.concurrency_limit);
    println!("  Attempts per URL: {}", config.crawler.max_attempts);
    println!("  Cooldown: {}ms", config.crawler.cooldown_ms);
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    println!("  Failure policy: {:?}", config.crawler.failure_policy);
    println!("  Identifiers: {:?}", config.crawler.identifier);

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nLabels:");
    for (field, label) in config.labels.table() {
        println!("  {:<28} {}", field.column(), label);
    }

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows what the database holds
fn handle_stats(config: &Config) -> Result<()> {
    let path = Path::new(&config.output.database_path);
    println!("Database: {}\n", path.display());

    let storage = open_storage(path).context("failed to open database")?;

    println!("Datasets stored: {}", storage.count_records()?);

    match storage.get_latest_run()? {
        Some(run) => {
            println!("\nLatest run #{}:", run.id);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            if let Some(expected) = run.expected_count {
                println!("  Advertised: {}", expected);
            }
            if let Some(persisted) = run.persisted_count {
                println!("  Stored after run: {}", persisted);
            }
            if let Some(failed) = run.failed_items {
                println!("  Skipped items: {}", failed);
            }
            if let Some(error) = &run.error_message {
                println!("  Error: {}", error);
            }
        }
        None => println!("\nNo runs recorded yet"),
    }

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config, config_hash: &str) -> Result<()> {
    tracing::info!(
        "Harvesting {} ({} metadata fields per dataset)",
        config.site.base_url,
        MetadataField::COUNT
    );

    let report = harvest(config, config_hash)
        .await
        .context("harvest failed")?;

    tracing::info!(
        "Run {} finished: {} scraped, {} stored",
        report.run_id,
        report.scraped,
        report.persisted
    );
    for failure in &report.failures {
        tracing::warn!("Skipped {} {}: {}", failure.stage, failure.target, failure.error);
    }

    Ok(())
}
