//! Byline-Harvest main entry point
//!
//! This is the command-line interface for the Byline-Harvest article crawler.

use anyhow::Context;
use byline_harvest::config::{load_config_with_hash, Config};
use byline_harvest::crawler::{run_harvest, seed_urls, ShutdownHandle};
use byline_harvest::output::{load_statistics, print_report, print_statistics};
use byline_harvest::storage::RecordStore;
use byline_harvest::ArticlePattern;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Byline-Harvest: a section → article → author crawler
///
/// Byline-Harvest walks section listing pages, follows every article
/// link, and attaches each contributor's profile to the article's record.
/// Records are stored in a SQLite database.
#[derive(Parser, Debug)]
#[command(name = "byline-harvest")]
#[command(version)]
#[command(about = "A multi-stage article and author crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_harvest(&config, &config_hash).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("byline_harvest=info,warn"),
            1 => EnvFilter::new("byline_harvest=debug,info"),
            2 => EnvFilter::new("byline_harvest=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let pattern = ArticlePattern::for_host(&config.site.article_host)
        .context("Failed to build article pattern")?;
    let seeds = seed_urls(config);

    println!("=== Byline-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!(
        "  Max concurrent fetches: {}",
        config.crawler.max_concurrent_fetches
    );
    println!(
        "  Request timeout: {}s",
        config.crawler.request_timeout_secs
    );
    println!(
        "  Retries: {} (every {}ms)",
        config.crawler.max_retries, config.crawler.retry_delay_ms
    );

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Flush every: {} records", config.output.flush_every);

    println!("\nArticle pattern:");
    println!("  {}", pattern.as_str());

    println!("\nSeeds ({}):", seeds.len());
    for seed in &seeds {
        println!("  - {}", seed);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would start harvesting from {} listing pages", seeds.len());

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let store = RecordStore::open(Path::new(&config.output.database_path))
        .context("Failed to open database")?;
    let stats = load_statistics(&store).context("Failed to load statistics")?;

    print_statistics(&stats);
    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: &Config, config_hash: &str) -> anyhow::Result<()> {
    tracing::info!(
        "Harvesting {} seeds for {}",
        config.site.seeds.len(),
        config.site.article_host
    );

    let shutdown = ShutdownHandle::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, draining in-flight fetches");
            on_signal.request();
        }
    });

    let report = run_harvest(config, config_hash, shutdown)
        .await
        .context("Harvest failed")?;

    print_report(&report);
    Ok(())
}
