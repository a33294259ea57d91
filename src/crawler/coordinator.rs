//! Harvest coordinator - wires configuration to a running frontier
//!
//! This module builds everything a crawl needs from a validated
//! configuration:
//! - The article link pattern for the configured host
//! - Compiled stage handlers
//! - The HTTP fetcher and the SQLite sink
//! - Normalized seed URLs

use crate::config::Config;
use crate::crawler::fetcher::HttpFetcher;
use crate::crawler::frontier::Frontier;
use crate::crawler::handlers::StageHandlers;
use crate::crawler::shutdown::ShutdownHandle;
use crate::output::CrawlReport;
use crate::storage::SqliteSink;
use crate::url::{normalize_url, ArticlePattern};
use crate::HarvestError;
use std::sync::Arc;
use url::Url;

/// Normalizes the configured seeds, skipping ones that fail
pub fn seed_urls(config: &Config) -> Vec<Url> {
    let mut seeds = Vec::with_capacity(config.site.seeds.len());
    for seed in &config.site.seeds {
        match normalize_url(seed) {
            Ok(url) => {
                if !seeds.contains(&url) {
                    seeds.push(url);
                }
            }
            Err(e) => tracing::warn!("Skipping seed {}: {}", seed, e),
        }
    }
    seeds
}

/// Runs a full harvest as configured
///
/// # Arguments
///
/// * `config` - Validated configuration
/// * `config_hash` - Fingerprint stored with the run
/// * `shutdown` - Flag that stops the crawl early when set
///
/// # Returns
///
/// * `Ok(CrawlReport)` - The run finished or drained after shutdown
/// * `Err(HarvestError)` - Setup failed before crawling began
pub async fn run_harvest(
    config: &Config,
    config_hash: &str,
    shutdown: ShutdownHandle,
) -> Result<CrawlReport, HarvestError> {
    let pattern = ArticlePattern::for_host(&config.site.article_host)?;
    tracing::debug!("Article pattern: {}", pattern.as_str());

    let handlers = StageHandlers::new(pattern)?;
    let fetcher = Arc::new(HttpFetcher::from_config(config)?);
    let sink = SqliteSink::new(
        &config.output.database_path,
        config_hash,
        config.output.flush_every,
    );

    let seeds = seed_urls(config);
    let frontier = Frontier::new(
        fetcher,
        handlers,
        sink,
        config.crawler.max_concurrent_fetches as usize,
    )
    .with_shutdown(shutdown);

    let (report, _sink) = frontier.run(seeds).await?;
    Ok(report)
}
