use serde::Deserialize;

/// Section pages crawled when `[site].seeds` is left out
pub const DEFAULT_SEEDS: &[&str] = &[
    "https://www.forbes.com/money/",
    "https://www.forbes.com/leadership/",
    "https://www.forbes.com/worlds-billionaires/",
    "https://www.forbes.com/business/",
    "https://www.forbes.com/small-business/",
    "https://www.forbes.com/lifestyle/",
    "https://www.forbes.com/real-estate/",
];

/// Main configuration structure for Byline-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub site: SiteConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of fetches in flight at once
    #[serde(rename = "max-concurrent-fetches")]
    pub max_concurrent_fetches: u32,

    /// Whole-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Retries for 5xx responses and timeouts
    #[serde(rename = "max-retries", default)]
    pub max_retries: u32,

    /// Delay between retry attempts (milliseconds)
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_retry_delay() -> u64 {
    500
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Target site configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Host (optionally with port) that article URLs must live on
    #[serde(rename = "article-host")]
    pub article_host: String,

    /// Section listing pages the crawl starts from
    #[serde(default = "default_seeds")]
    pub seeds: Vec<String>,
}

fn default_seeds() -> Vec<String> {
    DEFAULT_SEEDS.iter().map(|s| s.to_string()).collect()
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Records buffered before a write transaction
    #[serde(rename = "flush-every", default = "default_flush_every")]
    pub flush_every: usize,
}

fn default_flush_every() -> usize {
    32
}
