use crate::ConfigError;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Main configuration structure for GameScout
///
/// Every section is optional; missing sections and keys fall back to the
/// defaults documented on each field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub robots: RobotsConfig,
    #[serde(default, rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub node: NodeConfig,
}

/// Location of the external link-scraping service
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    /// Host name of the scraping service (default `localhost`)
    #[serde(default = "default_scraper_host")]
    pub host: String,

    /// Port of the scraping service (default `3002`)
    #[serde(default = "default_scraper_port")]
    pub port: u16,
}

impl ScraperConfig {
    /// Returns the API base URL, `http://{host}:{port}/api/`
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let raw = format!("http://{}:{}/api/", self.host, self.port);
        Url::parse(&raw)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid scraper address '{}': {}", raw, e)))
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            host: default_scraper_host(),
            port: default_scraper_port(),
        }
    }
}

/// Message queue configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// AMQP connection string; required to run the crawler
    #[serde(default)]
    pub connection: Option<String>,

    /// Queue that discovered games are published to (default `games`)
    #[serde(default = "default_queue_name")]
    pub name: String,
}

impl QueueConfig {
    /// Returns the connection string or the startup error for its absence
    pub fn require_connection(&self) -> Result<&str, ConfigError> {
        match self.connection.as_deref() {
            Some(conn) if !conn.trim().is_empty() => Ok(conn),
            _ => Err(ConfigError::MissingSetting(
                "queue.connection (or RABBITMQ_PUBSUB_CONNECTION) must be set to the queue connection string"
                    .to_string(),
            )),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            connection: None,
            name: default_queue_name(),
        }
    }
}

/// Poll loop and retry behavior
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between the end of one tick and the start of the next (default 60)
    #[serde(rename = "poll-interval-secs", default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Delay before retrying a failed page fetch, in milliseconds (default 5000)
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    /// Maximum retries of one page per walk; unset retries forever
    #[serde(rename = "max-page-retries", default)]
    pub max_page_retries: Option<u32>,
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            retry_delay_ms: default_retry_delay(),
            max_page_retries: None,
        }
    }
}

/// Robots.txt policy
#[derive(Debug, Clone, Deserialize)]
pub struct RobotsConfig {
    /// Treat URLs no rule speaks about as disallowed (default true)
    #[serde(rename = "deny-on-neutral", default = "default_true")]
    pub deny_on_neutral: bool,

    /// Hours a fetched robots.txt stays cached per origin (default 24)
    #[serde(rename = "cache-ttl-hours", default = "default_robots_ttl")]
    pub cache_ttl_hours: u64,
}

impl Default for RobotsConfig {
    fn default() -> Self {
        Self {
            deny_on_neutral: true,
            cache_ttl_hours: default_robots_ttl(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler, also the robots.txt product token
    #[serde(rename = "crawler-name", default = "default_crawler_name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version", default = "default_crawler_version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url", default)]
    pub contact_url: Option<String>,
}

impl UserAgentConfig {
    /// Formats the HTTP `User-Agent` header value
    ///
    /// Format: `CrawlerName/Version` or `CrawlerName/Version (+ContactURL)`.
    pub fn header_value(&self) -> String {
        match &self.contact_url {
            Some(contact) => format!(
                "{}/{} (+{})",
                self.crawler_name, self.crawler_version, contact
            ),
            None => format!("{}/{}", self.crawler_name, self.crawler_version),
        }
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: default_crawler_name(),
            crawler_version: default_crawler_version(),
            contact_url: None,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Identity of this crawling node
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeConfig {
    /// Key under which this node records its poll timestamps
    #[serde(default)]
    pub identity: Option<String>,
}

impl NodeConfig {
    /// Returns the configured identity, or this machine's host name
    pub fn resolve_identity(&self) -> String {
        if let Some(identity) = self.identity.as_ref().filter(|i| !i.trim().is_empty()) {
            return identity.clone();
        }

        hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "localhost".to_string())
    }
}

fn default_scraper_host() -> String {
    "localhost".to_string()
}

fn default_scraper_port() -> u16 {
    3002
}

fn default_queue_name() -> String {
    "games".to_string()
}

fn default_poll_interval() -> u64 {
    60
}

fn default_retry_delay() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

fn default_robots_ttl() -> u64 {
    24
}

fn default_crawler_name() -> String {
    "GameScout".to_string()
}

fn default_crawler_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_database_path() -> String {
    "./gamescout.db".to_string()
}
