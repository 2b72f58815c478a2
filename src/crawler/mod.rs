//! Crawler module for source walking and item handling
//!
//! This module contains the core crawling logic, including:
//! - Fetching link lists through the scraping service
//! - Crawl-delay accounting per crawling node
//! - The per-source pagination state machine
//! - Storing and publishing discovered games
//! - The poll loop and its pause control

mod control;
mod fetcher;
mod politeness;
mod scheduler;
mod sink;
mod walker;

pub use control::PauseController;
pub use fetcher::{build_http_client, FetchError, LinkFetcher, ScrapedLink, ScraperClient};
pub use politeness::PolitenessClock;
pub use scheduler::{CrawlScheduler, TickSummary};
pub use sink::{normalize_name, ItemOutcome, ItemSink};
pub use walker::{SiteWalker, WalkOutcome, WalkerSettings};

use crate::config::Config;
use crate::queue::AmqpPublisher;
use crate::robots::RobotsGate;
use crate::storage::{open_storage, share};
use crate::Result;
use std::path::Path;
use std::sync::Arc;

/// Assembles a scheduler and its collaborators from configuration
///
/// This is the startup path of the crawl service. It will:
/// 1. Require the queue connection string
/// 2. Open the SQLite database
/// 3. Build the HTTP client shared by the scraper client and robots gate
/// 4. Wire the walker, item sink and pause control into a scheduler
///
/// No network connection is opened here; the queue connects on first publish.
///
/// # Arguments
///
/// * `config` - The validated configuration
///
/// # Returns
///
/// * `Ok(CrawlScheduler)` - Ready to [`run`](CrawlScheduler::run)
/// * `Err(CrawlError::Config)` - The queue connection is missing
/// * `Err(CrawlError)` - The database or HTTP client could not be set up
pub fn build_scheduler(config: &Config) -> Result<CrawlScheduler> {
    let connection = config.queue.require_connection()?;

    let storage = share(open_storage(Path::new(&config.storage.database_path))?);
    let client = build_http_client(&config.user_agent)?;

    let fetcher = Arc::new(ScraperClient::new(client.clone(), config.scraper.base_url()?));
    let publisher = Arc::new(AmqpPublisher::new(connection, config.queue.name.as_str()));
    let robots = RobotsGate::new(client, config.user_agent.crawler_name.as_str(), &config.robots);

    let control = PauseController::new();
    let walker = SiteWalker::new(
        storage.clone(),
        fetcher,
        robots,
        ItemSink::new(storage.clone(), publisher),
        control.clone(),
        WalkerSettings {
            node_identity: config.node.resolve_identity(),
            retry_delay: config.scheduler.retry_delay(),
            max_page_retries: config.scheduler.max_page_retries,
        },
    );

    Ok(CrawlScheduler::new(
        storage,
        walker,
        control,
        config.scheduler.poll_interval(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConfigError, CrawlError};
    use tempfile::TempDir;

    #[test]
    fn test_build_requires_queue_connection() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.database_path = dir.path().join("g.db").to_string_lossy().into_owned();

        let err = build_scheduler(&config).err().unwrap();
        assert!(matches!(
            err,
            CrawlError::Config(ConfigError::MissingSetting(_))
        ));
    }

    #[test]
    fn test_build_with_queue_connection() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.database_path = dir.path().join("g.db").to_string_lossy().into_owned();
        config.queue.connection = Some("amqp://localhost:5672/%2f".to_string());

        let scheduler = build_scheduler(&config).unwrap();
        assert!(!scheduler.control().is_paused());
        assert!(dir.path().join("g.db").exists());
    }
}
