//! Per-origin robots.txt gate
//!
//! The gate fetches robots.txt once per origin, caches the result, and answers
//! allow/deny and crawl-delay questions for URLs on that origin.

use crate::config::RobotsConfig;
use crate::robots::{CachedRobots, ParsedRobots, RobotsVerdict};
use crate::url::{origin_key, robots_url};
use chrono::Duration;
use reqwest::Client;
use std::collections::HashMap;
use tracing::{debug, warn};
use url::Url;

/// Origins whose robots.txt could not be fetched are retried after this long
const UNAVAILABLE_TTL_HOURS: i64 = 1;

/// Upper bound on the configured TTL (one year)
const MAX_TTL_HOURS: u64 = 24 * 365;

/// Answers robots.txt questions for one crawler identity
pub struct RobotsGate {
    client: Client,

    /// Product token matched against User-agent lines
    agent: String,

    /// Whether URLs no rule speaks about are denied
    deny_on_neutral: bool,

    ttl: Duration,

    cache: HashMap<String, CachedRobots>,
}

impl RobotsGate {
    /// Creates a gate using the configured neutral policy and cache TTL
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client used for robots.txt requests
    /// * `agent` - The crawler's robots.txt product token
    /// * `config` - Robots policy settings
    pub fn new(client: Client, agent: impl Into<String>, config: &RobotsConfig) -> Self {
        Self::with_policy(
            client,
            agent,
            config.deny_on_neutral,
            Duration::hours(config.cache_ttl_hours.min(MAX_TTL_HOURS) as i64),
        )
    }

    /// Creates a gate with an explicit policy
    pub fn with_policy(
        client: Client,
        agent: impl Into<String>,
        deny_on_neutral: bool,
        ttl: Duration,
    ) -> Self {
        Self {
            client,
            agent: agent.into(),
            deny_on_neutral,
            ttl,
            cache: HashMap::new(),
        }
    }

    /// Makes sure robots.txt for the URL's origin is loaded
    ///
    /// Does nothing when a fresh cache entry exists. Fetch failures never
    /// surface as errors; the origin is recorded as having no robots.txt.
    pub async fn prepare(&mut self, url: &Url) {
        let key = origin_key(url);
        if let Some(cached) = self.cache.get(&key) {
            if !cached.is_stale() {
                debug!("robots.txt for {} already cached", key);
                return;
            }
        }

        let robots = self.fetch(url).await;
        let ttl = if robots.is_available() {
            self.ttl
        } else {
            self.ttl.min(Duration::hours(UNAVAILABLE_TTL_HOURS))
        };
        self.cache.insert(key, CachedRobots::new(robots, ttl));
    }

    async fn fetch(&self, url: &Url) -> ParsedRobots {
        let target = match robots_url(url) {
            Ok(target) => target,
            Err(e) => {
                warn!("Cannot derive robots.txt location from {}: {}", url, e);
                return ParsedRobots::unavailable();
            }
        };

        debug!("Fetching {}", target);
        match self.client.get(target.clone()).send().await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(body) => ParsedRobots::from_content(&body),
                Err(e) => {
                    warn!("Failed to read {}: {}", target, e);
                    ParsedRobots::unavailable()
                }
            },
            Ok(response) => {
                debug!("{} returned {}", target, response.status());
                ParsedRobots::unavailable()
            }
            Err(e) => {
                warn!("Failed to fetch {}: {}", target, e);
                ParsedRobots::unavailable()
            }
        }
    }

    /// Returns the raw verdict for a URL
    ///
    /// Origins that were never prepared are neutral.
    pub fn verdict(&self, url: &Url) -> RobotsVerdict {
        match self.cache.get(&origin_key(url)) {
            Some(cached) => cached.content.verdict(url.as_str(), &self.agent),
            None => RobotsVerdict::Neutral,
        }
    }

    /// Checks whether the crawler may fetch a URL
    ///
    /// # Returns
    ///
    /// * `true` - An Allow rule matched, or nothing matched and the neutral
    ///   policy permits crawling
    /// * `false` - A Disallow rule matched, or nothing matched and the
    ///   neutral policy denies crawling
    pub fn is_allowed(&self, url: &Url) -> bool {
        match self.verdict(url) {
            RobotsVerdict::Allowed => true,
            RobotsVerdict::Disallowed => false,
            RobotsVerdict::Neutral => !self.deny_on_neutral,
        }
    }

    /// Returns the Crawl-delay in seconds for the URL's origin, 0 if none
    pub fn crawl_delay_seconds(&self, url: &Url) -> f64 {
        self.cache
            .get(&origin_key(url))
            .and_then(|cached| cached.content.crawl_delay(&self.agent))
            .unwrap_or(0.0)
    }

    /// Returns the robots.txt product token
    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// Number of origins with a cached robots.txt
    pub fn cached_origins(&self) -> usize {
        self.cache.len()
    }
}
