//! Robots.txt caching implementation
//!
//! Cached entries expire after a configurable time-to-live so that changes
//! made by the site owner are eventually picked up.

use crate::robots::ParsedRobots;
use chrono::{DateTime, Duration, Utc};

/// Cached robots.txt data for an origin
#[derive(Debug, Clone)]
pub struct CachedRobots {
    /// The parsed robots.txt content
    pub content: ParsedRobots,

    /// When the robots.txt was fetched
    pub fetched_at: DateTime<Utc>,

    /// How long the entry stays fresh
    pub ttl: Duration,
}

impl CachedRobots {
    /// Creates a new CachedRobots stamped with the current time
    pub fn new(content: ParsedRobots, ttl: Duration) -> Self {
        Self {
            content,
            fetched_at: Utc::now(),
            ttl,
        }
    }

    /// Checks if the cached robots.txt is older than its TTL
    pub fn is_stale(&self) -> bool {
        self.age() > self.ttl
    }

    /// Returns the age of the cached robots.txt
    pub fn age(&self) -> Duration {
        Utc::now() - self.fetched_at
    }
}
