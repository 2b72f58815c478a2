//! Crawl-delay accounting across restarts and nodes
//!
//! The last fetch time of a source is stored per crawling node, so the wait
//! computed here survives process restarts and does not depend on what other
//! nodes are doing.

use crate::storage::Source;
use chrono::{DateTime, Utc};

/// Computes how long a node must wait before fetching from a source again
#[derive(Debug, Clone, Copy, Default)]
pub struct PolitenessClock;

impl PolitenessClock {
    pub fn new() -> Self {
        Self
    }

    /// Milliseconds to wait before the next fetch, measured from now
    ///
    /// # Arguments
    ///
    /// * `source` - The source about to be fetched
    /// * `node` - Identity of this crawling node
    /// * `crawl_delay_secs` - Required delay between fetches, in seconds
    pub fn wait_millis(&self, source: &Source, node: &str, crawl_delay_secs: f64) -> u64 {
        self.wait_millis_at(source, node, crawl_delay_secs, Utc::now())
    }

    /// Same as [`wait_millis`](Self::wait_millis) with an explicit current time
    ///
    /// # Returns
    ///
    /// * `0` - No poll recorded for `node`, or the delay has already elapsed
    /// * `(delay - elapsed) * 1000` - Otherwise, never more than the full delay
    pub fn wait_millis_at(
        &self,
        source: &Source,
        node: &str,
        crawl_delay_secs: f64,
        now: DateTime<Utc>,
    ) -> u64 {
        if !crawl_delay_secs.is_finite() || crawl_delay_secs <= 0.0 {
            return 0;
        }

        let Some(last_polled) = source.last_polled_by(node) else {
            return 0;
        };

        // clock skew can put last_polled in the future; count that as "just now"
        let elapsed_secs = ((now - last_polled).num_milliseconds() as f64 / 1000.0).max(0.0);
        if elapsed_secs >= crawl_delay_secs {
            return 0;
        }

        ((crawl_delay_secs - elapsed_secs) * 1000.0).round() as u64
    }
}
