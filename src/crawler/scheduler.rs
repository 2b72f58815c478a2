//! Poll loop over all registered sources
//!
//! This module handles:
//! - One tick: a sequential walk over every registered source
//! - Isolating per-source failures so one bad source never stalls a tick
//! - Waiting between ticks, or until resumed while paused

use crate::crawler::{PauseController, SiteWalker, WalkOutcome};
use crate::storage::{lock, SharedStorage};
use crate::{CrawlError, Result};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Counts of how each source ended during one tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Sources registered when the tick started
    pub sources: usize,
    pub completed: usize,
    pub paused: usize,
    pub gave_up: usize,
    /// Walks that ended in an error, robots.txt refusals included
    pub failed: usize,
    /// Sources not started because the crawl was paused
    pub skipped: usize,
}

/// Runs a [`SiteWalker`] over every source once per poll interval
pub struct CrawlScheduler {
    storage: SharedStorage,
    walker: SiteWalker,
    control: PauseController,
    interval: Duration,
}

impl CrawlScheduler {
    /// Creates a scheduler
    ///
    /// # Arguments
    ///
    /// * `storage` - Source registry
    /// * `walker` - Walker sharing the same `control`
    /// * `control` - Pause flag observed between sources and ticks
    /// * `interval` - Wait between the end of a tick and the next one
    pub fn new(
        storage: SharedStorage,
        walker: SiteWalker,
        control: PauseController,
        interval: Duration,
    ) -> Self {
        Self {
            storage,
            walker,
            control,
            interval,
        }
    }

    /// Returns a handle to the pause flag
    pub fn control(&self) -> PauseController {
        self.control.clone()
    }

    pub fn storage(&self) -> SharedStorage {
        self.storage.clone()
    }

    /// Walks every registered source once, in name order
    ///
    /// Sources are not started once the crawl is paused. Errors of a single
    /// source are logged and counted; only failing to list the sources fails
    /// the tick.
    pub async fn tick(&mut self) -> Result<TickSummary> {
        let names: Vec<String> = lock(&self.storage)?
            .get_all_sources()?
            .into_iter()
            .map(|source| source.name)
            .collect();

        let mut summary = TickSummary {
            sources: names.len(),
            ..Default::default()
        };

        for name in names {
            if self.control.is_paused() {
                summary.skipped += 1;
                continue;
            }

            match self.walker.walk(&name).await {
                Ok(WalkOutcome::Complete { .. }) => summary.completed += 1,
                Ok(WalkOutcome::Paused { .. }) => summary.paused += 1,
                Ok(WalkOutcome::GaveUp { page }) => {
                    warn!(
                        "Source '{}' stopped at {} after repeated failures",
                        name,
                        page.as_deref().unwrap_or("its start page")
                    );
                    summary.gave_up += 1;
                }
                Err(CrawlError::RobotsDenied { url }) => {
                    warn!("Source '{}' skipped: robots.txt disallows {}", name, url);
                    summary.failed += 1;
                }
                Err(e) => {
                    error!("Source '{}' failed: {}", name, e);
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Ticks until shut down
    ///
    /// While paused no tick starts; [`PauseController::resume`] starts one
    /// immediately instead of waiting for the interval.
    pub async fn run(&mut self) -> Result<()> {
        info!("Scheduler started, polling every {}s", self.interval.as_secs());

        loop {
            if self.control.is_stopping() {
                break;
            }

            if self.control.is_paused() {
                info!("Crawl paused, waiting for resume");
                self.control.woken().await;
                continue;
            }

            match self.tick().await {
                Ok(summary) => info!(
                    "Tick done: {} sources, {} complete, {} paused, {} gave up, {} failed, {} skipped",
                    summary.sources,
                    summary.completed,
                    summary.paused,
                    summary.gave_up,
                    summary.failed,
                    summary.skipped
                ),
                Err(e) => error!("Tick failed: {}", e),
            }

            if self.control.is_paused() {
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.control.woken() => debug!("Woken before the poll interval elapsed"),
            }
        }

        info!("Scheduler stopped");
        Ok(())
    }
}
