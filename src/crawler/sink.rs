//! Per-item storage and publication
//!
//! Each scraped link is stored as a game, read back, and published. Failures
//! stay with the item: they are logged and reported in the outcome, and the
//! caller moves on to the next link.

use crate::crawler::ScrapedLink;
use crate::queue::ItemPublisher;
use crate::storage::{lock, Game, SharedStorage, Source, StorageResult};
use std::sync::Arc;
use tracing::{debug, warn};

/// What happened to one scraped link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Stored and handed to the queue
    Published,
    /// Stored, but publishing failed
    StoredOnly,
    /// Not stored: blank name or storage failure
    Skipped,
}

/// Stores discovered games and publishes them
#[derive(Clone)]
pub struct ItemSink {
    storage: SharedStorage,
    publisher: Arc<dyn ItemPublisher>,
}

impl ItemSink {
    pub fn new(storage: SharedStorage, publisher: Arc<dyn ItemPublisher>) -> Self {
        Self { storage, publisher }
    }

    /// Handles one scraped link found on a page of `source`
    ///
    /// # Arguments
    ///
    /// * `item` - The scraped `{content, link}` pair
    /// * `source` - The source whose page listed it
    ///
    /// # Returns
    ///
    /// The [`ItemOutcome`]; errors are never returned
    pub async fn handle(&self, item: &ScrapedLink, source: &Source) -> ItemOutcome {
        let name = normalize_name(&item.content);
        if name.is_empty() {
            warn!(
                "Skipping link {} on source '{}': empty link text",
                item.link, source.name
            );
            return ItemOutcome::Skipped;
        }

        let game = match self.store(&name, &source.name, &item.link) {
            Ok(Some(game)) => game,
            Ok(None) => {
                warn!("Game '{}' vanished right after being stored", name);
                return ItemOutcome::Skipped;
            }
            Err(e) => {
                warn!("Failed to store game '{}' from '{}': {}", name, source.name, e);
                return ItemOutcome::Skipped;
            }
        };

        match self.publisher.publish(&game).await {
            Ok(()) => {
                debug!("Game '{}' stored and published", game.name);
                ItemOutcome::Published
            }
            Err(e) => {
                warn!("Failed to publish game '{}': {}", game.name, e);
                ItemOutcome::StoredOnly
            }
        }
    }

    /// Upserts the game and reads it back under one lock
    fn store(&self, name: &str, source_name: &str, link: &str) -> StorageResult<Option<Game>> {
        let mut storage = lock(&self.storage)?;
        storage.upsert_game(name, source_name, link)?;
        storage.find_game(name)
    }
}

/// Trims link text and collapses internal whitespace runs to one space
pub fn normalize_name(content: &str) -> String {
    content.split_whitespace().collect::<Vec<_>>().join(" ")
}
