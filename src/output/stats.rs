//! Statistics generation from the crawl database
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the storage layer.

use crate::storage::Storage;
use crate::Result;

/// Crawl progress of one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceProgress {
    pub name: String,

    /// Resume cursor, `None` when the source starts from its base URL
    pub current_page: Option<String>,

    /// Number of poll timestamps recorded, one per crawling node
    pub nodes: usize,
}

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Registered sources with their progress, by name
    pub sources: Vec<SourceProgress>,

    /// Total number of stored games
    pub total_games: u64,

    /// Games per source name, largest first
    pub games_by_source: Vec<(String, u64)>,
}

impl CrawlStatistics {
    /// Number of sources a previous walk stopped part-way through
    pub fn in_progress(&self) -> usize {
        self.sources
            .iter()
            .filter(|source| source.current_page.is_some())
            .count()
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(CrawlError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<CrawlStatistics> {
    let sources = storage
        .get_all_sources()?
        .into_iter()
        .map(|source| SourceProgress {
            nodes: source.last_polled.len(),
            name: source.name,
            current_page: source.current_page,
        })
        .collect();

    Ok(CrawlStatistics {
        sources,
        total_games: storage.count_games()?,
        games_by_source: storage.count_games_by_source()?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Registered sources: {}", stats.sources.len());
    println!("  Sources mid-walk: {}", stats.in_progress());
    println!("  Games stored: {}", stats.total_games);
    println!();

    if !stats.sources.is_empty() {
        println!("Sources:");
        for source in &stats.sources {
            println!(
                "  {}: {} ({} node(s) polled)",
                source.name,
                source.current_page.as_deref().unwrap_or("at start"),
                source.nodes
            );
        }
        println!();
    }

    if !stats.games_by_source.is_empty() {
        println!("Games by Source:");
        for (source, count) in &stats.games_by_source {
            let percentage = if stats.total_games > 0 {
                (*count as f64 / stats.total_games as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", source, count, percentage);
        }
    }
}
