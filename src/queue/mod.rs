//! Queue publishing for discovered games
//!
//! Games are published as camelCase JSON onto a named queue. Publishing is
//! best-effort: a failure is reported to the caller, which logs it and moves
//! on, and nothing is retried.

mod amqp;

pub use amqp::AmqpPublisher;

use crate::storage::Game;
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while publishing
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("Failed to serialize game: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Queue channel unavailable: {0}")]
    ChannelUnavailable(String),
}

/// Destination for discovered games
#[async_trait]
pub trait ItemPublisher: Send + Sync {
    /// Publishes one game; success does not imply broker confirmation
    async fn publish(&self, game: &Game) -> Result<(), PublishError>;

    /// Verifies the queue is reachable, for status reporting
    async fn check(&self) -> Result<(), PublishError>;
}

/// Serializes a game into the wire payload
pub fn encode_game(game: &Game) -> Result<Vec<u8>, PublishError> {
    Ok(serde_json::to_vec(game)?)
}
