//! Connectivity and pause status report

use crate::queue::ItemPublisher;
use crate::storage::{lock, SharedStorage};
use std::fmt;

/// Health of one dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Health {
    Ok,
    Failed(String),
}

impl Health {
    pub fn is_ok(&self) -> bool {
        matches!(self, Health::Ok)
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Health::Ok => write!(f, "OK"),
            Health::Failed(reason) => write!(f, "FAILED ({})", reason),
        }
    }
}

/// Whether storage and queue are reachable and whether crawling is paused
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub storage: Health,
    pub queue: Health,
    /// Pause flag of the local scheduler; `None` when none runs in this process
    pub paused: Option<bool>,
}

impl StatusReport {
    /// True if both storage and queue are reachable
    pub fn healthy(&self) -> bool {
        self.storage.is_ok() && self.queue.is_ok()
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let poller = match self.paused {
            Some(true) => "Paused",
            Some(false) => "Active",
            None => "not running in this process",
        };
        writeln!(f, "Poller:   {}", poller)?;
        writeln!(f, "Storage:  {}", self.storage)?;
        write!(f, "Queue:    {}", self.queue)
    }
}

/// Probes storage and queue connectivity
///
/// # Arguments
///
/// * `storage` - The shared storage handle
/// * `publisher` - The queue publisher
/// * `paused` - Current value of the pause flag, if a scheduler runs here
pub async fn check_status(
    storage: &SharedStorage,
    publisher: &dyn ItemPublisher,
    paused: Option<bool>,
) -> StatusReport {
    let storage = match lock(storage).and_then(|guard| guard.ping()) {
        Ok(()) => Health::Ok,
        Err(e) => Health::Failed(e.to_string()),
    };

    let queue = match publisher.check().await {
        Ok(()) => Health::Ok,
        Err(e) => Health::Failed(e.to_string()),
    };

    StatusReport {
        storage,
        queue,
        paused,
    }
}
