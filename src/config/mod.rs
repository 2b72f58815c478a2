//! Configuration module for GameScout
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, with the deployment's environment variables layered on top.
//!
//! # Example
//!
//! ```no_run
//! use gamescout::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("gamescout.toml")).unwrap();
//! println!("Publishing to queue: {}", config.queue.name);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, NodeConfig, QueueConfig, RobotsConfig, SchedulerConfig, ScraperConfig, StorageConfig,
    UserAgentConfig,
};

// Re-export parser functions
pub use parser::{
    apply_env_overrides, compute_config_hash, load_config, load_config_with_hash, parse_config,
};
pub use validation::validate;
