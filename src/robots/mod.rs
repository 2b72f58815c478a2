//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching robots.txt files.
//! It respects robots.txt directives when crawling websites.

mod cache;
mod gate;
mod parser;

pub use cache::CachedRobots;
pub use gate::RobotsGate;
pub use parser::{ParsedRobots, RobotsVerdict};
