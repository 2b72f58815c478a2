//! URL handling module for GameScout
//!
//! This module provides page-token resolution against a source's base URL
//! and the origin helpers used to key robots.txt caching.

mod origin;
mod resolve;

// Re-export main functions
pub use origin::{origin_key, robots_url};
pub use resolve::{parse_base_url, resolve_page};
