//! Integration tests for GameScout
//!
//! A wiremock server plays both the crawled site (serving robots.txt) and the
//! scraping service (serving `/api/scrape/link`).

mod common;
mod config_tests;
mod crawl_tests;
mod scheduler_tests;
