//! Link fetcher implementation
//!
//! This module talks to the external scraping service, which loads a page and
//! returns the elements matching a CSS selector as `{content, link}` pairs:
//! - Building HTTP clients with proper user agent strings
//! - Building the scrape request for a page URL and selector
//! - Classifying transport, status and payload failures

use crate::config::UserAgentConfig;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Errors that can occur while fetching links
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Scraper returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Malformed scraper response for {url}: {message}")]
    Malformed { url: String, message: String },

    #[error("Invalid scraper URL: {0}")]
    InvalidUrl(String),
}

/// One element matched on a scraped page
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScrapedLink {
    /// Text content of the element
    #[serde(default)]
    pub content: String,

    /// The element's link target
    pub link: String,
}

impl ScrapedLink {
    /// Creates a scraped link
    pub fn new(content: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            link: link.into(),
        }
    }
}

/// Source of `{content, link}` pairs for a page and selector
#[async_trait]
pub trait LinkFetcher: Send + Sync {
    /// Returns the elements of `page_url` matching `selector`, in page order
    ///
    /// An empty list is a valid answer and means nothing matched.
    async fn fetch_links(&self, page_url: &Url, selector: &str) -> Result<Vec<ScrapedLink>, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use gamescout::config::UserAgentConfig;
/// use gamescout::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "GameScout".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: Some("https://example.com/about".to_string()),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`LinkFetcher`] backed by the scraping service's `scrape/link` endpoint
#[derive(Debug, Clone)]
pub struct ScraperClient {
    client: Client,
    base_url: Url,
}

impl ScraperClient {
    /// Creates a client for the service rooted at `base_url`
    ///
    /// # Arguments
    ///
    /// * `client` - The HTTP client to use
    /// * `base_url` - API root of the service, e.g. `http://localhost:3002/api/`
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    /// Builds the request URL for a page and selector
    ///
    /// Both values are percent-encoded into the query string.
    pub fn request_url(&self, page_url: &Url, selector: &str) -> Result<Url, FetchError> {
        let endpoint = format!(
            "scrape/link?url={}&selector={}",
            urlencoding::encode(page_url.as_str()),
            urlencoding::encode(selector)
        );
        self.base_url
            .join(&endpoint)
            .map_err(|e| FetchError::InvalidUrl(format!("{}{}: {}", self.base_url, endpoint, e)))
    }
}

#[async_trait]
impl LinkFetcher for ScraperClient {
    async fn fetch_links(&self, page_url: &Url, selector: &str) -> Result<Vec<ScrapedLink>, FetchError> {
        let request_url = self.request_url(page_url, selector)?;
        debug!("Scraping {} with selector '{}'", page_url, selector);

        let response = self
            .client
            .get(request_url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: page_url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: page_url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|source| FetchError::Request {
            url: page_url.to_string(),
            source,
        })?;

        serde_json::from_str(&body).map_err(|e| FetchError::Malformed {
            url: page_url.to_string(),
            message: e.to_string(),
        })
    }
}
