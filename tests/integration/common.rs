//! Shared fixture for the integration tests

use async_trait::async_trait;
use gamescout::crawler::{ItemSink, PauseController, ScraperClient, SiteWalker, WalkerSettings};
use gamescout::queue::{ItemPublisher, PublishError};
use gamescout::robots::RobotsGate;
use gamescout::storage::{share, SharedStorage, SqliteStorage};
use gamescout::{Game, Source};
use reqwest::Client;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Publisher that keeps every game it is given
#[derive(Default)]
pub struct RecordingPublisher {
    games: Mutex<Vec<Game>>,
}

impl RecordingPublisher {
    pub fn names(&self) -> Vec<String> {
        self.games
            .lock()
            .unwrap()
            .iter()
            .map(|game| game.name.clone())
            .collect()
    }
}

#[async_trait]
impl ItemPublisher for RecordingPublisher {
    async fn publish(&self, game: &Game) -> Result<(), PublishError> {
        self.games.lock().unwrap().push(game.clone());
        Ok(())
    }

    async fn check(&self) -> Result<(), PublishError> {
        Ok(())
    }
}

pub struct Fixture {
    pub server: MockServer,
    pub storage: SharedStorage,
    pub publisher: Arc<RecordingPublisher>,
    pub control: PauseController,
    _dir: TempDir,
}

impl Fixture {
    /// Starts the mock server with the given robots.txt and an on-disk database
    pub async fn start(robots: &str) -> Self {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(robots))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let storage = share(SqliteStorage::new(&dir.path().join("gamescout.db")).unwrap());

        Self {
            server,
            storage,
            publisher: Arc::new(RecordingPublisher::default()),
            control: PauseController::new(),
            _dir: dir,
        }
    }

    /// Absolute URL of a path on the mock site
    pub fn page(&self, path: &str) -> String {
        format!("{}{}", self.server.uri(), path)
    }

    /// Registers a source whose listing starts at `path`
    pub fn add_source(&self, name: &str, path: &str) {
        let source = Source::new(name, self.page(path), ".g", ".next");
        self.storage.lock().unwrap().insert_source(&source).unwrap();
    }

    pub fn source(&self, name: &str) -> Source {
        self.storage.lock().unwrap().find_source(name).unwrap().unwrap()
    }

    /// Answers a scrape request for `page_url` and `selector` with `body`
    pub async fn scrape(&self, page_url: &str, selector: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path("/api/scrape/link"))
            .and(query_param("url", page_url))
            .and(query_param("selector", selector))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Makes the next `times` scrape requests for a page and selector fail
    pub async fn fail_scrape(&self, page_url: &str, selector: &str, times: u64) {
        Mock::given(method("GET"))
            .and(path("/api/scrape/link"))
            .and(query_param("url", page_url))
            .and(query_param("selector", selector))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(times)
            .mount(&self.server)
            .await;
    }

    /// Scrape requests received so far, as (page url, selector) pairs
    pub async fn scrape_requests(&self) -> Vec<(String, String)> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| request.url.path() == "/api/scrape/link")
            .map(|request| {
                let param = |key: &str| {
                    request
                        .url
                        .query_pairs()
                        .find(|(k, _)| k == key)
                        .map(|(_, v)| v.into_owned())
                        .unwrap_or_default()
                };
                (param("url"), param("selector"))
            })
            .collect()
    }

    /// Builds a walker wired to the mock server
    pub fn walker(&self, max_page_retries: Option<u32>) -> SiteWalker {
        let client = Client::new();
        let api = Url::parse(&format!("{}/api/", self.server.uri())).unwrap();

        SiteWalker::new(
            self.storage.clone(),
            Arc::new(ScraperClient::new(client.clone(), api)),
            RobotsGate::with_policy(client, "GameScout", true, chrono::Duration::hours(1)),
            ItemSink::new(self.storage.clone(), self.publisher.clone()),
            self.control.clone(),
            WalkerSettings {
                node_identity: "node-a".to_string(),
                retry_delay: Duration::from_millis(50),
                max_page_retries,
            },
        )
    }
}
