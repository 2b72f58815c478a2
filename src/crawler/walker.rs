//! Pagination state machine for one source
//!
//! A walk starts at the source's resume cursor and follows next-page links
//! until the listing ends, the crawl is paused, or a page is refused. The
//! cursor is persisted before each page is fetched, so a crash resumes on
//! the page that was in progress and a pause resumes on the page that was
//! about to be fetched.

use crate::crawler::{ItemOutcome, ItemSink, LinkFetcher, PauseController, PolitenessClock, ScrapedLink};
use crate::robots::RobotsGate;
use crate::storage::{lock, SharedStorage, Source, StorageError};
use crate::url::{parse_base_url, resolve_page};
use crate::{CrawlError, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Tunables for a [`SiteWalker`]
#[derive(Debug, Clone)]
pub struct WalkerSettings {
    /// Key under which this node records its poll timestamps
    pub node_identity: String,

    /// Delay before a failed fetch is retried
    pub retry_delay: Duration,

    /// Retries allowed per page per walk; `None` retries until paused
    pub max_page_retries: Option<u32>,
}

impl Default for WalkerSettings {
    fn default() -> Self {
        Self {
            node_identity: "localhost".to_string(),
            retry_delay: Duration::from_secs(5),
            max_page_retries: None,
        }
    }
}

/// How a walk ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkOutcome {
    /// The listing ended; the cursor is cleared
    Complete { pages: u32 },

    /// The crawl was paused; the cursor points at `next_page`
    Paused { next_page: Option<String> },

    /// Retries ran out; the cursor stays on `page` for the next tick
    GaveUp { page: Option<String> },
}

/// Where the walk is between steps
enum WalkState {
    /// Checkpoint `page` and check robots.txt
    Start { page: Option<String> },

    /// Fetch the item links of the page
    Fetching {
        page: Option<String>,
        url: Url,
        source: Source,
        attempt: u32,
    },

    /// Hand the links to the item sink
    ItemProcessing {
        page: Option<String>,
        url: Url,
        source: Source,
        links: Vec<ScrapedLink>,
    },

    /// Look up the next page link
    NextPageCheck {
        page: Option<String>,
        url: Url,
        source: Source,
        attempt: u32,
    },
}

/// What to do after a failed fetch
enum AfterFailure {
    Retry,
    Stop(WalkOutcome),
}

/// Walks the pages of one source at a time
pub struct SiteWalker {
    storage: SharedStorage,
    fetcher: Arc<dyn LinkFetcher>,
    robots: RobotsGate,
    sink: ItemSink,
    control: PauseController,
    clock: PolitenessClock,
    settings: WalkerSettings,
}

impl SiteWalker {
    /// Creates a walker from its collaborators
    pub fn new(
        storage: SharedStorage,
        fetcher: Arc<dyn LinkFetcher>,
        robots: RobotsGate,
        sink: ItemSink,
        control: PauseController,
        settings: WalkerSettings,
    ) -> Self {
        Self {
            storage,
            fetcher,
            robots,
            sink,
            control,
            clock: PolitenessClock::new(),
            settings,
        }
    }

    /// Walks a source from its persisted cursor
    ///
    /// # Arguments
    ///
    /// * `source_name` - Name of the registered source
    ///
    /// # Returns
    ///
    /// * `Ok(WalkOutcome)` - The walk ended normally
    /// * `Err(CrawlError::RobotsDenied)` - robots.txt refused the current page
    /// * `Err(CrawlError)` - The source vanished or storage failed
    pub async fn walk(&mut self, source_name: &str) -> Result<WalkOutcome> {
        let source = self.load_source(source_name)?;
        info!(
            "Walking source '{}' from {}",
            source_name,
            source.current_page.as_deref().unwrap_or("its start page")
        );

        let mut pages = 0u32;
        let mut state = WalkState::Start {
            page: source.current_page,
        };

        loop {
            state = match state {
                WalkState::Start { page } => {
                    let source = self.load_source(source_name)?;
                    lock(&self.storage)?.update_page(source_name, page.as_deref())?;

                    let base = parse_base_url(&source.url)?;
                    let url = resolve_page(&base, page.as_deref())?;

                    self.robots.prepare(&url).await;
                    if !self.robots.is_allowed(&url) {
                        return Err(CrawlError::RobotsDenied {
                            url: url.to_string(),
                        });
                    }

                    WalkState::Fetching {
                        page,
                        url,
                        source,
                        attempt: 0,
                    }
                }

                WalkState::Fetching {
                    page,
                    url,
                    source,
                    attempt,
                } => {
                    self.polite_wait(&source, &url).await;

                    match self.fetcher.fetch_links(&url, &source.link_selector).await {
                        Ok(links) => {
                            lock(&self.storage)?
                                .log_last_polled(source_name, &self.settings.node_identity)?;
                            WalkState::ItemProcessing {
                                page,
                                url,
                                source,
                                links,
                            }
                        }
                        Err(e) => {
                            warn!("Fetching {} failed (attempt {}): {}", url, attempt + 1, e);
                            match self.after_failure(&page, attempt, true).await {
                                AfterFailure::Retry => WalkState::Fetching {
                                    page,
                                    url,
                                    source,
                                    attempt: attempt + 1,
                                },
                                AfterFailure::Stop(outcome) => return Ok(outcome),
                            }
                        }
                    }
                }

                WalkState::ItemProcessing {
                    page,
                    url,
                    source,
                    links,
                } => {
                    let mut published = 0;
                    let mut stored_only = 0;
                    let mut skipped = 0;
                    for link in &links {
                        match self.sink.handle(link, &source).await {
                            ItemOutcome::Published => published += 1,
                            ItemOutcome::StoredOnly => stored_only += 1,
                            ItemOutcome::Skipped => skipped += 1,
                        }
                    }
                    pages += 1;
                    info!(
                        "Page {} of '{}': {} items ({} published, {} unpublished, {} skipped)",
                        url,
                        source_name,
                        links.len(),
                        published,
                        stored_only,
                        skipped
                    );

                    WalkState::NextPageCheck {
                        page,
                        url,
                        source,
                        attempt: 0,
                    }
                }

                WalkState::NextPageCheck {
                    page,
                    url,
                    source,
                    attempt,
                } => match self.fetcher.fetch_links(&url, &source.next_page_selector).await {
                    Ok(found) => {
                        let next_page = found
                            .into_iter()
                            .map(|link| link.link)
                            .next()
                            .filter(|link| !link.trim().is_empty())
                            .and_then(|link| self.usable_next_page(&source, link));

                        match next_page {
                            None => {
                                lock(&self.storage)?.update_page(source_name, None)?;
                                info!("Source '{}' complete after {} pages", source_name, pages);
                                return Ok(WalkOutcome::Complete { pages });
                            }
                            Some(next_page) if self.control.is_paused() => {
                                lock(&self.storage)?.update_page(source_name, Some(&next_page))?;
                                info!("Source '{}' paused before {}", source_name, next_page);
                                return Ok(WalkOutcome::Paused {
                                    next_page: Some(next_page),
                                });
                            }
                            Some(next_page) => {
                                debug!("Next page of '{}': {}", source_name, next_page);
                                WalkState::Start {
                                    page: Some(next_page),
                                }
                            }
                        }
                    }
                    Err(e) => {
                        warn!(
                            "Next page lookup on {} failed (attempt {}): {}",
                            url,
                            attempt + 1,
                            e
                        );
                        // items of this page are done, so a pause here would
                        // make the resumed walk process them again
                        match self.after_failure(&page, attempt, false).await {
                            AfterFailure::Retry => WalkState::NextPageCheck {
                                page,
                                url,
                                source,
                                attempt: attempt + 1,
                            },
                            AfterFailure::Stop(outcome) => return Ok(outcome),
                        }
                    }
                },
            };
        }
    }

    /// Reads the source, failing if it was removed
    fn load_source(&self, name: &str) -> Result<Source> {
        lock(&self.storage)?
            .find_source(name)?
            .ok_or_else(|| CrawlError::Storage(StorageError::SourceNotFound(name.to_string())))
    }

    /// Keeps a next-page token only if it resolves to an HTTP(S) page
    ///
    /// Disabled "next" buttons often carry `javascript:` or `#` links. Such a
    /// token is dropped, so it ends the listing instead of becoming a cursor
    /// that fails on every tick.
    fn usable_next_page(&self, source: &Source, token: String) -> Option<String> {
        match parse_base_url(&source.url).and_then(|base| resolve_page(&base, Some(&token))) {
            Ok(_) => Some(token),
            Err(e) => {
                warn!(
                    "Ignoring next page link '{}' of '{}': {}",
                    token, source.name, e
                );
                None
            }
        }
    }

    /// Sleeps until the crawl-delay since this node's last fetch has passed
    async fn polite_wait(&self, source: &Source, url: &Url) {
        let delay = self.robots.crawl_delay_seconds(url);
        let wait = self
            .clock
            .wait_millis(source, &self.settings.node_identity, delay);
        if wait > 0 {
            debug!("Waiting {}ms before fetching {}", wait, url);
            tokio::time::sleep(Duration::from_millis(wait)).await;
        }
    }

    /// Decides between another attempt and ending the walk
    ///
    /// The cursor already points at `page`. `attempt` counts from 0 for the
    /// attempt that just failed.
    async fn after_failure(&self, page: &Option<String>, attempt: u32, pausable: bool) -> AfterFailure {
        if let Some(max) = self.settings.max_page_retries {
            if attempt >= max {
                warn!("Giving up on page after {} attempts", attempt + 1);
                return AfterFailure::Stop(WalkOutcome::GaveUp { page: page.clone() });
            }
        }

        if self.should_stop(pausable) {
            return AfterFailure::Stop(WalkOutcome::Paused {
                next_page: page.clone(),
            });
        }

        tokio::time::sleep(self.settings.retry_delay).await;

        if self.should_stop(pausable) {
            return AfterFailure::Stop(WalkOutcome::Paused {
                next_page: page.clone(),
            });
        }
        AfterFailure::Retry
    }

    fn should_stop(&self, pausable: bool) -> bool {
        if pausable {
            self.control.is_paused()
        } else {
            self.control.is_stopping()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::FetchError;
    use crate::queue::{ItemPublisher, PublishError};
    use crate::storage::{share, Game, SqliteStorage};
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use reqwest::Client;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    type Reply = std::result::Result<Vec<ScrapedLink>, u16>;

    /// Answers fetches from a script keyed by (url, selector)
    #[derive(Default)]
    struct ScriptedFetcher {
        script: Mutex<HashMap<(String, String), VecDeque<Reply>>>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedFetcher {
        fn reply(&self, url: &str, selector: &str, reply: Reply) {
            self.script
                .lock()
                .unwrap()
                .entry((url.to_string(), selector.to_string()))
                .or_default()
                .push_back(reply);
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LinkFetcher for ScriptedFetcher {
        async fn fetch_links(
            &self,
            page_url: &Url,
            selector: &str,
        ) -> std::result::Result<Vec<ScrapedLink>, FetchError> {
            let key = (page_url.to_string(), selector.to_string());
            self.calls.lock().unwrap().push(key.clone());
            let reply = self
                .script
                .lock()
                .unwrap()
                .get_mut(&key)
                .and_then(|queue| queue.pop_front())
                .unwrap_or_else(|| Ok(Vec::new()));
            reply.map_err(|status| FetchError::Status {
                url: key.0,
                status,
            })
        }
    }

    #[derive(Default)]
    struct Recorder {
        games: Mutex<Vec<Game>>,
    }

    #[async_trait]
    impl ItemPublisher for Recorder {
        async fn publish(&self, game: &Game) -> std::result::Result<(), PublishError> {
            self.games.lock().unwrap().push(game.clone());
            Ok(())
        }

        async fn check(&self) -> std::result::Result<(), PublishError> {
            Ok(())
        }
    }

    struct Harness {
        server: MockServer,
        storage: SharedStorage,
        fetcher: Arc<ScriptedFetcher>,
        recorder: Arc<Recorder>,
        control: PauseController,
        walker: SiteWalker,
    }

    impl Harness {
        async fn new(robots: &str, max_page_retries: Option<u32>) -> Self {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/robots.txt"))
                .respond_with(ResponseTemplate::new(200).set_body_string(robots))
                .mount(&server)
                .await;

            let storage = share(SqliteStorage::new_in_memory().unwrap());
            let source = Source::new("arcade", format!("{}/a", server.uri()), ".g", ".next");
            storage.lock().unwrap().insert_source(&source).unwrap();

            let fetcher = Arc::new(ScriptedFetcher::default());
            let recorder = Arc::new(Recorder::default());
            let control = PauseController::new();
            let gate = RobotsGate::with_policy(Client::new(), "GameScout", true, ChronoDuration::hours(1));
            let walker = SiteWalker::new(
                storage.clone(),
                fetcher.clone(),
                gate,
                ItemSink::new(storage.clone(), recorder.clone()),
                control.clone(),
                WalkerSettings {
                    node_identity: "node-a".to_string(),
                    retry_delay: Duration::from_millis(10),
                    max_page_retries,
                },
            );

            Self {
                server,
                storage,
                fetcher,
                recorder,
                control,
                walker,
            }
        }

        fn url(&self, page: &str) -> String {
            format!("{}{}", self.server.uri(), page)
        }

        fn source(&self) -> Source {
            self.storage.lock().unwrap().find_source("arcade").unwrap().unwrap()
        }
    }

    #[tokio::test]
    async fn test_walks_until_no_next_page() {
        let mut h = Harness::new("User-agent: *\nAllow: /", None).await;
        let (a, a2) = (h.url("/a"), h.url("/a?p=2"));
        h.fetcher.reply(&a, ".g", Ok(vec![ScrapedLink::new("Foo", "/foo")]));
        h.fetcher.reply(&a, ".next", Ok(vec![ScrapedLink::new("", "/a?p=2")]));
        h.fetcher.reply(&a2, ".g", Ok(vec![ScrapedLink::new("Bar", "/bar")]));

        let outcome = h.walker.walk("arcade").await.unwrap();
        assert_eq!(outcome, WalkOutcome::Complete { pages: 2 });

        let source = h.source();
        assert_eq!(source.current_page, None);
        assert!(source.last_polled_by("node-a").is_some());

        let game = h.storage.lock().unwrap().find_game("Foo").unwrap().unwrap();
        assert_eq!(game.link, "/foo");
        assert_eq!(game.source_name, "arcade");
        assert_eq!(h.recorder.games.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_pause_persists_next_page() {
        let mut h = Harness::new("User-agent: *\nAllow: /", None).await;
        let a = h.url("/a");
        h.fetcher.reply(&a, ".g", Ok(vec![ScrapedLink::new("Foo", "/foo")]));
        h.fetcher.reply(&a, ".next", Ok(vec![ScrapedLink::new("", "/a?p=2")]));
        h.control.pause();

        let outcome = h.walker.walk("arcade").await.unwrap();
        assert_eq!(
            outcome,
            WalkOutcome::Paused {
                next_page: Some("/a?p=2".to_string())
            }
        );
        assert_eq!(h.source().current_page.as_deref(), Some("/a?p=2"));
        assert!(!h.fetcher.calls().iter().any(|(url, _)| url.ends_with("p=2")));
    }

    #[tokio::test]
    async fn test_failed_fetch_retries_same_page() {
        let mut h = Harness::new("User-agent: *\nAllow: /", None).await;
        let a = h.url("/a");
        h.fetcher.reply(&a, ".g", Err(500));
        h.fetcher.reply(&a, ".g", Ok(vec![ScrapedLink::new("Foo", "/foo")]));

        let outcome = h.walker.walk("arcade").await.unwrap();
        assert_eq!(outcome, WalkOutcome::Complete { pages: 1 });

        let calls = h.fetcher.calls();
        let expected: Vec<(String, String)> = vec![
            (a.clone(), ".g".to_string()),
            (a.clone(), ".g".to_string()),
            (a.clone(), ".next".to_string()),
        ];
        assert_eq!(calls, expected);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let mut h = Harness::new("User-agent: *\nAllow: /", Some(2)).await;
        {
            let mut storage = h.storage.lock().unwrap();
            storage.update_page("arcade", Some("/a?p=3")).unwrap();
        }
        let a3 = h.url("/a?p=3");
        for _ in 0..3 {
            h.fetcher.reply(&a3, ".g", Err(503));
        }

        let outcome = h.walker.walk("arcade").await.unwrap();
        assert_eq!(
            outcome,
            WalkOutcome::GaveUp {
                page: Some("/a?p=3".to_string())
            }
        );
        assert_eq!(h.fetcher.calls().len(), 3);
        assert_eq!(h.source().current_page.as_deref(), Some("/a?p=3"));
        assert!(h.recorder.games.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pause_escapes_retry_loop() {
        let mut h = Harness::new("User-agent: *\nAllow: /", None).await;
        let a = h.url("/a");
        h.fetcher.reply(&a, ".g", Err(500));
        h.control.pause();

        let outcome = h.walker.walk("arcade").await.unwrap();
        assert_eq!(outcome, WalkOutcome::Paused { next_page: None });
        assert_eq!(h.fetcher.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_robots_denied_issues_no_fetch() {
        let mut h = Harness::new("User-agent: *\nDisallow: /a", None).await;

        let err = h.walker.walk("arcade").await.unwrap_err();
        assert!(matches!(err, CrawlError::RobotsDenied { .. }));
        assert!(h.fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unresolvable_next_link_ends_listing() {
        let mut h = Harness::new("User-agent: *\nAllow: /", None).await;
        let a = h.url("/a");
        for _ in 0..3 {
            h.fetcher.reply(&a, ".g", Ok(vec![ScrapedLink::new("Foo", "/foo")]));
            h.fetcher.reply(&a, ".next", Ok(vec![ScrapedLink::new("Next", "javascript:void(0)")]));
        }

        // every walk completes and restarts from the base URL
        for _ in 0..3 {
            let outcome = h.walker.walk("arcade").await.unwrap();
            assert_eq!(outcome, WalkOutcome::Complete { pages: 1 });
            assert_eq!(h.source().current_page, None);
        }
        assert!(h.fetcher.calls().iter().all(|(url, _)| *url == a));
    }

    #[tokio::test]
    async fn test_unknown_source() {
        let mut h = Harness::new("User-agent: *\nAllow: /", None).await;
        let err = h.walker.walk("missing").await.unwrap_err();
        assert!(matches!(
            err,
            CrawlError::Storage(StorageError::SourceNotFound(_))
        ));
    }
}
