//! End-to-end walks of a single source
//!
//! These tests drive a real scraper client, robots gate and on-disk database
//! against the mock server.

use crate::common::Fixture;
use gamescout::{CrawlError, WalkOutcome};
use serde_json::json;
use std::time::{Duration, Instant};

const ALLOW_ALL: &str = "User-agent: *\nAllow: /";

/// Two listing pages: `/a` lists Foo and links to `/a?p=2`, which lists Bar
async fn two_page_arcade(fx: &Fixture) {
    fx.add_source("arcade", "/a");
    let (a, a2) = (fx.page("/a"), fx.page("/a?p=2"));

    fx.scrape(&a, ".g", json!([{"content": "Foo", "link": "/foo"}])).await;
    fx.scrape(&a, ".next", json!([{"link": "/a?p=2"}])).await;
    fx.scrape(&a2, ".g", json!([{"content": "Bar", "link": "/bar"}])).await;
    fx.scrape(&a2, ".next", json!([])).await;
}

#[tokio::test]
async fn test_walk_follows_next_page_links() {
    let fx = Fixture::start(ALLOW_ALL).await;
    two_page_arcade(&fx).await;

    let outcome = fx.walker(None).walk("arcade").await.unwrap();
    assert_eq!(outcome, WalkOutcome::Complete { pages: 2 });

    let foo = fx.storage.lock().unwrap().find_game("Foo").unwrap().unwrap();
    assert_eq!(foo.link, "/foo");
    assert_eq!(foo.source_name, "arcade");
    assert_eq!(fx.publisher.names(), vec!["Foo", "Bar"]);

    let source = fx.source("arcade");
    assert_eq!(source.current_page, None);
    assert!(source.last_polled_by("node-a").is_some());

    // items before next page, page by page
    let requests = fx.scrape_requests().await;
    let expected = vec![
        (fx.page("/a"), ".g".to_string()),
        (fx.page("/a"), ".next".to_string()),
        (fx.page("/a?p=2"), ".g".to_string()),
        (fx.page("/a?p=2"), ".next".to_string()),
    ];
    assert_eq!(requests, expected);
}

#[tokio::test]
async fn test_pause_then_resume_produces_no_duplicates() {
    let fx = Fixture::start(ALLOW_ALL).await;
    two_page_arcade(&fx).await;

    fx.control.pause();
    let outcome = fx.walker(None).walk("arcade").await.unwrap();
    assert_eq!(
        outcome,
        WalkOutcome::Paused {
            next_page: Some("/a?p=2".to_string())
        }
    );
    assert_eq!(fx.source("arcade").current_page.as_deref(), Some("/a?p=2"));
    assert_eq!(fx.publisher.names(), vec!["Foo"]);

    fx.control.resume();
    let outcome = fx.walker(None).walk("arcade").await.unwrap();
    assert_eq!(outcome, WalkOutcome::Complete { pages: 1 });

    assert_eq!(fx.publisher.names(), vec!["Foo", "Bar"]);
    assert_eq!(fx.source("arcade").current_page, None);
}

#[tokio::test]
async fn test_failed_fetch_is_retried_without_processing_items() {
    let fx = Fixture::start(ALLOW_ALL).await;
    fx.add_source("arcade", "/a");
    let a = fx.page("/a");

    // mounted first, so it answers until used up
    fx.fail_scrape(&a, ".g", 1).await;
    fx.scrape(&a, ".g", json!([{"content": "Foo", "link": "/foo"}])).await;
    fx.scrape(&a, ".next", json!([])).await;

    let outcome = fx.walker(None).walk("arcade").await.unwrap();
    assert_eq!(outcome, WalkOutcome::Complete { pages: 1 });
    assert_eq!(fx.publisher.names(), vec!["Foo"]);

    let requests = fx.scrape_requests().await;
    let expected = vec![
        (a.clone(), ".g".to_string()),
        (a.clone(), ".g".to_string()),
        (a.clone(), ".next".to_string()),
    ];
    assert_eq!(requests, expected);
}

#[tokio::test]
async fn test_exhausted_retries_keep_cursor_on_failed_page() {
    let fx = Fixture::start(ALLOW_ALL).await;
    fx.add_source("arcade", "/a");
    fx.storage
        .lock()
        .unwrap()
        .update_page("arcade", Some("/a?p=3"))
        .unwrap();
    fx.fail_scrape(&fx.page("/a?p=3"), ".g", 10).await;

    let outcome = fx.walker(Some(1)).walk("arcade").await.unwrap();
    assert_eq!(
        outcome,
        WalkOutcome::GaveUp {
            page: Some("/a?p=3".to_string())
        }
    );

    assert_eq!(fx.source("arcade").current_page.as_deref(), Some("/a?p=3"));
    assert_eq!(fx.scrape_requests().await.len(), 2);
    assert!(fx.publisher.names().is_empty());
}

#[tokio::test]
async fn test_robots_disallow_prevents_any_scrape() {
    let fx = Fixture::start("User-agent: *\nDisallow: /a").await;
    fx.add_source("arcade", "/a");

    let err = fx.walker(None).walk("arcade").await.unwrap_err();
    assert!(matches!(err, CrawlError::RobotsDenied { .. }));
    assert!(fx.scrape_requests().await.is_empty());
}

#[tokio::test]
async fn test_completed_source_restarts_from_base_url() {
    let fx = Fixture::start(ALLOW_ALL).await;
    two_page_arcade(&fx).await;

    let mut walker = fx.walker(None);
    assert_eq!(
        walker.walk("arcade").await.unwrap(),
        WalkOutcome::Complete { pages: 2 }
    );
    assert_eq!(
        walker.walk("arcade").await.unwrap(),
        WalkOutcome::Complete { pages: 2 }
    );

    assert_eq!(fx.source("arcade").current_page, None);
    assert_eq!(fx.storage.lock().unwrap().count_games().unwrap(), 2);

    let first_page_fetches = fx
        .scrape_requests()
        .await
        .into_iter()
        .filter(|(url, selector)| *url == fx.page("/a") && selector == ".g")
        .count();
    assert_eq!(first_page_fetches, 2);
}

#[tokio::test]
async fn test_relisted_game_keeps_latest_link() {
    let fx = Fixture::start(ALLOW_ALL).await;
    fx.add_source("arcade", "/a");
    fx.add_source("retro", "/r");

    fx.scrape(&fx.page("/a"), ".g", json!([{"content": "Pong", "link": "/pong-a"}])).await;
    fx.scrape(&fx.page("/r"), ".g", json!([{"content": " Pong ", "link": "/pong-r"}])).await;
    fx.scrape(&fx.page("/a"), ".next", json!([])).await;
    fx.scrape(&fx.page("/r"), ".next", json!([])).await;

    let mut walker = fx.walker(None);
    walker.walk("arcade").await.unwrap();
    walker.walk("retro").await.unwrap();

    let pong = fx.storage.lock().unwrap().find_game("Pong").unwrap().unwrap();
    assert_eq!(pong.link, "/pong-r");
    assert_eq!(pong.source_name, "retro");
}

#[tokio::test]
async fn test_crawl_delay_spaces_page_fetches() {
    let fx = Fixture::start("User-agent: *\nCrawl-delay: 1\nAllow: /").await;
    two_page_arcade(&fx).await;

    let started = Instant::now();
    let outcome = fx.walker(None).walk("arcade").await.unwrap();

    assert_eq!(outcome, WalkOutcome::Complete { pages: 2 });
    assert!(started.elapsed() >= Duration::from_millis(900));
}
