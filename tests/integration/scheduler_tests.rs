//! Scheduler ticks over several sources

use crate::common::Fixture;
use gamescout::crawler::TickSummary;
use gamescout::CrawlScheduler;
use serde_json::json;
use std::time::Duration;

async fn scheduler_with_sources(robots: &str) -> (Fixture, CrawlScheduler) {
    let fx = Fixture::start(robots).await;
    for (name, path) in [("arcade", "/a"), ("retro", "/r")] {
        fx.add_source(name, path);
        let page = fx.page(path);
        fx.scrape(&page, ".g", json!([{"content": format!("{} hit", name), "link": "/hit"}]))
            .await;
        fx.scrape(&page, ".next", json!([])).await;
    }

    let scheduler = CrawlScheduler::new(
        fx.storage.clone(),
        fx.walker(None),
        fx.control.clone(),
        Duration::from_secs(3600),
    );
    (fx, scheduler)
}

#[tokio::test]
async fn test_tick_walks_all_sources() {
    let (fx, mut scheduler) = scheduler_with_sources("User-agent: *\nAllow: /").await;

    let summary = scheduler.tick().await.unwrap();
    assert_eq!(
        summary,
        TickSummary {
            sources: 2,
            completed: 2,
            ..Default::default()
        }
    );
    assert_eq!(fx.publisher.names(), vec!["arcade hit", "retro hit"]);
}

#[tokio::test]
async fn test_denied_source_does_not_stop_tick() {
    let (fx, mut scheduler) = scheduler_with_sources("User-agent: *\nDisallow: /a\nAllow: /r").await;

    let summary = scheduler.tick().await.unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.completed, 1);
    assert_eq!(fx.publisher.names(), vec!["retro hit"]);
}

#[tokio::test]
async fn test_resume_triggers_immediate_tick() {
    let (fx, mut scheduler) = scheduler_with_sources("User-agent: *\nAllow: /").await;
    let control = scheduler.control();
    control.pause();

    let handle = tokio::spawn(async move { scheduler.run().await });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(fx.publisher.names().is_empty());

    // the poll interval is an hour, so only resume can start this tick
    control.resume();
    let mut waited = Duration::ZERO;
    while fx.publisher.names().len() < 2 && waited < Duration::from_secs(5) {
        tokio::time::sleep(Duration::from_millis(50)).await;
        waited += Duration::from_millis(50);
    }
    assert_eq!(fx.publisher.names().len(), 2);

    control.shutdown();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler should stop")
        .unwrap()
        .unwrap();
}
