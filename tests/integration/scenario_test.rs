// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{mount_page, test_fetcher, test_settings};
use streamscout::domain::models::progress::StopSignal;
use streamscout::domain::services::crawl_orchestrator::CrawlOrchestrator;
use tokio::sync::mpsc;
use wiremock::MockServer;

/// 一个比赛页、三个镜像：一个经由嵌套 iframe，一个经由 atob，一个没有流
async fn match_site() -> MockServer {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        r#"<html><body>
            <h2>Today</h2>
            <a href="/match/team-a-vs-team-b">Team A vs Team B</a>
            <a href="/about">About us</a>
        </body></html>"#,
    )
    .await;
    mount_page(
        &server,
        "/match/team-a-vs-team-b",
        r#"<html><head><title>Team A vs Team B live</title></head><body>
            <div class="links">
              <a href="/mirror/1">Link 1</a>
              <a href="/mirror/2">Link 2</a>
              <a href="/mirror/3">Link 3</a>
            </div>
        </body></html>"#,
    )
    .await;
    mount_page(
        &server,
        "/mirror/1",
        r#"<html><body><iframe src="/embed/1" width="640"></iframe></body></html>"#,
    )
    .await;
    mount_page(
        &server,
        "/embed/1",
        r#"<html><body><script>
            var player = new Player({ source: "https://cdn.example.com/one.m3u8" });
        </script></body></html>"#,
    )
    .await;
    mount_page(
        &server,
        "/mirror/2",
        r#"<html><body><script>
            var src = atob("aHR0cHM6Ly9jZG4uZXhhbXBsZS5jb20vdHdvLm0zdTg=");
            player.load(src);
        </script></body></html>"#,
    )
    .await;
    mount_page(
        &server,
        "/mirror/3",
        "<html><body><p>Stream offline</p></body></html>",
    )
    .await;

    server
}

#[tokio::test]
async fn test_keyword_scrape_finds_two_of_three_mirrors() {
    let server = match_site().await;
    let settings = test_settings();
    let orchestrator = CrawlOrchestrator::new(test_fetcher(&settings), &settings);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let results = orchestrator
        .scrape(
            &[server.uri()],
            &["Team A vs Team B".to_string()],
            Some(tx),
            &StopSignal::new(),
        )
        .await;

    assert_eq!(results.len(), 3, "unexpected results: {:#?}", results);

    let labels: Vec<&str> = results.iter().map(|r| r.server_label.as_str()).collect();
    assert_eq!(labels, vec!["Link 1", "Link 2", "Link 3"]);

    let successes: Vec<_> = results.iter().filter(|r| r.success).collect();
    assert_eq!(successes.len(), 2);
    assert!(results[0]
        .source_urls
        .contains("https://cdn.example.com/one.m3u8"));
    assert!(results[1]
        .source_urls
        .contains("https://cdn.example.com/two.m3u8"));

    assert!(!results[2].success);
    assert!(results[2].source_urls.is_empty());
    assert_eq!(results[2].scraped_url, format!("{}/mirror/3", server.uri()));
    assert!(results.iter().all(|r| r.domain_index_url == server.uri()));

    let snapshot = rx.recv().await.expect("progress snapshot");
    assert_eq!(snapshot.processed, 1);
    assert_eq!(snapshot.total, 1);
    assert_eq!(snapshot.found, 2);
    assert_eq!(
        snapshot.current_page,
        Some(format!("{}/match/team-a-vs-team-b", server.uri()))
    );
}

#[tokio::test]
async fn test_results_serialize_with_camel_case_fields() {
    let server = match_site().await;
    let settings = test_settings();
    let orchestrator = CrawlOrchestrator::new(test_fetcher(&settings), &settings);

    let results = orchestrator
        .scrape(
            &[server.uri()],
            &["Team A vs Team B".to_string()],
            None,
            &StopSignal::new(),
        )
        .await;

    let json = serde_json::to_value(&results).unwrap();
    let first = &json[0];
    assert_eq!(first["serverLabel"], "Link 1");
    assert_eq!(first["sourceUrls"][0], "https://cdn.example.com/one.m3u8");
    assert!(first["scrapedUrl"].as_str().unwrap().ends_with("/mirror/1"));
    assert!(first["domainIndexUrl"].is_string());
    assert!(first["timestamp"].is_string());
    assert_eq!(first["success"], true);
}

#[tokio::test]
async fn test_unreachable_site_yields_placeholder() {
    // Nothing mounted: every page is a 404
    let server = MockServer::start().await;
    let settings = test_settings();
    let orchestrator = CrawlOrchestrator::new(test_fetcher(&settings), &settings);

    let results = orchestrator
        .scrape(&[server.uri()], &[], None, &StopSignal::new())
        .await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].scraped_url, server.uri());
    assert_eq!(results[0].server_label, "No streams found");
    assert!(!results[0].success);
}
