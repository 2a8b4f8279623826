// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{mount_page, test_fetcher, test_settings};
use streamscout::domain::models::progress::StopSignal;
use streamscout::domain::services::crawl_orchestrator::CrawlOrchestrator;
use wiremock::MockServer;

#[tokio::test]
async fn test_event_discovery_without_keywords() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<a href="/soccer">Soccer</a><a href="/contact">Contact</a>"#,
    )
    .await;
    mount_page(
        &server,
        "/soccer",
        r#"<ul>
            <li><a href="/event/501">Lazio - Roma 20:45</a></li>
            <li><a href="/event/502">Inter v Milan</a></li>
        </ul>"#,
    )
    .await;
    mount_page(
        &server,
        "/event/501",
        r#"<video><source src="https://cdn.example.com/501/index.m3u8"></video>"#,
    )
    .await;
    mount_page(
        &server,
        "/event/502",
        r#"<div data-stream="https://cdn.example.com/502/index.m3u8?token=abc"></div>"#,
    )
    .await;

    let settings = test_settings();
    let orchestrator = CrawlOrchestrator::new(test_fetcher(&settings), &settings);
    let results = orchestrator
        .scrape(&[server.uri()], &[], None, &StopSignal::new())
        .await;

    let found: Vec<(&str, &str)> = results
        .iter()
        .flat_map(|r| {
            r.source_urls
                .iter()
                .map(move |s| (r.server_label.as_str(), s.as_str()))
        })
        .collect();
    assert_eq!(
        found,
        vec![
            ("Main Page", "https://cdn.example.com/501/index.m3u8"),
            ("Main Page", "https://cdn.example.com/502/index.m3u8?token=abc"),
        ]
    );
}

#[tokio::test]
async fn test_stop_signal_keeps_partial_results() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "https://cdn.example.com/home.m3u8").await;

    let settings = test_settings();
    let orchestrator = CrawlOrchestrator::new(test_fetcher(&settings), &settings);
    let stop = StopSignal::new();
    stop.stop();

    let results = orchestrator
        .scrape(&[server.uri(), server.uri()], &[], None, &stop)
        .await;
    assert!(results.is_empty());
}
