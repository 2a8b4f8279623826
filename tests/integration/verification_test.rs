// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{mount_page, test_fetcher, test_settings};
use streamscout::domain::services::mirror_scraper::MirrorScraper;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_verification_probe_drops_dead_manifests() {
    let server = MockServer::start().await;
    let live = format!("{}/hls/live.m3u8", server.uri());
    let dead = format!("{}/hls/dead.m3u8", server.uri());
    mount_page(
        &server,
        "/watch",
        &format!(r#"<script>var a = "{}"; var b = "{}";</script>"#, live, dead),
    )
    .await;
    Mock::given(method("HEAD"))
        .and(path("/hls/live.m3u8"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("content-type", "application/vnd.apple.mpegurl"),
        )
        .mount(&server)
        .await;

    let mut settings = test_settings();
    settings.scraper.verify_manifests = true;
    let scraper = MirrorScraper::new(test_fetcher(&settings), &settings);

    let result = scraper
        .scrape_page(&format!("{}/watch", server.uri()), &server.uri())
        .await;

    assert!(result.success);
    assert_eq!(result.source_urls.len(), 1);
    assert!(result.source_urls.contains(&live));
}
