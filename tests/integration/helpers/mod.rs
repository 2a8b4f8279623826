// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use streamscout::config::settings::Settings;
use streamscout::engines::fetcher::Fetcher;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// 测试用配置：关闭浏览器，去掉所有等待
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.browser.enabled = false;
    settings.scraper.request_delay_ms = 0;
    settings.scraper.index_delay_ms = 0;
    settings.scraper.frame_delay_ms = 0;
    settings.scraper.timeout_ms = 5000;
    settings
}

pub fn test_fetcher(settings: &Settings) -> Arc<Fetcher> {
    Arc::new(Fetcher::new(settings).expect("Failed to build fetcher"))
}

/// 挂载一个返回 HTML 的 GET 页面
pub async fn mount_page(server: &MockServer, route: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string(html),
        )
        .mount(server)
        .await;
}
