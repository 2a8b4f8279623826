// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::Settings;
use crate::engines::browser_engine::BrowserEngine;
use crate::engines::reqwest_engine::ReqwestEngine;
use crate::engines::traits::{
    EngineError, PageFetcher, ProbeResponse, ScrapeRequest, ScraperEngine,
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

/// 内容获取器
///
/// 组合轻量 HTTP 引擎与浏览器引擎，对外提供不会失败的获取接口：
/// 任何错误都被记录并折叠为 `None`。
pub struct Fetcher {
    http: ReqwestEngine,
    browser: BrowserEngine,
    timeout: Duration,
}

impl Fetcher {
    /// 根据配置创建获取器
    ///
    /// # 参数
    ///
    /// * `settings` - 应用配置
    ///
    /// # 返回值
    ///
    /// * `Ok(Fetcher)` - 创建成功
    /// * `Err(EngineError)` - 代理配置无效
    pub fn new(settings: &Settings) -> Result<Self, EngineError> {
        Ok(Self {
            http: ReqwestEngine::new(&settings.scraper)?,
            browser: BrowserEngine::new(
                settings.browser.clone(),
                settings.scraper.user_agent.clone(),
            ),
            timeout: settings.scraper.timeout(),
        })
    }

    async fn run(&self, engine: &dyn ScraperEngine, url: &str) -> Option<String> {
        let request = ScrapeRequest::new(url, self.timeout);
        match engine.scrape(&request).await {
            Ok(response) => {
                debug!(
                    "{} fetched {} ({} bytes, {}ms)",
                    engine.name(),
                    url,
                    response.content.len(),
                    response.response_time_ms
                );
                Some(response.content)
            }
            Err(EngineError::BrowserUnavailable) => None,
            // Missing index pages are routine during discovery
            Err(e) if !e.is_retryable() => {
                debug!("{} gave up on {}: {}", engine.name(), url, e);
                None
            }
            Err(e) => {
                warn!("{} failed for {}: {}", engine.name(), url, e);
                None
            }
        }
    }
}

#[async_trait]
impl PageFetcher for Fetcher {
    async fn fetch(&self, url: &str) -> Option<String> {
        self.run(&self.http, url).await
    }

    async fn fetch_rendered(&self, url: &str) -> Option<String> {
        if !self.browser.is_available() {
            debug!("Rendering unavailable, plain fetch for {}", url);
            return self.fetch(url).await;
        }
        match self.run(&self.browser, url).await {
            Some(content) => Some(content),
            // Launch may have just failed; degrade to a plain fetch
            None if !self.browser.is_available() => self.fetch(url).await,
            None => None,
        }
    }

    fn rendering_available(&self) -> bool {
        self.browser.is_available()
    }

    async fn probe(&self, url: &str) -> Option<ProbeResponse> {
        match self.http.probe(url, self.timeout).await {
            Ok(probe) => Some(probe),
            Err(e) => {
                debug!("HEAD {} failed: {}", url, e);
                None
            }
        }
    }

    async fn release(&self) {
        self.browser.shutdown().await;
    }
}
