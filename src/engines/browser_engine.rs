// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::BrowserSettings;
use crate::engines::traits::{EngineError, ScrapeRequest, ScrapeResponse, ScraperEngine};
use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 正在运行的浏览器及其事件处理任务
struct BrowserSlot {
    browser: Browser,
    handler: JoinHandle<()>,
}

/// 浏览器渲染引擎
///
/// 基于chromiumoxide实现。浏览器在首次渲染时惰性启动，进程内复用同一个实例，
/// 每次渲染打开独立标签页。启动失败后引擎被永久禁用，后续调用直接返回
/// `EngineError::BrowserUnavailable`。
pub struct BrowserEngine {
    settings: BrowserSettings,
    user_agent: String,
    slot: Mutex<Option<BrowserSlot>>,
    disabled: AtomicBool,
    launches: AtomicUsize,
}

impl BrowserEngine {
    pub fn new(settings: BrowserSettings, user_agent: impl Into<String>) -> Self {
        let disabled = !settings.enabled;
        Self {
            settings,
            user_agent: user_agent.into(),
            slot: Mutex::new(None),
            disabled: AtomicBool::new(disabled),
            launches: AtomicUsize::new(0),
        }
    }

    /// 渲染是否仍可用（未被配置关闭且未发生启动失败）
    pub fn is_available(&self) -> bool {
        !self.disabled.load(Ordering::Acquire)
    }

    async fn launch(&self) -> Result<BrowserSlot, EngineError> {
        let (browser, mut handler) = if let Some(url) = &self.settings.remote_debugging_url {
            info!("Connecting to remote Chrome instance at: {}", url);
            Browser::connect(url.as_str())
                .await
                .map_err(|e| EngineError::BrowserInit(e.to_string()))?
        } else {
            let mut builder = BrowserConfig::builder()
                .no_sandbox()
                .request_timeout(self.settings.load_timeout())
                .arg("--disable-gpu")
                .arg("--disable-dev-shm-usage");
            if let Some(path) = &self.settings.executable {
                builder = builder.chrome_executable(path);
            }
            let config = builder.build().map_err(EngineError::BrowserInit)?;

            Browser::launch(config)
                .await
                .map_err(|e| EngineError::BrowserInit(e.to_string()))?
        };

        // Spawn a handler to process browser events
        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        info!("Headless browser started");
        Ok(BrowserSlot { browser, handler })
    }

    /// 获取或创建浏览器，并在其中打开一个空白标签页
    async fn open_page(&self) -> Result<Page, EngineError> {
        if !self.is_available() {
            return Err(EngineError::BrowserUnavailable);
        }

        let mut slot = self.slot.lock().await;
        if slot.is_none() {
            // A caller queued behind a failed launch must not launch again
            if !self.is_available() {
                return Err(EngineError::BrowserUnavailable);
            }
            let attempt = self.launches.fetch_add(1, Ordering::Relaxed) + 1;
            debug!("Launching headless browser (attempt {})", attempt);
            match self.launch().await {
                Ok(started) => *slot = Some(started),
                Err(e) => {
                    // Only the first failure is reported loudly
                    if !self.disabled.swap(true, Ordering::AcqRel) {
                        error!("Headless browser unavailable, rendering disabled: {}", e);
                    }
                    return Err(e);
                }
            }
        }

        match slot.as_ref() {
            Some(started) => started
                .browser
                .new_page("about:blank")
                .await
                .map_err(|e| EngineError::Browser(e.to_string())),
            None => Err(EngineError::BrowserUnavailable),
        }
    }

    async fn render(&self, page: &Page, url: &str) -> Result<String, EngineError> {
        page.set_user_agent(self.user_agent.as_str())
            .await
            .map_err(|e| EngineError::Browser(e.to_string()))?;

        match tokio::time::timeout(self.settings.load_timeout(), page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(EngineError::Browser(e.to_string())),
            Err(_) => return Err(EngineError::Timeout),
        }

        // Give late scripts a chance to inject players
        tokio::time::sleep(self.settings.settle_delay()).await;

        page.content()
            .await
            .map_err(|e| EngineError::Browser(e.to_string()))
    }

    /// 关闭浏览器
    ///
    /// 可重复调用；关闭后下一次渲染会重新启动浏览器（除非已被禁用）。
    pub async fn shutdown(&self) {
        let taken = self.slot.lock().await.take();
        if let Some(mut started) = taken {
            if let Err(e) = started.browser.close().await {
                warn!("Failed to close headless browser: {}", e);
            }
            started.handler.abort();
            debug!("Headless browser closed");
        }
    }
}

#[async_trait]
impl ScraperEngine for BrowserEngine {
    /// 以无头浏览器渲染页面并返回最终 DOM
    ///
    /// # 参数
    ///
    /// * `request` - 抓取请求，`timeout` 限制整个渲染过程
    ///
    /// # 返回值
    ///
    /// * `Ok(ScrapeResponse)` - 渲染后的页面
    /// * `Err(EngineError)` - 浏览器不可用、导航失败或超时
    async fn scrape(&self, request: &ScrapeRequest) -> Result<ScrapeResponse, EngineError> {
        let start = Instant::now();
        let page = self.open_page().await?;

        // Navigation has its own bound; settle time must still fit in the request budget
        let budget = request.timeout + self.settings.settle_delay() + Duration::from_secs(5);
        let rendered = tokio::time::timeout(budget, self.render(&page, &request.url))
            .await
            .unwrap_or(Err(EngineError::Timeout));

        if let Err(e) = page.close().await {
            debug!("Failed to close tab for {}: {}", request.url, e);
        }

        Ok(ScrapeResponse {
            status_code: 200,
            content: rendered?,
            content_type: "text/html".to_string(),
            response_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn name(&self) -> &'static str {
        "chromium"
    }
}
