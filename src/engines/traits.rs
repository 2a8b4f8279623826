// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// 引擎错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    /// 请求失败
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    /// 非 2xx 响应
    #[error("Unexpected HTTP status {0}")]
    HttpStatus(u16),
    /// 超时
    #[error("Timeout")]
    Timeout,
    /// 浏览器启动失败
    #[error("Browser init failed: {0}")]
    BrowserInit(String),
    /// 浏览器已被禁用或未配置
    #[error("Browser unavailable")]
    BrowserUnavailable,
    /// 浏览器渲染失败
    #[error("Browser error: {0}")]
    Browser(String),
    /// 其他错误
    #[error("Other error: {0}")]
    Other(String),
}

impl EngineError {
    /// 判断错误是否可重试
    ///
    /// # 返回值
    ///
    /// 如果错误是可重试的则返回true，否则返回false
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::RequestFailed(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            }
            EngineError::HttpStatus(status) => *status >= 500,
            EngineError::Timeout => true,
            EngineError::Browser(_) => true,
            _ => false,
        }
    }
}

/// 抓取请求
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    /// 目标URL
    pub url: String,
    /// 超时时间
    pub timeout: Duration,
}

impl ScrapeRequest {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }
}

/// 抓取响应
#[derive(Debug, Clone)]
pub struct ScrapeResponse {
    /// HTTP状态码
    pub status_code: u16,
    /// 响应内容
    pub content: String,
    /// 内容类型
    pub content_type: String,
    /// 响应时间（毫秒）
    pub response_time_ms: u64,
}

/// HEAD 探测结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub content_type: Option<String>,
}

impl ProbeResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 抓取引擎特质
#[async_trait]
pub trait ScraperEngine: Send + Sync {
    /// 执行抓取
    async fn scrape(&self, request: &ScrapeRequest) -> Result<ScrapeResponse, EngineError>;

    /// 引擎名称
    fn name(&self) -> &'static str;
}

/// 页面获取特质
///
/// 领域服务唯一依赖的获取接口。所有方法都不会失败：
/// 错误在实现内部记录日志后以 `None` 返回。
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// 以轻量 HTTP 请求获取页面
    async fn fetch(&self, url: &str) -> Option<String>;

    /// 以无头浏览器渲染页面，渲染不可用时退化为 `fetch`
    async fn fetch_rendered(&self, url: &str) -> Option<String>;

    /// 浏览器渲染当前是否可用
    fn rendering_available(&self) -> bool;

    /// 以 HEAD 请求探测 URL
    async fn probe(&self, url: &str) -> Option<ProbeResponse>;

    /// 释放浏览器等进程级资源
    async fn release(&self);
}
