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

use crate::config::settings::ScraperSettings;
use crate::engines::proxy_rotator::{redact, ProxyRotator};
use crate::engines::traits::{
    EngineError, ProbeResponse, ScrapeRequest, ScrapeResponse, ScraperEngine,
};
use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{redirect, Client};
use std::time::{Duration, Instant};
use tracing::debug;

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const MAX_REDIRECTS: usize = 5;

/// 带出站代理的 HTTP 客户端
struct RoutedClient {
    /// 已隐藏凭据的代理地址，直连时为 `None`
    proxy: Option<String>,
    client: Client,
}

/// 抓取引擎
///
/// 基于reqwest实现的基本HTTP抓取引擎，每个代理一个客户端，按请求轮询
pub struct ReqwestEngine {
    clients: ProxyRotator<RoutedClient>,
}

impl ReqwestEngine {
    /// 根据抓取配置创建引擎
    ///
    /// `proxy_list` 非空时轮询其中的代理；否则使用 `proxy_url`；都没有时直连。
    ///
    /// # 参数
    ///
    /// * `settings` - 抓取配置
    ///
    /// # 返回值
    ///
    /// * `Ok(ReqwestEngine)` - 创建成功
    /// * `Err(EngineError)` - 代理地址无效或客户端构建失败
    pub fn new(settings: &ScraperSettings) -> Result<Self, EngineError> {
        let proxies: Vec<Option<&str>> = if !settings.proxy_list.is_empty() {
            settings.proxy_list.iter().map(|p| Some(p.as_str())).collect()
        } else {
            vec![settings.proxy_url.as_deref()]
        };

        let clients = proxies
            .into_iter()
            .map(|proxy| Self::build_client(&settings.user_agent, proxy))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            clients: ProxyRotator::new(clients),
        })
    }

    fn build_client(user_agent: &str, proxy: Option<&str>) -> Result<RoutedClient, EngineError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT));
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.5"),
        );
        headers.insert(header::DNT, HeaderValue::from_static("1"));
        headers.insert(
            header::UPGRADE_INSECURE_REQUESTS,
            HeaderValue::from_static("1"),
        );

        let mut builder = Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .cookie_store(true);

        // Handle proxy
        if let Some(proxy_url) = proxy {
            let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| {
                EngineError::Other(format!("Invalid proxy {}: {}", redact(proxy_url), e))
            })?;
            builder = builder.proxy(proxy);
        }

        Ok(RoutedClient {
            proxy: proxy.map(redact),
            client: builder.build()?,
        })
    }

    fn next_client(&self) -> Result<&RoutedClient, EngineError> {
        self.clients
            .next()
            .ok_or_else(|| EngineError::Other("No HTTP client configured".to_string()))
    }

    /// 以 HEAD 请求探测 URL，不对状态码做判断
    pub async fn probe(&self, url: &str, timeout: Duration) -> Result<ProbeResponse, EngineError> {
        let routed = self.next_client()?;
        let response = routed
            .client
            .head(url)
            .header(header::REFERER, url)
            .timeout(timeout)
            .send()
            .await
            .map_err(map_request_error)?;

        Ok(ProbeResponse {
            status: response.status().as_u16(),
            content_type: response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        })
    }

    /// 配置的出站路径数量
    pub fn route_count(&self) -> usize {
        self.clients.len()
    }
}

fn map_request_error(error: reqwest::Error) -> EngineError {
    if error.is_timeout() {
        EngineError::Timeout
    } else {
        EngineError::RequestFailed(error)
    }
}

#[async_trait]
impl ScraperEngine for ReqwestEngine {
    /// 执行HTTP抓取
    ///
    /// # 参数
    ///
    /// * `request` - 抓取请求
    ///
    /// # 返回值
    ///
    /// * `Ok(ScrapeResponse)` - 2xx 抓取响应
    /// * `Err(EngineError)` - 网络错误、超时或非 2xx 状态
    async fn scrape(&self, request: &ScrapeRequest) -> Result<ScrapeResponse, EngineError> {
        let routed = self.next_client()?;
        if let Some(proxy) = &routed.proxy {
            debug!("Fetching {} via proxy {}", request.url, proxy);
        }

        let start = Instant::now();
        let response = routed
            .client
            .get(&request.url)
            .header(header::REFERER, &request.url)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(map_request_error)?;

        let status_code = response.status().as_u16();
        if !response.status().is_success() {
            return Err(EngineError::HttpStatus(status_code));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.trim().is_empty())
            .unwrap_or("text/html")
            .to_string();

        let content = response.text().await.map_err(map_request_error)?;

        Ok(ScrapeResponse {
            status_code,
            content,
            content_type,
            response_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// 获取引擎名称
    fn name(&self) -> &'static str {
        "reqwest"
    }
}

#[cfg(test)]
#[path = "reqwest_engine_test.rs"]
mod tests;
