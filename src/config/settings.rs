// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;
use validator::Validate;

/// 默认浏览器 User-Agent
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 应用程序配置设置
///
/// 包含抓取、浏览器渲染和各类上限配置
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct Settings {
    /// 抓取配置
    #[validate(nested)]
    pub scraper: ScraperSettings,
    /// 无头浏览器配置
    #[validate(nested)]
    pub browser: BrowserSettings,
    /// 并发与数量上限
    #[validate(nested)]
    pub limits: LimitSettings,
}

/// 抓取配置设置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ScraperSettings {
    /// 顺序请求之间的间隔（毫秒）
    pub request_delay_ms: u64,
    /// 索引页之间的间隔（毫秒）
    pub index_delay_ms: u64,
    /// 同级 iframe 递归之间的间隔（毫秒）
    pub frame_delay_ms: u64,
    /// 单次请求超时时间（毫秒）
    #[validate(range(min = 1000, max = 300000))]
    pub timeout_ms: u64,
    /// 请求使用的 User-Agent
    pub user_agent: String,
    /// 单一出站代理
    pub proxy_url: Option<String>,
    /// 轮询使用的代理列表
    #[serde(default)]
    pub proxy_list: Vec<String>,
    /// 是否用 HEAD 请求校验发现的 m3u8
    pub verify_manifests: bool,
    /// 未找到球队标签链接时是否猜测球队页面地址
    pub guess_team_pages: bool,
}

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            request_delay_ms: 1000,
            index_delay_ms: 500,
            frame_delay_ms: 200,
            timeout_ms: 30000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            proxy_url: None,
            proxy_list: Vec::new(),
            verify_manifests: false,
            guess_team_pages: false,
        }
    }
}

impl ScraperSettings {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn index_delay(&self) -> Duration {
        Duration::from_millis(self.index_delay_ms)
    }

    pub fn frame_delay(&self) -> Duration {
        Duration::from_millis(self.frame_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// 无头浏览器配置设置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BrowserSettings {
    /// 是否启用浏览器渲染兜底
    pub enabled: bool,
    /// 页面加载超时（毫秒）
    #[validate(range(min = 1000))]
    pub load_timeout_ms: u64,
    /// 加载完成后等待异步资源的时间（毫秒）
    pub settle_delay_ms: u64,
    /// Chrome 可执行文件路径
    pub executable: Option<String>,
    /// 远程调试地址，设置后连接已有实例而不是启动新实例
    pub remote_debugging_url: Option<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            load_timeout_ms: 30000,
            settle_delay_ms: 2000,
            executable: None,
            remote_debugging_url: None,
        }
    }
}

impl BrowserSettings {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// 数量上限配置设置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LimitSettings {
    /// iframe 最大递归深度
    #[validate(range(max = 10))]
    pub max_frame_depth: usize,
    /// 每层最多递归的 iframe 数
    #[validate(range(min = 1))]
    pub max_frame_fanout: usize,
    /// 每个页面最多并发抓取的镜像数
    #[validate(range(min = 1))]
    pub max_mirrors: usize,
    /// 全站发现时最多收集的事件链接数
    #[validate(range(min = 1))]
    pub max_event_links: usize,
    /// 每个站点最终保留的候选页面数
    #[validate(range(min = 1))]
    pub max_candidates: usize,
    /// 展开的赛程页数量
    pub max_schedule_expansions: usize,
    /// 每个站点深度抓取的页面数
    #[validate(range(min = 1))]
    pub max_pages_per_site: usize,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            max_frame_depth: 3,
            max_frame_fanout: 5,
            max_mirrors: 20,
            max_event_links: 50,
            max_candidates: 20,
            max_schedule_expansions: 5,
            max_pages_per_site: 5,
        }
    }
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次加载默认值、配置文件和环境变量
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Self::with_defaults(Config::builder())?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("STREAMSCOUT")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("scraper.proxy_list")
                    .try_parsing(true),
            );

        Self::finish(Self::with_legacy_env(builder)?)
    }

    /// 从指定配置文件加载（不读取环境变量）
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let builder = Self::with_defaults(Config::builder())?.add_source(File::with_name(path));
        Self::finish(builder)
    }

    fn with_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let scraper = ScraperSettings::default();
        let browser = BrowserSettings::default();
        let limits = LimitSettings::default();

        builder
            // Scraper defaults
            .set_default("scraper.request_delay_ms", scraper.request_delay_ms)?
            .set_default("scraper.index_delay_ms", scraper.index_delay_ms)?
            .set_default("scraper.frame_delay_ms", scraper.frame_delay_ms)?
            .set_default("scraper.timeout_ms", scraper.timeout_ms)?
            .set_default("scraper.user_agent", scraper.user_agent)?
            .set_default("scraper.proxy_list", Vec::<String>::new())?
            .set_default("scraper.verify_manifests", scraper.verify_manifests)?
            .set_default("scraper.guess_team_pages", scraper.guess_team_pages)?
            // Browser defaults
            .set_default("browser.enabled", browser.enabled)?
            .set_default("browser.load_timeout_ms", browser.load_timeout_ms)?
            .set_default("browser.settle_delay_ms", browser.settle_delay_ms)?
            // Limit defaults
            .set_default("limits.max_frame_depth", limits.max_frame_depth as u64)?
            .set_default("limits.max_frame_fanout", limits.max_frame_fanout as u64)?
            .set_default("limits.max_mirrors", limits.max_mirrors as u64)?
            .set_default("limits.max_event_links", limits.max_event_links as u64)?
            .set_default("limits.max_candidates", limits.max_candidates as u64)?
            .set_default(
                "limits.max_schedule_expansions",
                limits.max_schedule_expansions as u64,
            )?
            .set_default("limits.max_pages_per_site", limits.max_pages_per_site as u64)
    }

    /// 兼容旧的扁平环境变量：PROXY_URL, PROXY_LIST, REQUEST_DELAY_MS, TIMEOUT_MS
    fn with_legacy_env(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let mut builder = builder
            .set_override_option("scraper.proxy_url", std::env::var("PROXY_URL").ok())?;

        if let Ok(list) = std::env::var("PROXY_LIST") {
            builder = builder.set_override("scraper.proxy_list", parse_proxy_list(&list))?;
        }
        if let Some(delay) = env_u64("REQUEST_DELAY_MS") {
            builder = builder.set_override("scraper.request_delay_ms", delay)?;
        }
        if let Some(timeout) = env_u64("TIMEOUT_MS") {
            builder = builder.set_override("scraper.timeout_ms", timeout)?;
        }

        Ok(builder)
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        Ok(settings)
    }
}

/// 解析逗号分隔的代理列表
pub fn parse_proxy_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
