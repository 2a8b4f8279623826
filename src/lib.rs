// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 处理抓取间隔、超时、代理、浏览器渲染和数量上限等配置
pub mod config;

/// 领域模块
///
/// 包含抓取结果模型和 m3u8 发现流水线
pub mod domain;

/// 引擎模块
///
/// 实现普通 HTTP 抓取、无头浏览器渲染和代理轮换
pub mod engines;

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
pub mod utils;

pub use config::settings::Settings;
pub use domain::models::progress::{ProgressSender, ProgressSnapshot, StopSignal};
pub use domain::models::scrape_result::ScrapeResult;
pub use domain::services::crawl_orchestrator::CrawlOrchestrator;
pub use engines::fetcher::Fetcher;
pub use engines::traits::PageFetcher;
