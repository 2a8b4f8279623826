// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 包含的服务：
/// - 提取（extraction）：从页面标记中找出 m3u8 地址的各种策略
/// - 关键词匹配（keyword_matcher）：整词、不区分大小写的 OR 匹配
/// - 链接分类（link_classifier）：赛事链接、分类页、镜像链接、球队标签链接
/// - 框架遍历（frame_walker）：带深度上限和已访问集合的递归 iframe 遍历
/// - 镜像抓取（mirror_scraper）：单个页面及其所有镜像的并发抓取
/// - 站点发现（site_discovery）：候选页面发现
/// - 抓取编排（crawl_orchestrator）：多站点状态机与进度上报
pub mod crawl_orchestrator;
pub mod extraction;
pub mod frame_walker;
pub mod keyword_matcher;
pub mod link_classifier;
pub mod mirror_scraper;
pub mod site_discovery;

#[cfg(test)]
pub(crate) mod test_support;
