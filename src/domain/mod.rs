// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含流媒体发现的核心逻辑：
/// - 领域模型（models）：抓取结果、候选页面、镜像链接、进度快照
/// - 服务（services）：提取、分类、递归遍历、镜像抓取和多站点编排
///
/// 领域层只通过 `PageFetcher` 访问网络，不依赖具体的抓取实现。
pub mod models;
pub mod services;
