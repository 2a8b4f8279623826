// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 包含抓取结果、候选链接和进度快照等数据结构
pub mod candidate;
pub mod progress;
pub mod scrape_result;
