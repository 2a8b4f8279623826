// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 处理抓取间隔、超时、代理、浏览器渲染和数量上限等配置
pub mod settings;
