// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;

/// 解码错误类型
///
/// 去混淆时单个 token 的解码失败，调用方跳过该 token
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("无效的 base64: {0}")]
    InvalidBase64(String),

    #[error("解码结果不是 UTF-8")]
    InvalidUtf8,

    #[error("无效的百分号编码: {0}")]
    InvalidPercentEncoding(String),
}

/// 站点抓取错误类型
///
/// 在编排器边界捕获，记录到该站点的进度快照中
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SiteCrawlError {
    #[error("无效的目标站点: {0}")]
    InvalidTarget(String),

    #[error("站点处理异常中止: {0}")]
    Panicked(String),
}
