// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::errors::SiteCrawlError;
use url::{ParseError, Url};

/// 将可能为相对路径的URL转换为绝对路径URL
pub fn resolve_url(base_url: &Url, path: &str) -> Result<Url, ParseError> {
    base_url.join(path)
}

/// 解析为绝对 http(s) 地址，其他协议或无法解析时返回 `None`
pub fn resolve_http(base_url: &Url, path: &str) -> Option<Url> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }
    resolve_url(base_url, path)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
}

/// 规范化目标站点
///
/// 缺少协议时补 `https://`，并去掉末尾的 `/`，便于直接拼接路径
pub fn normalize_target(raw: &str) -> Result<String, SiteCrawlError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SiteCrawlError::InvalidTarget(raw.to_string()));
    }

    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let parsed = Url::parse(&with_scheme)
        .map_err(|e| SiteCrawlError::InvalidTarget(format!("{}: {}", raw, e)))?;
    if parsed.host_str().is_none() {
        return Err(SiteCrawlError::InvalidTarget(raw.to_string()));
    }

    Ok(with_scheme.trim_end_matches('/').to_string())
}

/// 两个地址是否同源（协议、主机、端口）
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}
