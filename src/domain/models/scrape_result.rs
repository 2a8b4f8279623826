// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 默认的服务器标签
pub const DEFAULT_SERVER_LABEL: &str = "Main";

/// 抓取结果实体
///
/// 每个被检查的页面或镜像对应一条结果。创建后不再修改，
/// 所有权在创建时移交给编排器的结果集合。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResult {
    /// 被检查的页面地址
    pub scraped_url: String,
    /// 发现的 m3u8 地址，去重且有序
    pub source_urls: BTreeSet<String>,
    /// 所属目标站点
    pub domain_index_url: String,
    /// 镜像或页面的可读标签
    pub server_label: String,
    /// 创建时间
    pub timestamp: DateTime<Utc>,
    /// 是否找到 m3u8
    pub success: bool,
    /// 失败描述
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScrapeResult {
    /// 创建一个新的抓取结果
    ///
    /// # 参数
    ///
    /// * `scraped_url` - 被检查的页面
    /// * `domain_index_url` - 所属站点
    /// * `server_label` - 标签
    /// * `source_urls` - 发现的 m3u8 地址
    ///
    /// # 返回值
    ///
    /// `success` 当且仅当 `source_urls` 非空
    pub fn new(
        scraped_url: impl Into<String>,
        domain_index_url: impl Into<String>,
        server_label: impl Into<String>,
        source_urls: BTreeSet<String>,
    ) -> Self {
        Self {
            success: !source_urls.is_empty(),
            scraped_url: scraped_url.into(),
            source_urls,
            domain_index_url: domain_index_url.into(),
            server_label: server_label.into(),
            timestamp: Utc::now(),
            error: None,
        }
    }

    /// 创建一个失败结果
    pub fn failed(
        scraped_url: impl Into<String>,
        domain_index_url: impl Into<String>,
        server_label: impl Into<String>,
        error: Option<String>,
    ) -> Self {
        let mut result = Self::new(scraped_url, domain_index_url, server_label, BTreeSet::new());
        result.error = error;
        result
    }

    /// 以换行拼接的 m3u8 列表，供表格导出使用
    pub fn joined_sources(&self) -> String {
        self.source_urls
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_follows_sources() {
        let found = ScrapeResult::new(
            "https://a.test/m",
            "https://a.test",
            DEFAULT_SERVER_LABEL,
            BTreeSet::from(["https://cdn.test/x.m3u8".to_string()]),
        );
        assert!(found.success);
        assert_eq!(found.server_label, "Main");

        let empty = ScrapeResult::new("https://a.test/m", "https://a.test", "Link 1", BTreeSet::new());
        assert!(!empty.success);
    }

    #[test]
    fn test_failed_result_serializes_error_in_camel_case() {
        let result = ScrapeResult::failed(
            "https://a.test/m",
            "https://a.test",
            "No streams found",
            Some("boom".to_string()),
        );
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["scrapedUrl"], "https://a.test/m");
        assert_eq!(json["serverLabel"], "No streams found");
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "boom");
        assert!(json["sourceUrls"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_joined_sources_is_sorted() {
        let result = ScrapeResult::new(
            "u",
            "d",
            "Main",
            BTreeSet::from(["https://b/2.m3u8".to_string(), "https://a/1.m3u8".to_string()]),
        );
        assert_eq!(result.joined_sources(), "https://a/1.m3u8\nhttps://b/2.m3u8");
    }
}
