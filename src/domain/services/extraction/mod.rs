// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! m3u8 地址提取
//!
//! 每种提取手法是一个独立的 [`ExtractionStrategy`]，分属两个阶段：
//! 直接提取与去混淆提取。[`ManifestExtractor`] 依次运行全部策略，
//! 把候选地址规范化后取并集。

pub mod direct;
pub mod obfuscated;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use std::collections::BTreeSet;
use url::Url;

/// m3u8 文件标记
pub const MANIFEST_MARKER: &str = ".m3u8";

/// 原始文本中的绝对 m3u8 地址
pub(crate) static MANIFEST_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)https?://[^\s"'<>]+\.m3u8[^\s"'<>]*"#).expect("Failed to compile manifest regex")
});

/// 待提取的页面
///
/// 持有原始文本与解析后的 DOM；`Html` 不是 `Send`，只能在同步代码中使用
pub struct Markup<'a> {
    raw: &'a str,
    base: &'a Url,
    document: Html,
}

impl<'a> Markup<'a> {
    pub fn new(raw: &'a str, base: &'a Url) -> Self {
        Self {
            raw,
            base,
            document: Html::parse_document(raw),
        }
    }

    pub fn raw(&self) -> &str {
        self.raw
    }

    pub fn base(&self) -> &Url {
        self.base
    }

    pub fn document(&self) -> &Html {
        &self.document
    }
}

/// 提取策略
pub trait ExtractionStrategy: Send + Sync {
    /// 策略名称，用于日志
    fn name(&self) -> &'static str;

    /// 返回候选地址，可能是相对的或无效的，由提取器统一规范化
    fn extract(&self, markup: &Markup<'_>) -> Vec<String>;
}

/// 提取阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Direct,
    Obfuscated,
}

/// m3u8 提取器
pub struct ManifestExtractor {
    direct: Vec<Box<dyn ExtractionStrategy>>,
    obfuscated: Vec<Box<dyn ExtractionStrategy>>,
}

impl Default for ManifestExtractor {
    fn default() -> Self {
        Self {
            direct: vec![
                Box::new(direct::RawMarkupScan),
                Box::new(direct::MediaAttributeScan),
                Box::new(direct::InlineScriptScan),
            ],
            obfuscated: vec![
                Box::new(obfuscated::Base64TokenScan),
                Box::new(obfuscated::PercentEncodedScan),
                Box::new(obfuscated::PackedScriptScan),
                Box::new(obfuscated::DecodeCallScan),
                Box::new(obfuscated::AssignmentScan),
            ],
        }
    }
}

impl ManifestExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个策略
    pub fn with_strategy(mut self, pass: Pass, strategy: Box<dyn ExtractionStrategy>) -> Self {
        match pass {
            Pass::Direct => self.direct.push(strategy),
            Pass::Obfuscated => self.obfuscated.push(strategy),
        }
        self
    }

    /// 仅运行直接提取阶段
    pub fn extract_direct(&self, html: &str, page_url: &Url) -> BTreeSet<String> {
        let markup = Markup::new(html, page_url);
        run(&self.direct, &markup)
    }

    /// 仅运行去混淆阶段
    pub fn extract_obfuscated(&self, html: &str, page_url: &Url) -> BTreeSet<String> {
        let markup = Markup::new(html, page_url);
        run(&self.obfuscated, &markup)
    }

    /// 运行两个阶段并取并集
    ///
    /// # 参数
    ///
    /// * `html` - 页面内容
    /// * `page_url` - 页面地址，用于解析相对地址
    ///
    /// # 返回值
    ///
    /// 去重后的绝对 m3u8 地址
    pub fn extract(&self, html: &str, page_url: &Url) -> BTreeSet<String> {
        if html.is_empty() {
            return BTreeSet::new();
        }
        let markup = Markup::new(html, page_url);
        let mut found = run(&self.direct, &markup);
        found.extend(run(&self.obfuscated, &markup));
        found
    }
}

fn run(strategies: &[Box<dyn ExtractionStrategy>], markup: &Markup<'_>) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    for strategy in strategies {
        let before = found.len();
        found.extend(
            strategy
                .extract(markup)
                .iter()
                .filter_map(|candidate| normalize_manifest(candidate, markup.base())),
        );
        if found.len() > before {
            tracing::trace!(
                "{} found {} manifest(s) on {}",
                strategy.name(),
                found.len() - before,
                markup.base()
            );
        }
    }
    found
}

/// 规范化候选地址
///
/// 去掉首尾空白和脚本残留的尾随字符，按页面地址解析，
/// 只接受路径部分包含 `.m3u8` 的绝对 http(s) 地址
pub fn normalize_manifest(candidate: &str, base: &Url) -> Option<String> {
    let trimmed = candidate
        .trim()
        .trim_end_matches(|c| matches!(c, '\\' | ',' | ';'));
    if trimmed.is_empty() {
        return None;
    }

    let url = base.join(trimmed).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }

    url.path()
        .to_ascii_lowercase()
        .contains(MANIFEST_MARKER)
        .then(|| url.to_string())
}
