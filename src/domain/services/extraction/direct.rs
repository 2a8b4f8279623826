// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::{ExtractionStrategy, Markup, MANIFEST_MARKER, MANIFEST_URL_RE};
use once_cell::sync::Lazy;
use scraper::Selector;

static VIDEO_SRC: Lazy<Selector> =
    Lazy::new(|| Selector::parse("video[src], video source[src]").expect("Failed to compile video selector"));
static DATA_ATTRS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("[data-src], [data-video], [data-stream], [data-file]")
        .expect("Failed to compile data attribute selector")
});
static SCRIPT: Lazy<Selector> =
    Lazy::new(|| Selector::parse("script").expect("Failed to compile script selector"));

const DATA_ATTR_NAMES: [&str; 4] = ["data-src", "data-video", "data-stream", "data-file"];

fn has_marker(value: &str) -> bool {
    value.to_ascii_lowercase().contains(MANIFEST_MARKER)
}

/// 在原始文本中直接匹配绝对地址
pub struct RawMarkupScan;

impl ExtractionStrategy for RawMarkupScan {
    fn name(&self) -> &'static str {
        "raw-markup"
    }

    fn extract(&self, markup: &Markup<'_>) -> Vec<String> {
        MANIFEST_URL_RE
            .find_iter(markup.raw())
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

/// 检查媒体元素和常见的 `data-*` 属性，允许相对地址
pub struct MediaAttributeScan;

impl ExtractionStrategy for MediaAttributeScan {
    fn name(&self) -> &'static str {
        "media-attribute"
    }

    fn extract(&self, markup: &Markup<'_>) -> Vec<String> {
        let document = markup.document();

        let video = document
            .select(&VIDEO_SRC)
            .filter_map(|el| el.value().attr("src"))
            .filter(|src| has_marker(src));

        let lazy = document.select(&DATA_ATTRS).flat_map(|el| {
            DATA_ATTR_NAMES
                .iter()
                .filter_map(move |name| el.value().attr(name))
                .filter(|value| has_marker(value))
        });

        video.chain(lazy).map(str::to_string).collect()
    }
}

/// 扫描内联脚本，先还原 JSON 转义的 `\/`
pub struct InlineScriptScan;

impl ExtractionStrategy for InlineScriptScan {
    fn name(&self) -> &'static str {
        "inline-script"
    }

    fn extract(&self, markup: &Markup<'_>) -> Vec<String> {
        let mut found = Vec::new();
        for script in markup.document().select(&SCRIPT) {
            let body: String = script.text().collect();
            if !has_marker(&body) {
                continue;
            }
            let unescaped = body.replace("\\/", "/");
            found.extend(
                MANIFEST_URL_RE
                    .find_iter(&unescaped)
                    .map(|m| m.as_str().to_string()),
            );
        }
        found
    }
}
