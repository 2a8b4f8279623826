// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use regex::Regex;
use tracing::warn;

/// 关键词匹配器
///
/// 每个关键词编译为一次不区分大小写的整词匹配，任一关键词命中即匹配（OR 语义）。
/// 这样 "Team A vs Team B" 里单独出现任一球队名的页面也会被选中。
#[derive(Debug, Clone, Default)]
pub struct KeywordMatcher {
    patterns: Vec<Regex>,
}

impl KeywordMatcher {
    /// 编译关键词，空白关键词被忽略
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Self {
        let patterns = keywords
            .iter()
            .map(|k| k.as_ref().trim())
            .filter(|k| !k.is_empty())
            .filter_map(|k| {
                let pattern = format!(r"(?i)\b{}\b", regex::escape(&k.to_lowercase()));
                match Regex::new(&pattern) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        warn!("Skipping keyword {:?}: {}", k, e);
                        None
                    }
                }
            })
            .collect();

        Self { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// 文本是否匹配任一关键词
    ///
    /// 文本为空或没有关键词时返回 false
    pub fn matches(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        self.patterns.iter().any(|re| re.is_match(text))
    }
}

/// 一次性匹配，等价于 `KeywordMatcher::new(keywords).matches(text)`
pub fn matches<S: AsRef<str>>(text: &str, keywords: &[S]) -> bool {
    KeywordMatcher::new(keywords).matches(text)
}
