// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::Settings;
use crate::domain::models::candidate::{Anchor, CandidatePage};
use crate::domain::services::keyword_matcher::KeywordMatcher;
use crate::domain::services::link_classifier::{
    classify_page, collect_anchors, detect_search_pattern, has_stream_href, is_category_page,
    is_event_link, is_schedule_entry, is_stream_shaped, looks_like_event_url,
};
use crate::engines::traits::PageFetcher;
use crate::utils::url_utils::same_origin;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};
use url::Url;

/// 全站发现时检查的运动类别
const INDEX_SPORTS: [&str; 12] = [
    "soccer",
    "football",
    "basketball",
    "baseball",
    "hockey",
    "mma",
    "boxing",
    "tennis",
    "f1",
    "nfl",
    "nba",
    "nhl",
];

/// 关键词中出现时追加类别页的运动名
const KEYWORD_SPORTS: [&str; 10] = [
    "soccer",
    "football",
    "basketball",
    "baseball",
    "hockey",
    "mma",
    "boxing",
    "tennis",
    "f1",
    "formula",
];

/// 保序去重的地址列表
#[derive(Default)]
struct OrderedUrls {
    seen: HashSet<String>,
    urls: Vec<String>,
}

impl OrderedUrls {
    fn push(&mut self, url: String) {
        if self.seen.insert(url.clone()) {
            self.urls.push(url);
        }
    }

    fn len(&self) -> usize {
        self.urls.len()
    }

    fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    fn into_vec(self) -> Vec<String> {
        self.urls
    }
}

/// 站点候选页面发现
///
/// 无关键词时遍历常见索引页收集赛事链接；有关键词时依次尝试站点搜索、
/// 常见搜索地址、运动类别页和首页，再展开赛程页。
pub struct SiteDiscovery {
    fetcher: Arc<dyn PageFetcher>,
    request_delay: Duration,
    index_delay: Duration,
    max_event_links: usize,
    max_candidates: usize,
    max_schedule_expansions: usize,
}

impl SiteDiscovery {
    pub fn new(fetcher: Arc<dyn PageFetcher>, settings: &Settings) -> Self {
        Self {
            fetcher,
            request_delay: settings.scraper.request_delay(),
            index_delay: settings.scraper.index_delay(),
            max_event_links: settings.limits.max_event_links,
            max_candidates: settings.limits.max_candidates,
            max_schedule_expansions: settings.limits.max_schedule_expansions,
        }
    }

    /// 发现候选页面
    ///
    /// # 参数
    ///
    /// * `home` - 规范化后的站点首页（无末尾 `/`）
    /// * `keywords` - 关键词，为空时进行全站发现
    ///
    /// # 返回值
    ///
    /// 去重后的候选页面，可能为空
    #[instrument(skip(self, keywords), fields(domain = %home))]
    pub async fn discover(&self, home: &str, keywords: &[String]) -> Vec<CandidatePage> {
        let Ok(home_url) = Url::parse(home) else {
            return Vec::new();
        };

        let matcher = KeywordMatcher::new(keywords);
        let pages = if matcher.is_empty() {
            self.discover_all_events(home, &home_url).await
        } else {
            self.discover_with_keywords(home, &home_url, keywords, &matcher)
                .await
        };

        info!("Discovered {} candidate page(s)", pages.len());
        pages
            .into_iter()
            .map(|url| {
                let kind = classify_page(&url);
                CandidatePage::new(url, kind)
            })
            .collect()
    }

    /// 全站发现的索引页列表
    pub fn index_pages(home: &str) -> Vec<String> {
        let mut pages = vec![
            home.to_string(),
            format!("{}/live", home),
            format!("{}/streams", home),
            format!("{}/schedule", home),
            format!("{}/events", home),
        ];
        for sport in INDEX_SPORTS {
            pages.push(format!("{}/{}", home, sport));
            pages.push(format!("{}/{}-streams", home, sport));
            pages.push(format!("{}/streams/{}", home, sport));
        }
        pages
    }

    /// 关键词搜索依次尝试的地址
    ///
    /// 站点自身的搜索入口优先，其次是常见搜索地址和相关运动类别页，最后是首页
    pub fn search_urls(home: &str, keywords: &[String], detected: Option<String>) -> Vec<String> {
        let mut urls = OrderedUrls::default();
        if let Some(url) = detected {
            urls.push(url);
        }

        let query = keywords
            .iter()
            .map(|k| urlencoding::encode(k.trim()).into_owned())
            .collect::<Vec<_>>()
            .join("+");
        urls.push(format!("{}/search?q={}", home, query));
        urls.push(format!("{}/?s={}", home, query));
        urls.push(format!("{}/search?query={}", home, query));
        urls.push(format!("{}/search/{}", home, query));
        urls.push(format!("{}/?search={}", home, query));

        for keyword in keywords {
            let keyword = keyword.to_lowercase();
            for sport in KEYWORD_SPORTS.iter().filter(|s| keyword.contains(*s)) {
                urls.push(format!("{}/{}", home, sport));
                urls.push(format!("{}/{}-streams", home, sport));
                urls.push(format!("{}/streams/{}", home, sport));
            }
        }

        urls.push(home.to_string());
        urls.into_vec()
    }

    async fn discover_all_events(&self, home: &str, home_url: &Url) -> Vec<String> {
        let mut events = OrderedUrls::default();

        for page in Self::index_pages(home) {
            let Some(html) = self.fetcher.fetch(&page).await else {
                continue;
            };
            let base = Url::parse(&page).unwrap_or_else(|_| home_url.clone());

            for anchor in collect_anchors(&html, &base) {
                if is_event_link(&anchor)
                    && is_same_site(&anchor, home_url)
                    && !is_category_page(&anchor.url)
                {
                    events.push(anchor.url);
                }
            }

            tokio::time::sleep(self.index_delay).await;

            if events.len() >= self.max_event_links {
                debug!("Found {} event links, stopping discovery", events.len());
                break;
            }
        }

        let mut events = events.into_vec();
        events.truncate(self.max_event_links);
        events
    }

    async fn discover_with_keywords(
        &self,
        home: &str,
        home_url: &Url,
        keywords: &[String],
        matcher: &KeywordMatcher,
    ) -> Vec<String> {
        let home_html = self.fetcher.fetch(home).await;
        let detected = home_html
            .as_deref()
            .and_then(|html| detect_search_pattern(html, home_url))
            .map(|pattern| {
                debug!("Using detected search endpoint {}?{}=", pattern.url, pattern.param);
                pattern.query_url(&keywords.join(" "))
            });

        let mut found = OrderedUrls::default();
        for candidate in Self::search_urls(home, keywords, detected) {
            let html = if candidate == home {
                home_html.clone()
            } else {
                self.fetcher.fetch(&candidate).await
            };
            let Some(html) = html else {
                continue;
            };
            let base = Url::parse(&candidate).unwrap_or_else(|_| home_url.clone());

            for anchor in collect_anchors(&html, &base) {
                if matcher.matches(&anchor.combined_text())
                    && is_stream_shaped(&anchor)
                    && is_same_site(&anchor, home_url)
                {
                    found.push(anchor.url);
                }
            }

            if !found.is_empty() {
                debug!("{} keyword match(es) at {}", found.len(), candidate);
                break;
            }
            tokio::time::sleep(self.request_delay).await;
        }

        if found.is_empty() {
            debug!("No strict matches, retrying the home page leniently");
            if let Some(html) = self.fetcher.fetch(home).await {
                for anchor in collect_anchors(&html, home_url) {
                    if has_stream_href(&anchor)
                        && matcher.matches(&anchor.text)
                        && is_same_site(&anchor, home_url)
                    {
                        found.push(anchor.url);
                    }
                }
            }
        }

        let mut pages = self
            .expand_schedules(home_url, found.into_vec(), matcher)
            .await;
        pages.truncate(self.max_candidates);
        pages
    }

    /// 展开前几个不像具体赛事的页面
    ///
    /// 页面内找到的赛事链接替换该页面本身，找不到时保留原页面
    async fn expand_schedules(
        &self,
        home_url: &Url,
        pages: Vec<String>,
        matcher: &KeywordMatcher,
    ) -> Vec<String> {
        let mut expanded = OrderedUrls::default();

        for (index, page) in pages.into_iter().enumerate() {
            if index >= self.max_schedule_expansions || looks_like_event_url(&page) {
                expanded.push(page);
                continue;
            }

            debug!("Checking for events in {}", page);
            let entries: Vec<String> = match self.fetcher.fetch(&page).await {
                Some(html) => {
                    let base = Url::parse(&page).unwrap_or_else(|_| home_url.clone());
                    collect_anchors(&html, &base)
                        .into_iter()
                        .filter(|anchor| {
                            is_schedule_entry(anchor)
                                && is_same_site(anchor, home_url)
                                && matcher.matches(&anchor.combined_text())
                        })
                        .map(|anchor| anchor.url)
                        .collect()
                }
                None => Vec::new(),
            };

            if entries.is_empty() {
                expanded.push(page);
            } else {
                debug!("Collected {} event page(s) from {}", entries.len(), page);
                entries.into_iter().for_each(|url| expanded.push(url));
            }

            tokio::time::sleep(self.index_delay).await;
        }

        expanded.into_vec()
    }
}

fn is_same_site(anchor: &Anchor, home: &Url) -> bool {
    Url::parse(&anchor.url)
        .map(|u| same_origin(&u, home))
        .unwrap_or(false)
}
