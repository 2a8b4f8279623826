// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 链接分类
//!
//! 所有函数都是同步的：`scraper::Html` 不是 `Send`，解析结果只在函数内部使用，
//! 返回值都是自有数据。

use crate::domain::models::candidate::{Anchor, LinkKind, MirrorKind, StreamLink};
use crate::utils::url_utils::{resolve_http, same_origin};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("Failed to compile selector")
}

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("Failed to compile classifier regex")
}

static ANCHOR: Lazy<Selector> = Lazy::new(|| selector("a[href]"));
static LINK_BUTTON: Lazy<Selector> = Lazy::new(|| selector("a, button"));
static DATA_URI: Lazy<Selector> = Lazy::new(|| selector(r#"a[data-uri*="stream"]"#));
static CHANNEL_ANCHOR: Lazy<Selector> =
    Lazy::new(|| selector(r#"a[href*="watch.php"], a[href*="stream"]"#));
static FRAME: Lazy<Selector> = Lazy::new(|| selector("iframe[src], frame[src], iframe[data-src]"));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));
static HEADING: Lazy<Selector> = Lazy::new(|| selector("h1"));
static SEARCH_ENTRY: Lazy<Selector> = Lazy::new(|| {
    selector(r#"form[action*="search"], form[role="search"], input[type="search"]"#)
});
static SEARCH_INPUT: Lazy<Selector> = Lazy::new(|| {
    selector(r#"input[type="search"], input[name*="search"], input[name="q"], input[name="s"]"#)
});
static SEARCH_LINK: Lazy<Selector> =
    Lazy::new(|| selector(r#"a[href*="search"], a[href*="?s="], a[href*="?q="]"#));
static ALL_ELEMENTS: Lazy<Selector> = Lazy::new(|| selector("body *"));

static VERSUS_WORD: Lazy<Regex> = Lazy::new(|| regex(r"(?i)\b(?:vs|v)\b"));
static TIME_OF_DAY: Lazy<Regex> = Lazy::new(|| regex(r"\d{1,2}:\d{2}"));
static DAY_MONTH: Lazy<Regex> = Lazy::new(|| regex(r"\d{2}/\d{2}"));
static MERIDIEM: Lazy<Regex> = Lazy::new(|| regex(r"(?i)\b\d{0,2}\s?(?:am|pm)\b"));
static EVENT_URL: Lazy<Regex> =
    Lazy::new(|| regex(r"(?i)\d{4}-\d{2}-\d{2}|vs-|\d+pm|\d+am|live-"));
static CATEGORY_PATH: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        regex(
            r"(?i)/(?:soccer|football|basketball|baseball|hockey|mma|boxing|tennis|f1|nfl|nba|nhl)(?:-streams?)?/?$",
        ),
        regex(r"(?i)/(?:streams?|live|schedules?|events?)/?$"),
    ]
});
static NUMBERED_LINK: Lazy<Regex> = Lazy::new(|| regex(r"(?i)link\s*\d+"));
static DIGIT: Lazy<Regex> = Lazy::new(|| regex(r"\d+"));
static BROADCASTER: Lazy<Regex> =
    Lazy::new(|| regex(r"(?i)DAZN|ESPN|SKY|BT SPORT|BEIN|TNT|NBC|FOX|CBS|CHANNEL"));
static CHANNEL_HREF: Lazy<Regex> = Lazy::new(|| regex(r"(?i)id=\d+|stream-\d+"));
static CHANNEL_ID: Lazy<Regex> = Lazy::new(|| regex(r"(?i)ID:\s*(\d+)"));
static TEAMS_IN_PATH: Lazy<Regex> =
    Lazy::new(|| regex(r"([a-z0-9-]+)-(?:vs?|versus)-([a-z0-9-]+)"));
static TEAMS_IN_TITLE: Lazy<Regex> = Lazy::new(|| {
    regex(r"(?i)(.+?)\s+(?:vs?\.?|versus|-)\s+(.+?)(?:\s+live|\s+stream|$)")
});
static TEAM_PREFIX: Lazy<Regex> = Lazy::new(|| regex(r"^(?:live-|watch-|stream-)"));
static TEAM_SUFFIX: Lazy<Regex> = Lazy::new(|| regex(r"(?:-live-stream|-live|-stream|-watch)$"));
static SPORT_SLUG: Lazy<Regex> = Lazy::new(|| {
    regex(
        r"serie-a|premier-league|la-liga|bundesliga|ligue-1|nba|nfl|nhl|mma|boxing|tennis|f1|soccer|football|basketball|baseball|hockey",
    )
});

/// 默认运动类别
pub const DEFAULT_SPORT: &str = "soccer";

fn collapse_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// 收集页面中所有可解析为 http(s) 的锚点
pub fn collect_anchors(html: &str, base: &Url) -> Vec<Anchor> {
    let document = Html::parse_document(html);
    document
        .select(&ANCHOR)
        .filter_map(|el| {
            let href = el.value().attr("href")?.trim();
            if href.is_empty() || href.starts_with('#') {
                return None;
            }
            let url = resolve_http(base, href)?;
            Some(Anchor {
                href: href.to_string(),
                url: url.to_string(),
                text: collapse_text(&el),
                title: el.value().attr("title").unwrap_or_default().trim().to_string(),
            })
        })
        .collect()
}

/// 页面标题，缺失时退回第一个 h1
pub fn page_title(html: &str) -> String {
    let document = Html::parse_document(html);
    document
        .select(&TITLE)
        .chain(document.select(&HEADING))
        .map(|el| collapse_text(&el))
        .find(|t| !t.is_empty())
        .unwrap_or_default()
}

/// 全站发现时的事件链接判断
///
/// href 含 stream/watch/live/event，或文本含整词 vs/v、时间、日期
pub fn is_event_link(anchor: &Anchor) -> bool {
    let href = anchor.href.to_lowercase();
    let text = anchor.combined_text();
    contains_any(&href, &["stream", "watch", "live", "event"])
        || VERSUS_WORD.is_match(&text)
        || TIME_OF_DAY.is_match(&text)
        || DAY_MONTH.is_match(&text)
}

/// 关键词模式下的流媒体形态判断
pub fn is_stream_shaped(anchor: &Anchor) -> bool {
    let href = anchor.href.to_lowercase();
    let text = anchor.combined_text().to_lowercase();
    contains_any(&href, &["stream", "watch", "live", "event"])
        || VERSUS_WORD.is_match(&text)
        || text.contains("live")
}

/// 宽松回退时只看 href 是否像流媒体链接
pub fn has_stream_href(anchor: &Anchor) -> bool {
    contains_any(&anchor.href.to_lowercase(), &["stream", "watch", "live"])
}

/// 赛程页内部的事件链接判断，额外接受 am/pm 时间
pub fn is_schedule_entry(anchor: &Anchor) -> bool {
    let text = anchor.combined_text();
    is_event_link(anchor) || MERIDIEM.is_match(&text)
}

/// 是否为分类/赛程页
pub fn is_category_page(url: &str) -> bool {
    let path = Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string());
    CATEGORY_PATH.iter().any(|re| re.is_match(&path))
}

/// 地址本身是否已经像具体赛事（日期、`vs-`、时间、`live-`）
pub fn looks_like_event_url(url: &str) -> bool {
    EVENT_URL.is_match(&url.to_lowercase())
}

/// 为候选页面打上分类标签
pub fn classify_page(url: &str) -> LinkKind {
    if is_category_page(url) {
        LinkKind::Category
    } else {
        LinkKind::Event
    }
}

/// 查找镜像/服务器链接
///
/// 依次尝试五种识别方式，按 URL 去重，先识别者优先，保持文档顺序
pub fn find_stream_server_links(html: &str, base: &Url) -> Vec<StreamLink> {
    let document = Html::parse_document(html);
    let mut links: Vec<StreamLink> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    let mut push = |url: Option<Url>, label: String, kind: MirrorKind| {
        if let Some(url) = url {
            let url = url.to_string();
            if seen.insert(url.clone()) {
                links.push(StreamLink::new(url, label, kind));
            }
        }
    };

    // "Link 1", "Link 2" buttons
    for el in document.select(&LINK_BUTTON) {
        let text = collapse_text(&el);
        if !NUMBERED_LINK.is_match(&text) {
            continue;
        }
        let attrs = el.value();
        let target = attrs
            .attr("href")
            .or_else(|| attrs.attr("data-url"))
            .or_else(|| attrs.attr("data-src"));
        if let Some(target) = target {
            push(resolve_http(base, target), text, MirrorKind::NumberedLink);
        }
    }

    // data-uri carrying the stream location
    for (i, el) in document.select(&DATA_URI).enumerate() {
        if let Some(uri) = el.value().attr("data-uri") {
            let text = collapse_text(&el);
            let label = if text.is_empty() {
                format!("Stream {}", i + 1)
            } else {
                text
            };
            push(resolve_http(base, uri), label, MirrorKind::DataUri);
        }
    }

    // stream/server/watch text with a number or quality marker
    for el in document.select(&ANCHOR) {
        let text = collapse_text(&el);
        let lower = text.to_lowercase();
        let named = contains_any(&lower, &["stream", "server", "watch"]);
        let marked = DIGIT.is_match(&lower) || contains_any(&lower, &["hd", "sd"]);
        if named && marked {
            if let Some(href) = el.value().attr("href") {
                push(resolve_http(base, href), text, MirrorKind::TextMatch);
            }
        }
    }

    // Broadcaster channels, watch.php?id=N
    for (i, el) in document.select(&CHANNEL_ANCHOR).enumerate() {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let text = collapse_text(&el);
        if BROADCASTER.is_match(&text) || CHANNEL_HREF.is_match(href) {
            let label = if text.is_empty() {
                format!("Channel {}", i + 1)
            } else {
                text
            };
            push(resolve_http(base, href), label, MirrorKind::Channel);
        }
    }

    // "ID: 123" rows paired with the nearest link
    for el in document.select(&ALL_ELEMENTS) {
        let own_text: String = el
            .children()
            .filter_map(|child| child.value().as_text().map(|t| t.to_string()))
            .collect();
        let Some(caps) = CHANNEL_ID.captures(&own_text) else {
            continue;
        };
        let Some(channel_id) = caps.get(1).map(|m| m.as_str().to_string()) else {
            continue;
        };

        let label = own_text
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Channel {}", channel_id));

        let href = std::iter::once(el)
            .chain(el.ancestors().take(1).filter_map(ElementRef::wrap))
            .find_map(|scope| {
                scope
                    .select(&ANCHOR)
                    .next()
                    .and_then(|a| a.value().attr("href").map(str::to_string))
            })
            .unwrap_or_else(|| format!("watch.php?id={}", channel_id));

        push(
            resolve_http(base, &href),
            label,
            MirrorKind::IdBased { channel_id },
        );
    }

    links
}

/// 提取嵌套框架地址
///
/// 包括 `iframe[src]`、`frame[src]` 和延迟注入的 `iframe[data-src]`，去重并保持文档顺序
pub fn extract_frame_sources(html: &str, base: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut frames = Vec::new();

    for el in document.select(&FRAME) {
        let attrs = el.value();
        for src in [attrs.attr("src"), attrs.attr("data-src")].into_iter().flatten() {
            if let Some(url) = resolve_http(base, src) {
                let url = url.to_string();
                if seen.insert(url.clone()) {
                    frames.push(url);
                }
            }
        }
    }

    frames
}

fn clean_team(raw: &str) -> String {
    let without_prefix = TEAM_PREFIX.replace(raw, "");
    let without_suffix = TEAM_SUFFIX.replace(&without_prefix, "");
    without_suffix.trim_matches('/').trim().to_string()
}

/// 从页面地址或标题中提取球队名
///
/// 优先使用路径中的 `a-vs-b` 形态，否则解析 "A vs B live" 形式的标题。
/// 结果为小写连字符形式，长度不超过 2 的名称被丢弃。
pub fn extract_team_names(page_url: &str, title: &str) -> Vec<String> {
    let path = Url::parse(page_url)
        .map(|u| u.path().to_lowercase())
        .unwrap_or_default();

    let raw: Vec<String> = if let Some(caps) = TEAMS_IN_PATH.captures(&path) {
        [caps.get(1), caps.get(2)]
            .into_iter()
            .flatten()
            .map(|m| m.as_str().to_string())
            .collect()
    } else if let Some(caps) = TEAMS_IN_TITLE.captures(title) {
        [caps.get(1), caps.get(2)]
            .into_iter()
            .flatten()
            .map(|m| {
                m.as_str()
                    .trim()
                    .to_lowercase()
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join("-")
            })
            .collect()
    } else {
        Vec::new()
    };

    raw.iter()
        .map(|team| clean_team(team))
        .filter(|team| team.chars().count() > 2)
        .collect()
}

/// 是否为球队标签链接
///
/// href 或文本包含球队名，href 含 stream/live，且不是 "A vs B" 比赛页本身
pub fn is_team_tag_link(anchor: &Anchor, teams: &[String]) -> bool {
    let href = anchor.href.to_lowercase();
    let text = anchor.text.to_lowercase();

    let streamish = href.contains("stream") || href.contains("live");
    let match_page = href.contains("-vs-") || href.contains(" vs ");
    if !streamish || match_page {
        return false;
    }

    teams.iter().any(|team| {
        let team = team.to_lowercase();
        href.contains(&team) || text.contains(&team) || text.contains(&team.replace('-', " "))
    })
}

/// 在比赛页中查找同源的球队标签链接
pub fn find_team_tag_links(html: &str, page_url: &Url, teams: &[String]) -> Vec<String> {
    if teams.is_empty() {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    collect_anchors(html, page_url)
        .into_iter()
        .filter(|anchor| is_team_tag_link(anchor, teams))
        .filter(|anchor| {
            Url::parse(&anchor.url)
                .map(|u| same_origin(&u, page_url))
                .unwrap_or(false)
        })
        .map(|anchor| anchor.url)
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// 从地址中识别运动类别，默认 `soccer`
pub fn detect_sport(url: &str) -> String {
    SPORT_SLUG
        .find(&url.to_lowercase())
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| DEFAULT_SPORT.to_string())
}

/// 站点原生搜索入口
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPattern {
    /// 搜索地址（绝对）
    pub url: String,
    /// 查询参数名
    pub param: String,
}

impl SearchPattern {
    /// 拼出查询地址
    pub fn query_url(&self, query: &str) -> String {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}{}={}",
            self.url,
            separator,
            self.param,
            urlencoding::encode(query)
        )
    }
}

/// 从首页识别搜索入口
///
/// 先找搜索表单（仅 GET），再找 `?s=` / `?q=` 形态的搜索链接
pub fn detect_search_pattern(html: &str, home: &Url) -> Option<SearchPattern> {
    let document = Html::parse_document(html);

    if let Some(entry) = document.select(&SEARCH_ENTRY).next() {
        let form = if entry.value().name() == "form" {
            Some(entry)
        } else {
            entry
                .ancestors()
                .filter_map(ElementRef::wrap)
                .find(|a| a.value().name() == "form")
        };

        if let Some(form) = form {
            let method = form.value().attr("method").unwrap_or("get");
            let action = form.value().attr("action");
            let param = form
                .select(&SEARCH_INPUT)
                .find_map(|input| input.value().attr("name"))
                .filter(|name| !name.is_empty());

            if method.eq_ignore_ascii_case("get") {
                if let (Some(action), Some(param)) = (action, param) {
                    if let Some(url) = resolve_http(home, action) {
                        return Some(SearchPattern {
                            url: url.to_string(),
                            param: param.to_string(),
                        });
                    }
                }
            }
        }
    }

    let href = document.select(&SEARCH_LINK).next()?.value().attr("href")?;
    let param = if href.contains("?s=") {
        "s"
    } else if href.contains("?q=") {
        "q"
    } else {
        return None;
    };

    let mut url = home.clone();
    url.set_query(None);
    Some(SearchPattern {
        url: url.to_string(),
        param: param.to_string(),
    })
}

#[cfg(test)]
#[path = "link_classifier_test.rs"]
mod tests;
