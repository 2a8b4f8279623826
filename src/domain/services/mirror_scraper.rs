// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::Settings;
use crate::domain::models::candidate::StreamLink;
use crate::domain::models::scrape_result::{ScrapeResult, DEFAULT_SERVER_LABEL};
use crate::domain::services::extraction::ManifestExtractor;
use crate::domain::services::frame_walker::FrameWalker;
use crate::domain::services::link_classifier::find_stream_server_links;
use crate::engines::traits::PageFetcher;
use futures::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use url::Url;

pub const MAIN_PAGE_LABEL: &str = "Main Page";
pub const BROWSER_RENDER_LABEL: &str = "Browser Render";
pub const NO_STREAMS_LABEL: &str = "No streams found";

/// 镜像扇出抓取器
///
/// 抓取一个页面本身，再并发遍历页面上的所有镜像链接，必要时退回浏览器渲染。
/// 对任何页面都至少返回一条结果。
pub struct MirrorScraper {
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<ManifestExtractor>,
    walker: FrameWalker,
    max_mirrors: usize,
    verify_manifests: bool,
}

impl MirrorScraper {
    pub fn new(fetcher: Arc<dyn PageFetcher>, settings: &Settings) -> Self {
        let extractor = Arc::new(ManifestExtractor::new());
        Self {
            walker: FrameWalker::new(fetcher.clone(), extractor.clone(), settings),
            fetcher,
            extractor,
            max_mirrors: settings.limits.max_mirrors,
            verify_manifests: settings.scraper.verify_manifests,
        }
    }

    /// 深度抓取一个页面
    ///
    /// # 参数
    ///
    /// * `page_url` - 页面地址
    /// * `domain` - 所属目标站点
    ///
    /// # 返回值
    ///
    /// 本页、各镜像及渲染兜底的结果；没有任何发现时包含一条
    /// "No streams found" 占位结果
    #[instrument(skip(self), fields(url = %page_url))]
    pub async fn deep_scrape(&self, page_url: &str, domain: &str) -> Vec<ScrapeResult> {
        let Ok(base) = Url::parse(page_url) else {
            return vec![ScrapeResult::failed(
                page_url,
                domain,
                DEFAULT_SERVER_LABEL,
                Some(format!("Invalid page url: {}", page_url)),
            )];
        };

        let mut results = Vec::new();
        let html = self.fetcher.fetch(page_url).await.unwrap_or_default();

        let main = self.verify(self.extractor.extract(&html, &base)).await;
        if !main.is_empty() {
            results.push(ScrapeResult::new(page_url, domain, MAIN_PAGE_LABEL, main));
        }

        let mut mirrors = find_stream_server_links(&html, &base);
        mirrors.truncate(self.max_mirrors);
        if !mirrors.is_empty() {
            info!("Found {} stream server link(s), scraping in parallel", mirrors.len());
            let scraped = join_all(mirrors.iter().map(|link| self.scrape_mirror(link, domain))).await;
            results.extend(scraped);
        }

        if !results.iter().any(|r| r.success) && self.fetcher.rendering_available() {
            debug!("Nothing found statically, rendering {}", page_url);
            if let Some(rendered) = self.fetcher.fetch_rendered(page_url).await {
                let found = self.verify(self.extractor.extract(&rendered, &base)).await;
                if !found.is_empty() {
                    results.push(ScrapeResult::new(page_url, domain, BROWSER_RENDER_LABEL, found));
                }
            }
        }

        if !results.iter().any(|r| r.success) {
            results.push(ScrapeResult::failed(page_url, domain, NO_STREAMS_LABEL, None));
        }
        results
    }

    /// 遍历单个镜像，遍历无果时退回一次非递归提取
    async fn scrape_mirror(&self, link: &StreamLink, domain: &str) -> ScrapeResult {
        debug!("Scraping mirror {} ({})", link.label, link.url);

        let mut found = self.walker.walk(&link.url).await;
        if found.is_empty() {
            if let (Some(html), Ok(base)) =
                (self.fetcher.fetch(&link.url).await, Url::parse(&link.url))
            {
                found = self.extractor.extract(&html, &base);
            }
        }

        let found = self.verify(found).await;
        if found.is_empty() {
            debug!("No manifest for {}", link.label);
        }
        ScrapeResult::new(&link.url, domain, &link.label, found)
    }

    /// 单页抓取，不递归也不遍历镜像
    pub async fn scrape_page(&self, page_url: &str, domain: &str) -> ScrapeResult {
        let Ok(base) = Url::parse(page_url) else {
            return ScrapeResult::failed(
                page_url,
                domain,
                DEFAULT_SERVER_LABEL,
                Some(format!("Invalid page url: {}", page_url)),
            );
        };

        match self.fetcher.fetch(page_url).await {
            Some(html) => {
                let found = self.verify(self.extractor.extract(&html, &base)).await;
                ScrapeResult::new(page_url, domain, DEFAULT_SERVER_LABEL, found)
            }
            None => ScrapeResult::failed(
                page_url,
                domain,
                DEFAULT_SERVER_LABEL,
                Some("Failed to fetch page".to_string()),
            ),
        }
    }

    /// 按配置用 HEAD 请求过滤 m3u8
    async fn verify(&self, manifests: BTreeSet<String>) -> BTreeSet<String> {
        if !self.verify_manifests || manifests.is_empty() {
            return manifests;
        }

        let checks = manifests.into_iter().map(|url| async move {
            let accepted = match self.fetcher.probe(&url).await {
                Some(probe) if probe.is_success() => {
                    let content_type = probe.content_type.unwrap_or_default().to_lowercase();
                    content_type.contains("mpegurl")
                        || content_type.contains("m3u8")
                        || Url::parse(&url).is_ok_and(|u| u.path().ends_with(".m3u8"))
                }
                _ => false,
            };
            accepted.then_some(url)
        });

        join_all(checks).await.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::services::test_support::StaticSite;
    use crate::engines::traits::ProbeResponse;
    use async_trait::async_trait;
    use mockall::mock;

    const DOMAIN: &str = "https://s.test";

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.scraper.frame_delay_ms = 0;
        settings
    }

    fn scraper(site: Arc<StaticSite>) -> MirrorScraper {
        MirrorScraper::new(site, &settings())
    }

    #[tokio::test]
    async fn test_main_page_result() {
        let site = Arc::new(StaticSite::new().page(
            "https://s.test/m",
            r#"<video src="https://cdn.test/main.m3u8"></video>"#,
        ));

        let results = scraper(site).deep_scrape("https://s.test/m", DOMAIN).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].server_label, MAIN_PAGE_LABEL);
        assert!(results[0].success);
        assert_eq!(results[0].domain_index_url, DOMAIN);
    }

    #[tokio::test]
    async fn test_mirrors_get_independent_visited_sets() {
        // Both mirrors embed the same player; each must discover it
        let site = Arc::new(
            StaticSite::new()
                .page(
                    "https://s.test/m",
                    r#"<a href="/l1">Link 1</a><a href="/l2">Link 2</a>"#,
                )
                .page("https://s.test/l1", r#"<iframe src="/player"></iframe>"#)
                .page("https://s.test/l2", r#"<iframe src="/player"></iframe>"#)
                .page("https://s.test/player", "https://cdn.test/shared.m3u8"),
        );

        let results = scraper(site).deep_scrape("https://s.test/m", DOMAIN).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
        assert!(results
            .iter()
            .all(|r| r.source_urls.contains("https://cdn.test/shared.m3u8")));
    }

    #[tokio::test]
    async fn test_mirror_cap() {
        let anchors: String = (1..=25)
            .map(|i| format!(r#"<a href="/l{}">Link {}</a>"#, i, i))
            .collect();
        let site = Arc::new(StaticSite::new().page("https://s.test/m", &anchors));

        let results = scraper(site).deep_scrape("https://s.test/m", DOMAIN).await;
        let mirror_results = results
            .iter()
            .filter(|r| r.server_label.starts_with("Link"))
            .count();
        assert_eq!(mirror_results, 20);
    }

    #[tokio::test]
    async fn test_never_empty_for_unreachable_page() {
        let site = Arc::new(StaticSite::new());

        let results = scraper(site).deep_scrape("https://s.test/gone", DOMAIN).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].scraped_url, "https://s.test/gone");
        assert_eq!(results[0].server_label, NO_STREAMS_LABEL);
        assert!(!results[0].success);
        assert!(results[0].source_urls.is_empty());
    }

    #[tokio::test]
    async fn test_browser_render_fallback() {
        let site = Arc::new(
            StaticSite::new()
                .page("https://s.test/js", "<div id=player></div>")
                .rendered(
                    "https://s.test/js",
                    r#"<div id=player><video src="https://cdn.test/late.m3u8"></video></div>"#,
                ),
        );

        let results = scraper(site.clone()).deep_scrape("https://s.test/js", DOMAIN).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].server_label, BROWSER_RENDER_LABEL);
        assert_eq!(site.render_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_scrape_page_single_shot() {
        let site = Arc::new(
            StaticSite::new()
                .page("https://s.test/one", "https://cdn.test/one.m3u8")
                .page("https://s.test/none", "<p>nothing</p>"),
        );
        let scraper = scraper(site);

        let hit = scraper.scrape_page("https://s.test/one", DOMAIN).await;
        assert!(hit.success);
        assert_eq!(hit.server_label, DEFAULT_SERVER_LABEL);

        let miss = scraper.scrape_page("https://s.test/none", DOMAIN).await;
        assert!(!miss.success);
        assert!(miss.error.is_none());

        let gone = scraper.scrape_page("https://s.test/gone", DOMAIN).await;
        assert!(gone.error.is_some());
    }

    #[tokio::test]
    async fn test_verification_filters_unreachable_manifests() {
        let site = Arc::new(
            StaticSite::new()
                .page(
                    "https://s.test/m",
                    r#"https://cdn.test/ok.m3u8 https://cdn.test/dead.m3u8 https://cdn.test/typed.m3u8?x=1"#,
                )
                .head("https://cdn.test/ok.m3u8", 200, None)
                .head(
                    "https://cdn.test/typed.m3u8?x=1",
                    200,
                    Some("application/vnd.apple.mpegurl"),
                ),
        );
        let mut settings = settings();
        settings.scraper.verify_manifests = true;

        let results = MirrorScraper::new(site, &settings)
            .deep_scrape("https://s.test/m", DOMAIN)
            .await;
        let sources: Vec<&str> = results[0].source_urls.iter().map(String::as_str).collect();
        assert_eq!(
            sources,
            vec!["https://cdn.test/ok.m3u8", "https://cdn.test/typed.m3u8?x=1"]
        );
    }

    mock! {
        pub Fetcher {}

        #[async_trait]
        impl PageFetcher for Fetcher {
            async fn fetch(&self, url: &str) -> Option<String>;
            async fn fetch_rendered(&self, url: &str) -> Option<String>;
            fn rendering_available(&self) -> bool;
            async fn probe(&self, url: &str) -> Option<ProbeResponse>;
            async fn release(&self);
        }
    }

    #[tokio::test]
    async fn test_no_render_when_rendering_unavailable() {
        let mut fetcher = MockFetcher::new();
        fetcher
            .expect_fetch()
            .returning(|_| Some("<p>static only</p>".to_string()));
        fetcher.expect_rendering_available().return_const(false);
        fetcher.expect_fetch_rendered().never();

        let scraper = MirrorScraper::new(Arc::new(fetcher), &settings());
        let results = scraper.deep_scrape("https://s.test/m", DOMAIN).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].server_label, NO_STREAMS_LABEL);
    }

    #[tokio::test]
    async fn test_mirror_falls_back_to_direct_extraction() {
        // Walk fails on first fetch of the mirror, the direct retry succeeds
        let mut fetcher = MockFetcher::new();
        let mut mirror_calls = 0;
        fetcher.expect_fetch().returning(move |url| match url {
            "https://s.test/m" => Some(r#"<a href="/l1">Link 1</a>"#.to_string()),
            "https://s.test/l1" => {
                mirror_calls += 1;
                (mirror_calls > 1).then(|| "https://cdn.test/retry.m3u8".to_string())
            }
            _ => None,
        });
        fetcher.expect_rendering_available().return_const(false);

        let scraper = MirrorScraper::new(Arc::new(fetcher), &settings());
        let results = scraper.deep_scrape("https://s.test/m", DOMAIN).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].server_label, "Link 1");
        assert!(results[0].source_urls.contains("https://cdn.test/retry.m3u8"));
    }
}
