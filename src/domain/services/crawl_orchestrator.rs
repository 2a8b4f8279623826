// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::Settings;
use crate::domain::models::candidate::{CandidatePage, LinkKind};
use crate::domain::models::progress::{ProgressSender, ProgressSnapshot, StopSignal};
use crate::domain::models::scrape_result::ScrapeResult;
use crate::domain::services::link_classifier::{
    classify_page, detect_sport, extract_team_names, find_team_tag_links, page_title,
    DEFAULT_SPORT,
};
use crate::domain::services::mirror_scraper::MirrorScraper;
use crate::domain::services::site_discovery::SiteDiscovery;
use crate::engines::traits::PageFetcher;
use crate::utils::errors::SiteCrawlError;
use crate::utils::url_utils::normalize_target;
use futures::FutureExt;
use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// 单个站点的处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    Discovering,
    ExtractingTeams,
    DeepScraping,
    TeamExpansion,
    Done,
}

/// 进度计数
///
/// `processed` 每处理一个页面加一，跨站点累计；`total` 是目标站点数
struct ProgressTracker {
    sender: Option<ProgressSender>,
    processed: usize,
    total: usize,
}

impl ProgressTracker {
    fn emit(&self, snapshot: ProgressSnapshot) {
        if let Some(sender) = &self.sender {
            if sender.send(snapshot).is_err() {
                debug!("Progress receiver dropped");
            }
        }
    }

    fn page_done(&mut self, domain: &str, page: &str, results: &[ScrapeResult]) {
        self.processed += 1;
        self.emit(ProgressSnapshot {
            processed: self.processed,
            total: self.total,
            current_domain: domain.to_string(),
            current_page: Some(page.to_string()),
            found: results.iter().map(|r| r.source_urls.len()).sum(),
            error: None,
        });
    }

    fn site_failed(&mut self, domain: &str, error: &SiteCrawlError) {
        self.processed += 1;
        self.emit(ProgressSnapshot {
            processed: self.processed,
            total: self.total,
            current_domain: domain.to_string(),
            current_page: None,
            found: 0,
            error: Some(error.to_string()),
        });
    }
}

/// 单个站点一次运行的状态
struct SiteRun {
    target: String,
    home: String,
    phase: CrawlPhase,
    teams: Vec<String>,
    match_pages: Vec<String>,
    sport: String,
}

impl SiteRun {
    fn new(target: &str, home: String) -> Self {
        Self {
            target: target.to_string(),
            home,
            phase: CrawlPhase::Discovering,
            teams: Vec::new(),
            match_pages: Vec::new(),
            sport: DEFAULT_SPORT.to_string(),
        }
    }

    fn enter(&mut self, phase: CrawlPhase) {
        debug!(domain = %self.home, "{:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }
}

/// 多站点抓取编排器
///
/// 站点之间严格串行；每个站点依次经历发现、提取球队、深度抓取、
/// 球队页扩展四个阶段。单个站点的失败只影响该站点。
pub struct CrawlOrchestrator {
    fetcher: Arc<dyn PageFetcher>,
    discovery: SiteDiscovery,
    scraper: MirrorScraper,
    request_delay: Duration,
    probe_delay: Duration,
    max_pages_per_site: usize,
    guess_team_pages: bool,
}

impl CrawlOrchestrator {
    pub fn new(fetcher: Arc<dyn PageFetcher>, settings: &Settings) -> Self {
        Self {
            discovery: SiteDiscovery::new(fetcher.clone(), settings),
            scraper: MirrorScraper::new(fetcher.clone(), settings),
            fetcher,
            request_delay: settings.scraper.request_delay(),
            probe_delay: settings.scraper.frame_delay(),
            max_pages_per_site: settings.limits.max_pages_per_site,
            guess_team_pages: settings.scraper.guess_team_pages,
        }
    }

    /// 抓取一批目标站点
    ///
    /// # 参数
    ///
    /// * `targets` - 目标站点，缺少协议时补 `https://`
    /// * `keywords` - 关键词，为空时全站发现
    /// * `progress` - 进度通道，每处理一个页面发送一次快照
    /// * `stop` - 协作式停止信号，在站点和页面之间检查
    ///
    /// # 返回值
    ///
    /// 所有站点累计的抓取结果；停止时返回已经收集的部分
    pub async fn scrape(
        &self,
        targets: &[String],
        keywords: &[String],
        progress: Option<ProgressSender>,
        stop: &StopSignal,
    ) -> Vec<ScrapeResult> {
        let mut results = Vec::new();
        let mut tracker = ProgressTracker {
            sender: progress,
            processed: 0,
            total: targets.len(),
        };

        info!("Starting crawl of {} site(s)", targets.len());
        for target in targets {
            if stop.is_stopped() {
                info!("Stop requested, skipping remaining sites");
                break;
            }

            let outcome = AssertUnwindSafe(self.crawl_site(
                target,
                keywords,
                &mut results,
                &mut tracker,
                stop,
            ))
            .catch_unwind()
            .await;

            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e),
                Err(payload) => Some(SiteCrawlError::Panicked(panic_message(payload))),
            };
            if let Some(e) = failure {
                error!(domain = %target, "Site crawl failed: {}", e);
                tracker.site_failed(target, &e);
            }
        }

        self.fetcher.release().await;
        info!("Crawl finished with {} result(s)", results.len());
        results
    }

    #[instrument(skip_all, fields(domain = %target))]
    async fn crawl_site(
        &self,
        target: &str,
        keywords: &[String],
        results: &mut Vec<ScrapeResult>,
        tracker: &mut ProgressTracker,
        stop: &StopSignal,
    ) -> Result<(), SiteCrawlError> {
        let home = normalize_target(target)?;
        let mut run = SiteRun::new(target, home);

        let mut candidates = self.discovery.discover(&run.home, keywords).await;
        if candidates.is_empty() {
            debug!("No candidate pages, falling back to the home page");
            candidates.push(CandidatePage::new(run.home.clone(), classify_page(&run.home)));
        }
        candidates.truncate(self.max_pages_per_site);

        run.enter(CrawlPhase::ExtractingTeams);
        let mut seen_teams = HashSet::new();
        for candidate in &candidates {
            let teams = self.team_names(candidate).await;
            if !teams.is_empty() {
                run.teams
                    .extend(teams.into_iter().filter(|t| seen_teams.insert(t.clone())));
                run.match_pages.push(candidate.url.clone());
            }
            let sport = detect_sport(&candidate.url);
            if sport != DEFAULT_SPORT {
                run.sport = sport;
            }
        }

        run.enter(CrawlPhase::DeepScraping);
        for page in candidates.iter().map(|c| c.url.as_str()) {
            if stop.is_stopped() {
                info!("Stop requested, leaving {}", run.home);
                return Ok(());
            }
            let page_results = self.scraper.deep_scrape(page, &run.home).await;
            tracker.page_done(&run.target, page, &page_results);
            results.extend(page_results);
            tokio::time::sleep(self.request_delay).await;
        }

        if !run.teams.is_empty() {
            run.enter(CrawlPhase::TeamExpansion);
            self.expand_teams(&run, results, tracker, stop).await;
        }

        run.enter(CrawlPhase::Done);
        Ok(())
    }

    /// 提取页面对应的球队名
    ///
    /// 地址中没有 "A-vs-B" 时，赛事页再读取页面标题
    async fn team_names(&self, candidate: &CandidatePage) -> Vec<String> {
        let teams = extract_team_names(&candidate.url, "");
        if !teams.is_empty() || candidate.kind != LinkKind::Event {
            return teams;
        }
        match self.fetcher.fetch(&candidate.url).await {
            Some(html) => extract_team_names(&candidate.url, &page_title(&html)),
            None => Vec::new(),
        }
    }

    /// 抓取比赛页上链接的球队标签页
    async fn expand_teams(
        &self,
        run: &SiteRun,
        results: &mut Vec<ScrapeResult>,
        tracker: &mut ProgressTracker,
        stop: &StopSignal,
    ) {
        info!(
            "Discovered {} team(s) from {} match page(s)",
            run.teams.len(),
            run.match_pages.len()
        );

        let mut team_pages = Vec::new();
        let mut seen = HashSet::new();
        for match_page in &run.match_pages {
            let (Some(html), Ok(base)) = (self.fetcher.fetch(match_page).await, Url::parse(match_page))
            else {
                continue;
            };
            for url in find_team_tag_links(&html, &base, &run.teams) {
                if seen.insert(url.clone()) {
                    team_pages.push(url);
                }
            }
        }

        if team_pages.is_empty() && self.guess_team_pages {
            team_pages = self.guess_pages(run).await;
        }

        let scraped: HashSet<String> = results.iter().map(|r| r.scraped_url.clone()).collect();
        team_pages.retain(|url| !scraped.contains(url));
        if team_pages.is_empty() {
            return;
        }
        info!("Scraping {} team page(s)", team_pages.len());

        for page in &team_pages {
            if stop.is_stopped() {
                info!("Stop requested, leaving {}", run.home);
                return;
            }
            let page_results = self.scraper.deep_scrape(page, &run.home).await;
            tracker.page_done(&run.target, page, &page_results);

            let mut present: HashSet<String> =
                results.iter().map(|r| r.scraped_url.clone()).collect();
            for result in page_results {
                if present.insert(result.scraped_url.clone()) {
                    results.push(result);
                }
            }
            tokio::time::sleep(self.request_delay).await;
        }
    }

    /// 探测常见的球队页地址，HTTP 200 即视为存在
    ///
    /// 非编号形态每个球队命中一次即停止，编号形态全部收集
    async fn guess_pages(&self, run: &SiteRun) -> Vec<String> {
        let mut found = Vec::new();
        for team in &run.teams {
            for (shape, numbered) in team_page_shapes(&run.sport, team) {
                let url = format!("{}{}", run.home, shape);
                let hit = self
                    .fetcher
                    .probe(&url)
                    .await
                    .is_some_and(|probe| probe.status == 200);
                if hit {
                    debug!("Found team page {}", url);
                    found.push(url);
                    if !numbered {
                        break;
                    }
                } else {
                    tokio::time::sleep(self.probe_delay).await;
                }
            }
        }
        found
    }
}

/// 常见球队页路径，第二项表示是否为编号形态
pub fn team_page_shapes(sport: &str, team: &str) -> Vec<(String, bool)> {
    let mut shapes = vec![
        (format!("/{}/{}-live-stream", sport, team), false),
        (format!("/{}/{}-stream", sport, team), false),
        (format!("/{}/{}-live", sport, team), false),
        (format!("/streams/{}", team), false),
        (format!("/{}/{}", sport, team), false),
        (format!("/{}-live-stream", team), false),
        (format!("/{}-stream", team), false),
        (format!("/{}/stream-{}-live", sport, team), false),
    ];
    shapes.extend((1..=5).map(|n| (format!("/{}/{}/{}-stream", sport, n, team), true)));
    shapes
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        warn!("Site crawl panicked with a non-string payload");
        "unknown panic".to_string()
    }
}
