// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::Settings;
use crate::domain::services::extraction::ManifestExtractor;
use crate::domain::services::link_classifier::extract_frame_sources;
use crate::engines::traits::PageFetcher;
use futures::future::{join_all, BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// 一次递归遍历共享的已访问集合
///
/// 同一棵遍历树中的兄弟框架共享；不同镜像分支各自持有独立的集合
#[derive(Debug, Clone, Default)]
pub struct VisitedSet(Arc<Mutex<HashSet<String>>>);

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 标记为已访问，首次插入时返回 true
    pub fn mark(&self, url: &str) -> bool {
        self.0.lock().insert(url.to_string())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.0.lock().contains(url)
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}

/// 递归框架遍历器
///
/// 抓取页面、提取 m3u8、发现嵌套框架并递归。深度上限和已访问集合
/// 共同保证在任意循环或深层嵌套的框架图上终止。
pub struct FrameWalker {
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<ManifestExtractor>,
    max_depth: usize,
    fanout: usize,
    frame_delay: Duration,
}

impl FrameWalker {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<ManifestExtractor>,
        settings: &Settings,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            max_depth: settings.limits.max_frame_depth,
            fanout: settings.limits.max_frame_fanout,
            frame_delay: settings.scraper.frame_delay(),
        }
    }

    /// 以新的已访问集合从深度 0 开始遍历
    pub async fn walk(&self, url: &str) -> BTreeSet<String> {
        self.walk_from(url.to_string(), 0, VisitedSet::new()).await
    }

    /// 从指定深度继续遍历
    ///
    /// # 参数
    ///
    /// * `url` - 页面地址
    /// * `depth` - 当前深度
    /// * `visited` - 本次遍历树共享的已访问集合
    ///
    /// # 返回值
    ///
    /// 本页及所有可达框架中发现的 m3u8 地址（去重）
    pub fn walk_from(
        &self,
        url: String,
        depth: usize,
        visited: VisitedSet,
    ) -> BoxFuture<'_, BTreeSet<String>> {
        async move {
            if depth > self.max_depth || !visited.mark(&url) {
                return BTreeSet::new();
            }

            let Some(html) = self.fetcher.fetch(&url).await else {
                return BTreeSet::new();
            };
            let Ok(base) = Url::parse(&url) else {
                return BTreeSet::new();
            };

            let mut found = self.extractor.extract(&html, &base);
            if !found.is_empty() {
                debug!(depth, url = %url, "Found {} manifest(s)", found.len());
            }

            let frames = extract_frame_sources(&html, &base);
            if frames.is_empty() {
                return found;
            }
            debug!(depth, url = %url, "Descending into {} frame(s)", frames.len().min(self.fanout));

            let branches = frames.into_iter().take(self.fanout).map(|frame| {
                let visited = visited.clone();
                async move {
                    tokio::time::sleep(self.frame_delay).await;
                    self.walk_from(frame, depth + 1, visited).await
                }
            });

            for nested in join_all(branches).await {
                found.extend(nested);
            }
            found
        }
        .boxed()
    }
}
