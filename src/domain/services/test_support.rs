// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::engines::traits::{PageFetcher, ProbeResponse};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// 内存中的站点，按 URL 返回固定内容，并记录每个 URL 的抓取次数
#[derive(Default)]
pub struct StaticSite {
    pages: HashMap<String, String>,
    rendered: HashMap<String, String>,
    heads: HashMap<String, ProbeResponse>,
    fail_once: HashSet<String>,
    fetches: Mutex<HashMap<String, usize>>,
    pub rendering: bool,
    pub released: AtomicBool,
    pub render_calls: AtomicUsize,
}

impl StaticSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn rendered(mut self, url: &str, html: &str) -> Self {
        self.rendering = true;
        self.rendered.insert(url.to_string(), html.to_string());
        self
    }

    /// 第一次抓取该 URL 时返回 `None`
    pub fn fail_once(mut self, url: &str) -> Self {
        self.fail_once.insert(url.to_string());
        self
    }

    pub fn head(mut self, url: &str, status: u16, content_type: Option<&str>) -> Self {
        self.heads.insert(
            url.to_string(),
            ProbeResponse {
                status,
                content_type: content_type.map(str::to_string),
            },
        );
        self
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.fetches.lock().get(url).copied().unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().values().sum()
    }
}

#[async_trait]
impl PageFetcher for StaticSite {
    async fn fetch(&self, url: &str) -> Option<String> {
        let count = {
            let mut fetches = self.fetches.lock();
            let count = fetches.entry(url.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        if count == 1 && self.fail_once.contains(url) {
            return None;
        }
        self.pages.get(url).cloned()
    }

    async fn fetch_rendered(&self, url: &str) -> Option<String> {
        self.render_calls.fetch_add(1, Ordering::SeqCst);
        match self.rendered.get(url) {
            Some(html) => Some(html.clone()),
            None => self.fetch(url).await,
        }
    }

    fn rendering_available(&self) -> bool {
        self.rendering
    }

    async fn probe(&self, url: &str) -> Option<ProbeResponse> {
        Some(self.heads.get(url).cloned().unwrap_or(ProbeResponse {
            status: 404,
            content_type: None,
        }))
    }

    async fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}
