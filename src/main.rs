// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use streamscout::config::settings::Settings;
use streamscout::domain::models::progress::{ProgressSnapshot, StopSignal};
use streamscout::domain::services::crawl_orchestrator::CrawlOrchestrator;
use streamscout::engines::fetcher::Fetcher;
use streamscout::utils::telemetry;
use tokio::sync::mpsc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// 在体育直播页面中发现 m3u8 流地址
#[derive(Debug, Parser)]
#[command(name = "streamscout", version, about)]
struct Cli {
    /// 目标站点，可重复；缺少协议时补 https://
    #[arg(short, long = "target", required = true)]
    targets: Vec<String>,

    /// 关键词，可重复；为空时发现全站赛事
    #[arg(short, long = "keyword")]
    keywords: Vec<String>,

    /// 禁用无头浏览器渲染
    #[arg(long)]
    no_browser: bool,

    /// 配置文件，默认按 config/ 目录和环境变量加载
    #[arg(short, long, env = "STREAMSCOUT_CONFIG")]
    config: Option<PathBuf>,

    /// 结果输出文件，默认写到标准输出
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// 主函数
///
/// 加载配置、运行一次多站点抓取并以 JSON 输出结果
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    let cli = Cli::parse();

    // 2. Load configuration
    let mut settings = match &cli.config {
        Some(path) => Settings::from_file(&path.to_string_lossy())
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::new().context("Failed to load settings")?,
    };
    if cli.no_browser {
        settings.browser.enabled = false;
    }
    info!("Configuration loaded");

    // 3. Build the fetcher and orchestrator
    let fetcher = Arc::new(Fetcher::new(&settings).context("Failed to build HTTP client")?);
    let orchestrator = CrawlOrchestrator::new(fetcher, &settings);

    // 4. Progress logging and Ctrl-C
    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<ProgressSnapshot>();
    let progress_task = tokio::spawn(async move {
        while let Some(snapshot) = progress_rx.recv().await {
            match &snapshot.error {
                Some(error) => warn!(
                    processed = snapshot.processed,
                    total = snapshot.total,
                    domain = %snapshot.current_domain,
                    "Site failed: {}",
                    error
                ),
                None => info!(
                    processed = snapshot.processed,
                    total = snapshot.total,
                    domain = %snapshot.current_domain,
                    page = snapshot.current_page.as_deref().unwrap_or_default(),
                    found = snapshot.found,
                    "Page scraped"
                ),
            }
        }
    });

    let stop = StopSignal::new();
    let ctrl_c_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, finishing the current page");
            ctrl_c_stop.stop();
        }
    });

    // 5. Run
    let run_id = Uuid::new_v4();
    let results = orchestrator
        .scrape(&cli.targets, &cli.keywords, Some(progress_tx), &stop)
        .instrument(info_span!("crawl", %run_id))
        .await;
    progress_task.await?;

    let found: usize = results.iter().map(|r| r.source_urls.len()).sum();
    info!(%run_id, "Collected {} result(s), {} stream url(s)", results.len(), found);

    // 6. Output
    let json = serde_json::to_string_pretty(&results)?;
    match &cli.output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Results written to {}", path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}
