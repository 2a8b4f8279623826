// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// 进度快照
///
/// 编排器每处理完一个页面后发出一次
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    /// 已处理的页面数
    pub processed: usize,
    /// 目标站点总数
    pub total: usize,
    /// 当前站点
    pub current_domain: String,
    /// 当前页面
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_page: Option<String>,
    /// 当前页面找到的 m3u8 数量
    pub found: usize,
    /// 站点级失败描述
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 进度通道发送端
pub type ProgressSender = UnboundedSender<ProgressSnapshot>;

/// 协作式停止信号
///
/// 编排器只在站点与页面之间检查，正在进行的并发抓取会自然完成
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_signal_shared_between_clones() {
        let signal = StopSignal::new();
        let observer = signal.clone();
        assert!(!observer.is_stopped());
        signal.stop();
        assert!(observer.is_stopped());
    }
}
