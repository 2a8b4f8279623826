// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

/// 候选链接的分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkKind {
    /// 具体赛事页面
    Event,
    /// 分类/赛程页，需要展开而不是直接收集
    Category,
}

/// 站点探索过程中发现的候选页面
///
/// 只在一次抓取过程中存在，不持久化
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePage {
    pub url: String,
    pub kind: LinkKind,
}

impl CandidatePage {
    pub fn new(url: impl Into<String>, kind: LinkKind) -> Self {
        Self {
            url: url.into(),
            kind,
        }
    }
}

/// 镜像链接的识别方式
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MirrorKind {
    /// 文本形如 "Link N"
    NumberedLink,
    /// data-uri 属性携带流地址
    DataUri,
    /// 文本包含 stream/server/watch 加数字或清晰度
    TextMatch,
    /// 广播商名称或频道形态的链接
    Channel,
    /// 表格中的数字编号配对链接
    IdBased { channel_id: String },
}

/// 镜像/服务器链接
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamLink {
    /// 绝对地址
    pub url: String,
    /// 可读标签，成为结果的 `server_label`
    pub label: String,
    pub kind: MirrorKind,
}

impl StreamLink {
    pub fn new(url: impl Into<String>, label: impl Into<String>, kind: MirrorKind) -> Self {
        Self {
            url: url.into(),
            label: label.into(),
            kind,
        }
    }

    pub fn channel_id(&self) -> Option<&str> {
        match &self.kind {
            MirrorKind::IdBased { channel_id } => Some(channel_id),
            _ => None,
        }
    }
}

/// 页面中的一个锚点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    /// 原始 href 属性
    pub href: String,
    /// 解析后的绝对地址
    pub url: String,
    /// 可见文本（已折叠空白）
    pub text: String,
    /// title 属性
    pub title: String,
}

impl Anchor {
    /// 文本与标题的组合，用于关键词匹配
    pub fn combined_text(&self) -> String {
        if self.title.is_empty() {
            self.text.clone()
        } else {
            format!("{} {}", self.text, self.title)
        }
    }
}
