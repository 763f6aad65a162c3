// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::crawl_result::CrawlResult;

/// 通知类型标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    CrawlSuccess,
    CrawlFailure,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NotificationKind::CrawlSuccess => write!(f, "crawl_success"),
            NotificationKind::CrawlFailure => write!(f, "crawl_failure"),
        }
    }
}

/// 发给全部管理员的通知
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminNotification {
    pub title: String,
    pub content: String,
    pub kind: NotificationKind,
    pub reference_id: Option<String>,
    pub reference_type: Option<String>,
}

impl AdminNotification {
    /// 根据爬取结果生成通知，成功与失败都会生成
    pub fn for_crawl(result: &CrawlResult) -> Self {
        match &result.target {
            Some(target) if result.is_success() => {
                let counts = result.counts();
                Self {
                    title: format!("Crawl completed: {}", target.title),
                    content: format!(
                        "{}: {} chapters found, {} crawled, {} skipped, {} failed",
                        target.title,
                        target.total_chapters,
                        counts.successful,
                        counts.skipped,
                        counts.failed
                    ),
                    kind: NotificationKind::CrawlSuccess,
                    reference_id: Some(target.id.to_string()),
                    reference_type: Some("Manga".to_string()),
                }
            }
            _ => Self {
                title: "Crawl failed".to_string(),
                content: format!(
                    "{}: {}",
                    result.source_url,
                    result.error.as_deref().unwrap_or("unknown error")
                ),
                kind: NotificationKind::CrawlFailure,
                reference_id: None,
                reference_type: None,
            },
        }
    }
}
