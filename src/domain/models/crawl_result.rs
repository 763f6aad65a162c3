// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 内容类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// 漫画，章节为图片列表
    #[default]
    Manga,
    /// 小说，章节为正文文本
    Novel,
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ContentType::Manga => write!(f, "manga"),
            ContentType::Novel => write!(f, "novel"),
        }
    }
}

impl FromStr for ContentType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manga" => Ok(ContentType::Manga),
            "novel" => Ok(ContentType::Novel),
            _ => Err(()),
        }
    }
}

/// 爬取选项
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlOptions {
    /// 用于进度跟踪的任务ID
    pub job_id: Option<Uuid>,
    /// 目标内容类型
    #[serde(default)]
    pub content_type: ContentType,
    /// 起始章节号，用于覆盖章节编号
    pub start_chapter: Option<f64>,
}

/// 整体结果状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlResultStatus {
    Success,
    Error,
}

/// 单章节结果状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterStatus {
    /// 成功抓取并保存
    Success,
    /// 抓取或解析失败
    Error,
    /// 已存在，未重新抓取
    Skipped,
}

/// 单章节结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterOutcome {
    /// 章节号
    pub number: f64,
    /// 章节地址
    pub url: String,
    /// 状态
    pub status: ChapterStatus,
    /// 说明信息
    pub message: String,
    /// 图片地址（仅漫画成功时）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

/// 爬取目标元数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlTarget {
    /// 漫画/小说ID
    pub id: Uuid,
    /// 标题
    pub title: String,
    /// 发现的章节总数
    pub total_chapters: usize,
    /// 成功爬取数
    pub crawled_chapters: usize,
}

/// 章节计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChapterCounts {
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// 一次爬取的结果
///
/// 不单独持久化，由任务记录器保存摘要，由通知方使用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    /// 整体状态
    pub status: CrawlResultStatus,
    /// 来源地址
    pub source_url: String,
    /// 目标元数据（成功时存在）
    pub target: Option<CrawlTarget>,
    /// 逐章节结果
    pub chapters: Vec<ChapterOutcome>,
    /// 错误信息（失败时存在）
    pub error: Option<String>,
}

impl CrawlResult {
    /// 构造成功结果
    pub fn success(source_url: String, id: Uuid, title: String, chapters: Vec<ChapterOutcome>) -> Self {
        let crawled = chapters
            .iter()
            .filter(|c| c.status == ChapterStatus::Success)
            .count();
        Self {
            status: CrawlResultStatus::Success,
            source_url,
            target: Some(CrawlTarget {
                id,
                title,
                total_chapters: chapters.len(),
                crawled_chapters: crawled,
            }),
            chapters,
            error: None,
        }
    }

    /// 构造失败结果
    pub fn error(source_url: String, message: String) -> Self {
        Self {
            status: CrawlResultStatus::Error,
            source_url,
            target: None,
            chapters: Vec::new(),
            error: Some(message),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == CrawlResultStatus::Success
    }

    /// 按状态统计章节数
    pub fn counts(&self) -> ChapterCounts {
        self.chapters
            .iter()
            .fold(ChapterCounts::default(), |mut acc, c| {
                match c.status {
                    ChapterStatus::Success => acc.successful += 1,
                    ChapterStatus::Error => acc.failed += 1,
                    ChapterStatus::Skipped => acc.skipped += 1,
                }
                acc
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(number: f64, status: ChapterStatus) -> ChapterOutcome {
        ChapterOutcome {
            number,
            url: format!("https://example.com/chapter-{}", number),
            status,
            message: String::new(),
            images: Vec::new(),
        }
    }

    #[test]
    fn test_success_counts() {
        let result = CrawlResult::success(
            "https://example.com".to_string(),
            Uuid::new_v4(),
            "Title".to_string(),
            vec![
                outcome(1.0, ChapterStatus::Success),
                outcome(2.0, ChapterStatus::Error),
                outcome(3.0, ChapterStatus::Skipped),
                outcome(4.0, ChapterStatus::Success),
            ],
        );

        assert!(result.is_success());
        let target = result.target.as_ref().unwrap();
        assert_eq!(target.total_chapters, 4);
        assert_eq!(target.crawled_chapters, 2);
        assert_eq!(
            result.counts(),
            ChapterCounts {
                successful: 2,
                failed: 1,
                skipped: 1
            }
        );
    }

    #[test]
    fn test_error_result() {
        let result = CrawlResult::error("https://example.com".to_string(), "boom".to_string());

        assert!(!result.is_success());
        assert!(result.target.is_none());
        assert_eq!(result.counts(), ChapterCounts::default());
    }

    #[test]
    fn test_content_type_parse() {
        assert_eq!("novel".parse::<ContentType>(), Ok(ContentType::Novel));
        assert_eq!(ContentType::Manga.to_string(), "manga");
        assert!("comic".parse::<ContentType>().is_err());
    }
}
