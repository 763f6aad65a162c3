// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use super::crawl_result::{ContentType, CrawlResult, CrawlResultStatus};

/// 任务执行状态
///
/// 状态转换是单调的：
/// Pending → Running → Completed/Failed，终态不可回退
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// 已创建，尚未开始
    #[default]
    Pending,
    /// 执行中
    Running,
    /// 已完成
    Completed,
    /// 已失败
    Failed,
}

impl JobStatus {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// 是否允许转换到目标状态
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(()),
        }
    }
}

/// 领域错误类型
#[derive(Error, Debug)]
pub enum DomainError {
    /// 无效的状态转换
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: JobStatus, to: JobStatus },

    /// 验证错误
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// 任务结果摘要
///
/// 只保留计数和目标信息，不保存逐章节的图片列表，以限制存储体积
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    /// 整体状态
    pub status: CrawlResultStatus,
    /// 目标标题
    pub title: Option<String>,
    /// 目标ID
    pub manga_id: Option<Uuid>,
    /// 发现的章节总数
    pub total_chapters: usize,
    /// 成功章节数
    pub successful: usize,
    /// 失败章节数
    pub failed: usize,
    /// 跳过章节数
    pub skipped: usize,
}

impl From<&CrawlResult> for JobSummary {
    fn from(result: &CrawlResult) -> Self {
        let counts = result.counts();
        Self {
            status: result.status,
            title: result.target.as_ref().map(|t| t.title.clone()),
            manga_id: result.target.as_ref().map(|t| t.id),
            total_chapters: result.chapters.len(),
            successful: counts.successful,
            failed: counts.failed,
            skipped: counts.skipped,
        }
    }
}

/// 任务执行记录
///
/// 一次爬取（手动或定时）的生命周期记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledJob {
    /// 任务ID
    pub id: Uuid,
    /// 触发它的定时爬取（手动爬取为空）
    pub scheduled_crawl_id: Option<Uuid>,
    /// 爬取类型
    pub job_type: ContentType,
    /// 来源地址
    pub source_url: String,
    /// 当前状态
    pub status: JobStatus,
    /// 结果摘要
    pub summary_result: Option<JobSummary>,
    /// 错误信息
    pub error_message: Option<String>,
    /// 是否只保存了摘要（逐章节数据被丢弃）
    pub result_summarized: bool,
    /// 已尝试次数
    pub attempts: i32,
    /// 开始时间
    pub started_at: Option<DateTime<Utc>>,
    /// 完成时间
    pub completed_at: Option<DateTime<Utc>>,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 更新时间
    pub updated_at: DateTime<Utc>,
}

impl ScheduledJob {
    /// 创建一个待执行的任务记录
    pub fn new(job_type: ContentType, source_url: String, scheduled_crawl_id: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            scheduled_crawl_id,
            job_type,
            source_url,
            status: JobStatus::Pending,
            summary_result: None,
            error_message: None,
            result_summarized: false,
            attempts: 0,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidStateTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Pending → Running
    pub fn start(&mut self) -> Result<(), DomainError> {
        self.transition(JobStatus::Running)?;
        self.started_at = Some(self.updated_at);
        Ok(())
    }

    /// Running → Completed，只保存摘要
    pub fn complete(&mut self, summary: JobSummary) -> Result<(), DomainError> {
        self.transition(JobStatus::Completed)?;
        self.summary_result = Some(summary);
        self.result_summarized = true;
        self.completed_at = Some(self.updated_at);
        Ok(())
    }

    /// Running → Failed
    pub fn fail(&mut self, error_message: String) -> Result<(), DomainError> {
        self.transition(JobStatus::Failed)?;
        self.error_message = Some(error_message);
        self.completed_at = Some(self.updated_at);
        Ok(())
    }

    /// 记录一次尝试，只在执行中有效
    pub fn record_attempt(&mut self) -> Result<(), DomainError> {
        if self.status != JobStatus::Running {
            return Err(DomainError::InvalidStateTransition {
                from: self.status,
                to: JobStatus::Running,
            });
        }
        self.attempts += 1;
        self.updated_at = Utc::now();
        Ok(())
    }
}
