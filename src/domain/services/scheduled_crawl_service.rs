// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_result::{ContentType, CrawlOptions, CrawlResult, CrawlResultStatus};
use crate::domain::models::scheduled_crawl::ScheduledCrawl;
use crate::domain::models::scheduled_job::DomainError;
use crate::domain::repositories::scheduled_crawl_repository::ScheduledCrawlRepository;
use crate::domain::repositories::scheduled_job_repository::RepositoryError;
use crate::domain::services::job_tracker::{JobTracker, TrackerError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashSet;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// 定时爬取服务错误
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Scheduled crawl {0} not found")]
    NotFound(Uuid),

    /// 同一个定时爬取正在执行
    #[error("Scheduled crawl {0} is already running")]
    AlreadyRunning(Uuid),

    #[error("Invalid scheduled crawl: {0}")]
    Invalid(#[from] DomainError),

    #[error("Job tracking failed: {0}")]
    Tracker(#[from] TrackerError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// 带重试的整体爬取任务
///
/// 负责任务状态流转、重试与通知，返回最终结果（失败也以结果形式返回）
#[async_trait]
pub trait CrawlJob: Send + Sync {
    async fn run(&self, job_id: Uuid, source_url: &str, options: CrawlOptions) -> CrawlResult;
}

/// 单次执行的摘要
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionOutcome {
    pub scheduled_crawl_id: Uuid,
    pub manga_title: String,
    pub job_id: Uuid,
    pub status: CrawlResultStatus,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub next_run_at: DateTime<Utc>,
}

/// 执行中标记，离开作用域时移除
struct InFlight<'a> {
    set: &'a DashSet<Uuid>,
    id: Uuid,
}

impl<'a> InFlight<'a> {
    fn acquire(set: &'a DashSet<Uuid>, id: Uuid) -> Option<Self> {
        set.insert(id).then_some(Self { set, id })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.id);
    }
}

/// 定时爬取服务
///
/// 回答"哪些定时爬取已到期"，并执行单个定时爬取。
/// 每次执行都会创建一条任务记录，执行结束后无论成败都推进 `next_run_at`。
pub struct ScheduledCrawlService {
    repo: Arc<dyn ScheduledCrawlRepository>,
    tracker: JobTracker,
    job: Arc<dyn CrawlJob>,
    in_flight: DashSet<Uuid>,
}

impl ScheduledCrawlService {
    pub fn new(
        repo: Arc<dyn ScheduledCrawlRepository>,
        tracker: JobTracker,
        job: Arc<dyn CrawlJob>,
    ) -> Self {
        Self {
            repo,
            tracker,
            job,
            in_flight: DashSet::new(),
        }
    }

    /// 创建定时爬取
    pub async fn create(
        &self,
        manga_title: String,
        source_url: String,
        content_type: ContentType,
        schedule_expression: String,
    ) -> Result<ScheduledCrawl, RegistryError> {
        let crawl = ScheduledCrawl::new(manga_title, source_url, content_type, schedule_expression)?;
        let created = self.repo.create(&crawl).await?;
        info!(crawl_id = %created.id, next_run_at = %created.next_run_at, "Scheduled crawl created");
        Ok(created)
    }

    pub async fn list(&self) -> Result<Vec<ScheduledCrawl>, RegistryError> {
        Ok(self.repo.find_all().await?)
    }

    pub async fn find(&self, id: Uuid) -> Result<ScheduledCrawl, RegistryError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or(RegistryError::NotFound(id))
    }

    /// 查询到期的定时爬取
    ///
    /// 按 `next_run_at`、`id` 升序返回，每条最多出现一次
    pub async fn due_for_run(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledCrawl>, RegistryError> {
        let mut due: Vec<ScheduledCrawl> = self
            .repo
            .find_due(now)
            .await?
            .into_iter()
            .filter(|c| c.is_due(now))
            .collect();
        due.sort_by(|a, b| a.next_run_at.cmp(&b.next_run_at).then(a.id.cmp(&b.id)));
        due.dedup_by_key(|c| c.id);
        Ok(due)
    }

    /// 执行一个定时爬取
    ///
    /// # 返回值
    ///
    /// * `Ok(ExecutionOutcome)` - 已执行（爬取本身可能失败，见 `status`）
    /// * `Err(RegistryError::AlreadyRunning)` - 同一定时爬取正在执行，或已被其他执行者认领
    /// * `Err(..)` - 任务记录或持久化失败
    #[instrument(skip(self, crawl), fields(crawl_id = %crawl.id))]
    pub async fn execute(&self, crawl: &ScheduledCrawl) -> Result<ExecutionOutcome, RegistryError> {
        let Some(_guard) = InFlight::acquire(&self.in_flight, crawl.id) else {
            warn!("Scheduled crawl is already running, skipping");
            return Err(RegistryError::AlreadyRunning(crawl.id));
        };

        // Only succeeds while next_run_at still matches the snapshot.
        let lease = crawl.schedule().next_after(Utc::now());
        if !self.repo.claim(crawl.id, crawl.next_run_at, lease).await? {
            warn!("Scheduled crawl was already claimed, skipping");
            return Err(RegistryError::AlreadyRunning(crawl.id));
        }

        let run = self.run_job(crawl).await;

        let now = Utc::now();
        let mut ran = crawl.clone();
        ran.mark_ran(now);
        let next_run_at = ran.next_run_at;
        self.repo.record_run(crawl.id, now, next_run_at).await?;

        let (job_id, result) = run?;

        if crawl.manga_id.is_none() {
            if let Some(target) = result.target.as_ref() {
                self.link_manga(crawl.id, target.id).await?;
            }
        }

        let counts = result.counts();
        info!(
            job_id = %job_id,
            status = ?result.status,
            next_run_at = %next_run_at,
            "Scheduled crawl executed"
        );

        Ok(ExecutionOutcome {
            scheduled_crawl_id: crawl.id,
            manga_title: crawl.manga_title.clone(),
            job_id,
            status: result.status,
            successful: counts.successful,
            failed: counts.failed,
            skipped: counts.skipped,
            error: result.error,
            next_run_at,
        })
    }

    async fn run_job(&self, crawl: &ScheduledCrawl) -> Result<(Uuid, CrawlResult), RegistryError> {
        let job_id = self
            .tracker
            .create(crawl.content_type, &crawl.source_url, Some(crawl.id))
            .await?;

        let options = CrawlOptions {
            job_id: Some(job_id),
            content_type: crawl.content_type,
            start_chapter: None,
        };
        let result = self.job.run(job_id, &crawl.source_url, options).await;
        Ok((job_id, result))
    }

    /// 首次成功爬取后关联漫画
    async fn link_manga(&self, crawl_id: Uuid, manga_id: Uuid) -> Result<(), RegistryError> {
        if let Some(mut fresh) = self.repo.find_by_id(crawl_id).await? {
            if fresh.manga_id.is_none() {
                fresh.manga_id = Some(manga_id);
                fresh.updated_at = Utc::now();
                self.repo.update(&fresh).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "scheduled_crawl_service_test.rs"]
mod tests;
