// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_result::ContentType;
use crate::domain::models::scheduled_job::{DomainError, JobSummary, ScheduledJob};
use crate::domain::repositories::scheduled_job_repository::{
    RepositoryError, ScheduledJobRepository,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// 任务记录器错误
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Job {0} not found")]
    NotFound(Uuid),

    /// 更新被拒绝，例如终态之后的更新
    #[error("Job update rejected: {0}")]
    Rejected(#[from] DomainError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// 对任务记录的一次部分更新
#[derive(Debug, Clone)]
pub enum JobUpdate {
    /// pending → running
    Start,
    /// 记录一次尝试
    RecordAttempt,
    /// running → completed
    Complete(JobSummary),
    /// running → failed
    Fail(String),
}

impl JobUpdate {
    fn name(&self) -> &'static str {
        match self {
            JobUpdate::Start => "start",
            JobUpdate::RecordAttempt => "record_attempt",
            JobUpdate::Complete(_) => "complete",
            JobUpdate::Fail(_) => "fail",
        }
    }
}

/// 任务记录器
///
/// 任务生命周期的唯一写入口。状态只能按
/// pending → running → completed/failed 前进，终态之后的更新会被拒绝并记录告警，
/// 不会覆盖已有结果。
#[derive(Clone)]
pub struct JobTracker {
    repo: Arc<dyn ScheduledJobRepository>,
}

impl JobTracker {
    pub fn new(repo: Arc<dyn ScheduledJobRepository>) -> Self {
        Self { repo }
    }

    /// 创建待执行的任务记录
    ///
    /// # 返回值
    ///
    /// 新任务的ID
    pub async fn create(
        &self,
        job_type: ContentType,
        source_url: &str,
        scheduled_crawl_id: Option<Uuid>,
    ) -> Result<Uuid, TrackerError> {
        let job = ScheduledJob::new(job_type, source_url.to_string(), scheduled_crawl_id);
        let created = self.repo.create(&job).await?;
        info!(job_id = %created.id, url = %source_url, "Job created");
        Ok(created.id)
    }

    /// 读取任务记录
    pub async fn find(&self, id: Uuid) -> Result<Option<ScheduledJob>, TrackerError> {
        Ok(self.repo.find_by_id(id).await?)
    }

    /// 对任务应用一次更新
    ///
    /// # 返回值
    ///
    /// * `Ok(ScheduledJob)` - 更新后的任务
    /// * `Err(TrackerError::Rejected)` - 状态转换不合法，记录保持不变
    pub async fn update(&self, id: Uuid, update: JobUpdate) -> Result<ScheduledJob, TrackerError> {
        let mut job = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or(TrackerError::NotFound(id))?;

        let name = update.name();
        let applied = match update {
            JobUpdate::Start => job.start(),
            JobUpdate::RecordAttempt => job.record_attempt(),
            JobUpdate::Complete(summary) => job.complete(summary),
            JobUpdate::Fail(message) => job.fail(message),
        };

        if let Err(e) = applied {
            warn!(
                job_id = %id,
                status = %job.status,
                update = name,
                "Rejected job update: {}",
                e
            );
            return Err(e.into());
        }

        Ok(self.repo.update(&job).await?)
    }

    pub async fn start(&self, id: Uuid) -> Result<ScheduledJob, TrackerError> {
        let job = self.update(id, JobUpdate::Start).await?;
        info!(job_id = %id, "Job started");
        Ok(job)
    }

    pub async fn record_attempt(&self, id: Uuid) -> Result<ScheduledJob, TrackerError> {
        self.update(id, JobUpdate::RecordAttempt).await
    }

    pub async fn complete(&self, id: Uuid, summary: JobSummary) -> Result<ScheduledJob, TrackerError> {
        let job = self.update(id, JobUpdate::Complete(summary)).await?;
        info!(job_id = %id, attempts = job.attempts, "Job completed");
        Ok(job)
    }

    pub async fn fail(&self, id: Uuid, message: String) -> Result<ScheduledJob, TrackerError> {
        let job = self.update(id, JobUpdate::Fail(message)).await?;
        info!(job_id = %id, attempts = job.attempts, "Job failed");
        Ok(job)
    }
}
