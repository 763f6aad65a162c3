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

use crate::domain::models::scheduled_job::{JobSummary, ScheduledJob};
use crate::domain::repositories::scheduled_job_repository::{
    RepositoryError, ScheduledJobRepository,
};
use crate::infrastructure::database::entities::scheduled_job as job_entity;
use async_trait::async_trait;
use sea_orm::*;
use std::sync::Arc;
use uuid::Uuid;

/// 任务记录仓库实现
pub struct ScheduledJobRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl ScheduledJobRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl TryFrom<job_entity::Model> for ScheduledJob {
    type Error = RepositoryError;

    fn try_from(m: job_entity::Model) -> Result<Self, Self::Error> {
        let status = m
            .status
            .parse()
            .map_err(|_| RepositoryError::Corrupt(format!("invalid job status: {}", m.status)))?;

        let summary_result = m
            .summary_result
            .map(serde_json::from_value::<JobSummary>)
            .transpose()
            .map_err(|e| RepositoryError::Corrupt(format!("invalid job summary: {}", e)))?;

        Ok(Self {
            id: m.id,
            scheduled_crawl_id: m.scheduled_crawl_id,
            job_type: m.job_type.parse().unwrap_or_default(),
            source_url: m.source_url,
            status,
            summary_result,
            error_message: m.error_message,
            result_summarized: m.result_summarized,
            attempts: m.attempts,
            started_at: m.started_at.map(Into::into),
            completed_at: m.completed_at.map(Into::into),
            created_at: m.created_at.into(),
            updated_at: m.updated_at.into(),
        })
    }
}

fn summary_json(job: &ScheduledJob) -> Result<Option<serde_json::Value>, RepositoryError> {
    job.summary_result
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| RepositoryError::Corrupt(format!("unserializable job summary: {}", e)))
}

#[async_trait]
impl ScheduledJobRepository for ScheduledJobRepositoryImpl {
    async fn create(&self, job: &ScheduledJob) -> Result<ScheduledJob, RepositoryError> {
        let model = job_entity::ActiveModel {
            id: Set(job.id),
            scheduled_crawl_id: Set(job.scheduled_crawl_id),
            job_type: Set(job.job_type.to_string()),
            source_url: Set(job.source_url.clone()),
            status: Set(job.status.to_string()),
            summary_result: Set(summary_json(job)?),
            error_message: Set(job.error_message.clone()),
            result_summarized: Set(job.result_summarized),
            attempts: Set(job.attempts),
            started_at: Set(job.started_at.map(Into::into)),
            completed_at: Set(job.completed_at.map(Into::into)),
            created_at: Set(job.created_at.into()),
            updated_at: Set(job.updated_at.into()),
        };

        model.insert(self.db.as_ref()).await?;
        Ok(job.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ScheduledJob>, RepositoryError> {
        job_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .map(ScheduledJob::try_from)
            .transpose()
    }

    async fn update(&self, job: &ScheduledJob) -> Result<ScheduledJob, RepositoryError> {
        let mut model: job_entity::ActiveModel = job_entity::Entity::find_by_id(job.id)
            .one(self.db.as_ref())
            .await?
            .ok_or(RepositoryError::NotFound)?
            .into();

        model.status = Set(job.status.to_string());
        model.summary_result = Set(summary_json(job)?);
        model.error_message = Set(job.error_message.clone());
        model.result_summarized = Set(job.result_summarized);
        model.attempts = Set(job.attempts);
        model.started_at = Set(job.started_at.map(Into::into));
        model.completed_at = Set(job.completed_at.map(Into::into));
        model.updated_at = Set(job.updated_at.into());

        model.update(self.db.as_ref()).await?;
        Ok(job.clone())
    }
}
