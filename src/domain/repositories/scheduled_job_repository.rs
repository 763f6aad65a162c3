// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::scheduled_job::ScheduledJob;
use async_trait::async_trait;
use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 记录未找到
    #[error("Record not found")]
    NotFound,
    /// 存储的数据无法映射为领域对象
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// 任务记录仓库特质
///
/// 定义任务执行记录的数据访问接口
#[async_trait]
pub trait ScheduledJobRepository: Send + Sync {
    /// 创建任务记录
    async fn create(&self, job: &ScheduledJob) -> Result<ScheduledJob, RepositoryError>;
    /// 根据ID查找任务记录
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ScheduledJob>, RepositoryError>;
    /// 更新任务记录（整行写入）
    async fn update(&self, job: &ScheduledJob) -> Result<ScheduledJob, RepositoryError>;
}
