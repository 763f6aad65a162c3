// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::scheduled_job_repository::RepositoryError;
use crate::domain::models::notification::AdminNotification;
use async_trait::async_trait;

/// 管理员通知特质
#[async_trait]
pub trait Notifier: Send + Sync {
    /// 向所有管理员发送通知，返回送达的管理员数量
    async fn notify_admins(&self, notification: &AdminNotification) -> Result<usize, RepositoryError>;
}
