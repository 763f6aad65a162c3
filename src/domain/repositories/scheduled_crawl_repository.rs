// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::scheduled_job_repository::RepositoryError;
use crate::domain::models::scheduled_crawl::ScheduledCrawl;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 定时爬取仓库特质
///
/// 定义定时爬取定义的数据访问接口。领域层只依赖这个抽象，
/// 具体存储由基础设施层实现。
#[async_trait]
pub trait ScheduledCrawlRepository: Send + Sync {
    /// 创建定时爬取
    async fn create(&self, crawl: &ScheduledCrawl) -> Result<ScheduledCrawl, RepositoryError>;

    /// 根据ID查找定时爬取
    ///
    /// # 返回值
    ///
    /// * `Ok(Some(ScheduledCrawl))` - 找到记录
    /// * `Ok(None)` - 记录不存在
    /// * `Err(RepositoryError)` - 查询失败
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ScheduledCrawl>, RepositoryError>;

    /// 列出全部定时爬取
    async fn find_all(&self) -> Result<Vec<ScheduledCrawl>, RepositoryError>;

    /// 查找到期的定时爬取
    ///
    /// 只返回 `enabled = true` 且 `next_run_at <= now` 的记录，
    /// 按 `next_run_at`、`id` 升序排列
    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledCrawl>, RepositoryError>;

    /// 更新定时爬取
    async fn update(&self, crawl: &ScheduledCrawl) -> Result<ScheduledCrawl, RepositoryError>;

    /// 认领一次运行
    ///
    /// 仅当记录的 `next_run_at <= due_by` 时把它改为 `next_run_at`，单行条件更新。
    /// 其他执行者已经认领或运行过时不会修改任何行。
    ///
    /// # 返回值
    ///
    /// 认领成功时返回true
    async fn claim(
        &self,
        id: Uuid,
        due_by: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// 记录一次运行的结果时间
    async fn record_run(
        &self,
        id: Uuid,
        last_run_at: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// 删除定时爬取
    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError>;
}
