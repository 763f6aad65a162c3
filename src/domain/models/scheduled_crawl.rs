// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::crawl_result::ContentType;
use super::schedule::Schedule;
use super::scheduled_job::DomainError;

/// 定时爬取实体
///
/// 一条周期性爬取定义。由管理员创建和编辑，由调度器读取，
/// 只有在一次运行结束后才会更新 `next_run_at` 与 `last_run_at`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledCrawl {
    /// 唯一标识符
    pub id: Uuid,
    /// 关联的漫画ID（首次爬取前可能为空）
    pub manga_id: Option<Uuid>,
    /// 漫画标题
    pub manga_title: String,
    /// 来源地址
    pub source_url: String,
    /// 内容类型
    pub content_type: ContentType,
    /// 调度表达式，见 [`Schedule`]
    pub schedule_expression: String,
    /// 下一次运行时间
    pub next_run_at: DateTime<Utc>,
    /// 上一次运行时间
    pub last_run_at: Option<DateTime<Utc>>,
    /// 是否启用
    pub enabled: bool,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 更新时间
    pub updated_at: DateTime<Utc>,
}

impl ScheduledCrawl {
    /// 创建新的定时爬取
    ///
    /// 会先校验调度表达式，首次运行时间为 `now + interval`
    pub fn new(
        manga_title: String,
        source_url: String,
        content_type: ContentType,
        schedule_expression: String,
    ) -> Result<Self, DomainError> {
        let schedule: Schedule = schedule_expression.parse()?;
        url::Url::parse(&source_url)
            .map_err(|e| DomainError::ValidationError(format!("invalid source url: {}", e)))?;

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            manga_id: None,
            manga_title,
            source_url,
            content_type,
            schedule_expression,
            next_run_at: schedule.next_after(now),
            last_run_at: None,
            enabled: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// 解析后的调度周期
    ///
    /// 已存储的表达式无法解析时退回到每日一次
    pub fn schedule(&self) -> Schedule {
        self.schedule_expression.parse().unwrap_or_else(|e| {
            warn!(
                crawl_id = %self.id,
                expression = %self.schedule_expression,
                "Invalid stored schedule expression, falling back to daily: {}",
                e
            );
            Schedule::daily()
        })
    }

    /// 是否到期
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.next_run_at <= now
    }

    /// 记录一次运行
    ///
    /// 无论运行成功与否都会推进 `next_run_at`
    pub fn mark_ran(&mut self, now: DateTime<Utc>) {
        self.last_run_at = Some(now);
        self.next_run_at = self.schedule().next_after(now);
        self.updated_at = now;
    }
}
