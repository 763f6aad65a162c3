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

use crate::domain::models::scheduled_crawl::ScheduledCrawl;
use crate::domain::repositories::scheduled_crawl_repository::ScheduledCrawlRepository;
use crate::domain::repositories::scheduled_job_repository::RepositoryError;
use crate::infrastructure::database::entities::scheduled_crawl as crawl_entity;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{sea_query::Expr, *};
use std::sync::Arc;
use uuid::Uuid;

/// 定时爬取仓库实现
pub struct ScheduledCrawlRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl ScheduledCrawlRepositoryImpl {
    /// 创建新的定时爬取仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<crawl_entity::Model> for ScheduledCrawl {
    fn from(m: crawl_entity::Model) -> Self {
        Self {
            id: m.id,
            manga_id: m.manga_id,
            manga_title: m.manga_title,
            source_url: m.source_url,
            content_type: m.content_type.parse().unwrap_or_default(),
            schedule_expression: m.schedule_expression,
            next_run_at: m.next_run_at.into(),
            last_run_at: m.last_run_at.map(Into::into),
            enabled: m.enabled,
            created_at: m.created_at.into(),
            updated_at: m.updated_at.into(),
        }
    }
}

#[async_trait]
impl ScheduledCrawlRepository for ScheduledCrawlRepositoryImpl {
    async fn create(&self, crawl: &ScheduledCrawl) -> Result<ScheduledCrawl, RepositoryError> {
        let model = crawl_entity::ActiveModel {
            id: Set(crawl.id),
            manga_id: Set(crawl.manga_id),
            manga_title: Set(crawl.manga_title.clone()),
            source_url: Set(crawl.source_url.clone()),
            content_type: Set(crawl.content_type.to_string()),
            schedule_expression: Set(crawl.schedule_expression.clone()),
            next_run_at: Set(crawl.next_run_at.into()),
            last_run_at: Set(crawl.last_run_at.map(Into::into)),
            enabled: Set(crawl.enabled),
            created_at: Set(crawl.created_at.into()),
            updated_at: Set(crawl.updated_at.into()),
        };

        model.insert(self.db.as_ref()).await?;
        Ok(crawl.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ScheduledCrawl>, RepositoryError> {
        let model = crawl_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn find_all(&self) -> Result<Vec<ScheduledCrawl>, RepositoryError> {
        let models = crawl_entity::Entity::find()
            .order_by_asc(crawl_entity::Column::NextRunAt)
            .order_by_asc(crawl_entity::Column::Id)
            .all(self.db.as_ref())
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledCrawl>, RepositoryError> {
        let now: DateTime<FixedOffset> = now.into();
        let models = crawl_entity::Entity::find()
            .filter(crawl_entity::Column::Enabled.eq(true))
            .filter(crawl_entity::Column::NextRunAt.lte(now))
            .order_by_asc(crawl_entity::Column::NextRunAt)
            .order_by_asc(crawl_entity::Column::Id)
            .all(self.db.as_ref())
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn update(&self, crawl: &ScheduledCrawl) -> Result<ScheduledCrawl, RepositoryError> {
        let mut model: crawl_entity::ActiveModel = crawl_entity::Entity::find_by_id(crawl.id)
            .one(self.db.as_ref())
            .await?
            .ok_or(RepositoryError::NotFound)?
            .into();

        model.manga_id = Set(crawl.manga_id);
        model.manga_title = Set(crawl.manga_title.clone());
        model.source_url = Set(crawl.source_url.clone());
        model.content_type = Set(crawl.content_type.to_string());
        model.schedule_expression = Set(crawl.schedule_expression.clone());
        model.next_run_at = Set(crawl.next_run_at.into());
        model.last_run_at = Set(crawl.last_run_at.map(Into::into));
        model.enabled = Set(crawl.enabled);
        model.updated_at = Set(crawl.updated_at.into());

        model.update(self.db.as_ref()).await?;
        Ok(crawl.clone())
    }

    async fn claim(
        &self,
        id: Uuid,
        due_by: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let due_by: DateTime<FixedOffset> = due_by.into();
        let next: DateTime<FixedOffset> = next_run_at.into();

        let result = crawl_entity::Entity::update_many()
            .col_expr(crawl_entity::Column::NextRunAt, Expr::value(next))
            .filter(crawl_entity::Column::Id.eq(id))
            .filter(crawl_entity::Column::NextRunAt.lte(due_by))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected == 1)
    }

    async fn record_run(
        &self,
        id: Uuid,
        last_run_at: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let last: DateTime<FixedOffset> = last_run_at.into();
        let next: DateTime<FixedOffset> = next_run_at.into();

        let result = crawl_entity::Entity::update_many()
            .col_expr(crawl_entity::Column::LastRunAt, Expr::value(last))
            .col_expr(crawl_entity::Column::NextRunAt, Expr::value(next))
            .col_expr(crawl_entity::Column::UpdatedAt, Expr::value(last))
            .filter(crawl_entity::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = crawl_entity::Entity::delete_by_id(id)
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected > 0)
    }
}
