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

use crate::domain::models::content::{Manga, NewChapter};
use crate::domain::models::crawl_result::ContentType;
use crate::domain::repositories::content_repository::ContentRepository;
use crate::domain::repositories::scheduled_job_repository::RepositoryError;
use crate::infrastructure::database::entities::{chapter as chapter_entity, manga as manga_entity};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::*;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// 内容仓库实现
pub struct ContentRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl ContentRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn find_manga(
        &self,
        title: &str,
        content_type: ContentType,
    ) -> Result<Option<Manga>, RepositoryError> {
        let model = manga_entity::Entity::find()
            .filter(manga_entity::Column::Title.eq(title))
            .filter(manga_entity::Column::ContentType.eq(content_type.to_string()))
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }
}

impl From<manga_entity::Model> for Manga {
    fn from(m: manga_entity::Model) -> Self {
        Self {
            id: m.id,
            title: m.title,
            source_url: m.source_url,
            content_type: m.content_type.parse().unwrap_or_default(),
            created_at: m.created_at.into(),
        }
    }
}

#[async_trait]
impl ContentRepository for ContentRepositoryImpl {
    async fn find_or_create_manga(
        &self,
        title: &str,
        source_url: &str,
        content_type: ContentType,
    ) -> Result<Manga, RepositoryError> {
        if let Some(existing) = self.find_manga(title, content_type).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let model = manga_entity::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(title.to_string()),
            source_url: Set(source_url.to_string()),
            content_type: Set(content_type.to_string()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        match model.insert(self.db.as_ref()).await {
            Ok(inserted) => Ok(inserted.into()),
            Err(e) => {
                // Lost a race on the (title, content_type) unique index
                debug!(title = %title, "Manga insert failed, re-reading: {}", e);
                self.find_manga(title, content_type)
                    .await?
                    .ok_or(RepositoryError::Database(e))
            }
        }
    }

    async fn chapter_exists(&self, manga_id: Uuid, slug: &str) -> Result<bool, RepositoryError> {
        let count = chapter_entity::Entity::find()
            .filter(chapter_entity::Column::MangaId.eq(manga_id))
            .filter(chapter_entity::Column::Slug.eq(slug))
            .count(self.db.as_ref())
            .await?;

        Ok(count > 0)
    }

    async fn create_chapter(&self, chapter: &NewChapter) -> Result<Uuid, RepositoryError> {
        let id = Uuid::new_v4();
        let model = chapter_entity::ActiveModel {
            id: Set(id),
            manga_id: Set(chapter.manga_id),
            number: Set(chapter.number),
            slug: Set(chapter.slug()),
            title: Set(chapter.title.clone()),
            source_url: Set(chapter.source_url.clone()),
            images: Set(serde_json::json!(chapter.images)),
            content: Set(chapter.content.clone()),
            created_at: Set(Utc::now().into()),
        };

        model.insert(self.db.as_ref()).await?;
        Ok(id)
    }
}
