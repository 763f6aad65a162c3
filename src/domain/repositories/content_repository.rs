// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::scheduled_job_repository::RepositoryError;
use crate::domain::models::content::{Manga, NewChapter};
use crate::domain::models::crawl_result::ContentType;
use async_trait::async_trait;
use uuid::Uuid;

/// 内容仓库特质
///
/// 爬取引擎通过它保存漫画与章节
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// 按标题查找漫画，不存在则创建
    async fn find_or_create_manga(
        &self,
        title: &str,
        source_url: &str,
        content_type: ContentType,
    ) -> Result<Manga, RepositoryError>;

    /// 章节是否已存在
    async fn chapter_exists(&self, manga_id: Uuid, slug: &str) -> Result<bool, RepositoryError>;

    /// 保存章节，返回章节ID
    async fn create_chapter(&self, chapter: &NewChapter) -> Result<Uuid, RepositoryError>;
}
