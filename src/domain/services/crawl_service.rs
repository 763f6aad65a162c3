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

use crate::config::settings::CrawlerSettings;
use crate::domain::models::content::{chapter_slug, Manga, NewChapter};
use crate::domain::models::crawl_result::{
    ChapterOutcome, ChapterStatus, ContentType, CrawlOptions, CrawlResult,
};
use crate::domain::repositories::content_repository::ContentRepository;
use crate::domain::repositories::scheduled_job_repository::RepositoryError;
use crate::domain::services::chapter_extractor::{
    ChapterExtractor, ChapterLink, ExtractError, SiteProfile,
};
use crate::engines::traits::{EngineError, FetchEngine, FetchRequest};
use crate::utils::retry_policy::Retryable;
use async_trait::async_trait;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// 整体爬取错误
#[derive(Error, Debug)]
pub enum CrawlError {
    /// 来源页面抓取失败
    #[error("Fetch failed: {0}")]
    Fetch(#[from] EngineError),

    /// 来源页面结构不符合预期
    #[error("Parse failed: {0}")]
    Parse(String),

    /// 配置错误，例如选择器无效
    #[error("Configuration error: {0}")]
    Config(String),

    /// 持久化失败
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<ExtractError> for CrawlError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::InvalidSelector { .. } | ExtractError::InvalidUrl(_) => {
                CrawlError::Config(err.to_string())
            }
            ExtractError::MissingTitle(_) => CrawlError::Parse(err.to_string()),
        }
    }
}

impl Retryable for CrawlError {
    fn is_retryable(&self) -> bool {
        match self {
            CrawlError::Fetch(e) => e.is_retryable(),
            CrawlError::Parse(_) => true,
            CrawlError::Config(_) | CrawlError::Repository(_) => false,
        }
    }
}

/// 执行时间预算
///
/// 只记录告警，不中断爬取；每次运行最多告警一次
#[derive(Debug)]
pub struct ExecutionBudget {
    started: Instant,
    limit: Duration,
    warned: bool,
}

impl ExecutionBudget {
    pub fn start(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
            warned: false,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// 首次超出预算时返回true
    pub fn check(&mut self) -> bool {
        if self.warned || self.elapsed() <= self.limit {
            return false;
        }
        self.warned = true;
        true
    }
}

/// 爬取执行特质
///
/// 外层任务通过它执行单次爬取尝试
#[async_trait]
pub trait Crawler: Send + Sync {
    async fn crawl(&self, source_url: &str, options: &CrawlOptions) -> Result<CrawlResult, CrawlError>;
}

/// 爬取服务
///
/// 抓取一个漫画/小说来源，解析章节并保存。单章节失败不会中断整体爬取，
/// 已存在的章节记为跳过，不重新抓取。
pub struct CrawlService {
    engine: Arc<dyn FetchEngine>,
    content: Arc<dyn ContentRepository>,
    extractor: ChapterExtractor,
    request_timeout: Duration,
    manga_budget: Duration,
    novel_budget: Duration,
}

impl CrawlService {
    /// 创建新的爬取服务实例
    ///
    /// # 参数
    ///
    /// * `engine` - 抓取引擎
    /// * `content` - 内容仓库
    /// * `settings` - 爬虫配置，选择器在这里编译
    ///
    /// # 返回值
    ///
    /// 选择器无效时返回 `ExtractError`
    pub fn new(
        engine: Arc<dyn FetchEngine>,
        content: Arc<dyn ContentRepository>,
        settings: &CrawlerSettings,
    ) -> Result<Self, ExtractError> {
        Ok(Self {
            engine,
            content,
            extractor: ChapterExtractor::from_settings(settings)?,
            request_timeout: settings.request_timeout(),
            manga_budget: Duration::from_secs(settings.manga_max_duration_secs),
            novel_budget: Duration::from_secs(settings.novel_max_duration_secs),
        })
    }

    fn budget_for(&self, content_type: ContentType) -> Duration {
        match content_type {
            ContentType::Manga => self.manga_budget,
            ContentType::Novel => self.novel_budget,
        }
    }

    /// 执行一次爬取
    ///
    /// # 参数
    ///
    /// * `source_url` - 作品目录页地址
    /// * `options` - 爬取选项
    ///
    /// # 返回值
    ///
    /// * `Ok(CrawlResult)` - 状态为成功的结果，包含逐章节结果
    /// * `Err(CrawlError)` - 整体失败，由外层任务决定是否重试
    #[instrument(skip(self, options), fields(job_id = ?options.job_id, content_type = %options.content_type))]
    pub async fn crawl(
        &self,
        source_url: &str,
        options: &CrawlOptions,
    ) -> Result<CrawlResult, CrawlError> {
        let mut budget = ExecutionBudget::start(self.budget_for(options.content_type));
        let profile = self.extractor.profile_for(source_url, options.content_type);

        let page = self
            .engine
            .fetch(&FetchRequest::get(source_url, self.request_timeout))
            .await?;

        let title = profile
            .extract_title(&page.content)
            .ok_or_else(|| ExtractError::MissingTitle(source_url.to_string()))?;
        let links =
            profile.extract_chapter_links(&page.content, &page.final_url, options.start_chapter)?;

        if links.is_empty() {
            warn!(url = %source_url, "No chapters found on source page");
        }

        let manga = self
            .content
            .find_or_create_manga(&title, source_url, options.content_type)
            .await?;

        info!(
            manga_id = %manga.id,
            title = %manga.title,
            chapters = links.len(),
            "Crawling chapters"
        );

        let mut outcomes = Vec::with_capacity(links.len());
        for link in &links {
            let outcome = self
                .crawl_chapter(&manga, link, profile, options.content_type)
                .await;

            let label = match outcome.status {
                ChapterStatus::Success => "success",
                ChapterStatus::Error => "error",
                ChapterStatus::Skipped => "skipped",
            };
            counter!("crawl_chapters_total", "outcome" => label).increment(1);
            outcomes.push(outcome);

            if budget.check() {
                warn!(
                    url = %source_url,
                    elapsed_secs = budget.elapsed().as_secs(),
                    limit_secs = self.budget_for(options.content_type).as_secs(),
                    "Crawl exceeded its execution time budget"
                );
            }
        }

        let result = CrawlResult::success(source_url.to_string(), manga.id, manga.title, outcomes);
        let counts = result.counts();
        info!(
            successful = counts.successful,
            failed = counts.failed,
            skipped = counts.skipped,
            elapsed_ms = budget.elapsed().as_millis() as u64,
            "Crawl finished"
        );

        Ok(result)
    }

    /// 处理单个章节，错误被记录在结果中而不是向上传播
    async fn crawl_chapter(
        &self,
        manga: &Manga,
        link: &ChapterLink,
        profile: &SiteProfile,
        content_type: ContentType,
    ) -> ChapterOutcome {
        let outcome = |status, message: String, images| ChapterOutcome {
            number: link.number,
            url: link.url.clone(),
            status,
            message,
            images,
        };

        let slug = chapter_slug(link.number);
        match self.content.chapter_exists(manga.id, &slug).await {
            Ok(true) => {
                debug!(chapter = %slug, "Chapter already exists, skipping");
                return outcome(ChapterStatus::Skipped, "already exists".to_string(), Vec::new());
            }
            Ok(false) => {}
            Err(e) => {
                warn!(chapter = %slug, "Failed to check chapter: {}", e);
                return outcome(ChapterStatus::Error, e.to_string(), Vec::new());
            }
        }

        match self.fetch_chapter(manga, link, profile, content_type).await {
            Ok(chapter) => {
                let message = match content_type {
                    ContentType::Manga => format!("{} images", chapter.images.len()),
                    ContentType::Novel => "text saved".to_string(),
                };
                outcome(ChapterStatus::Success, message, chapter.images)
            }
            Err(e) => {
                warn!(chapter = %slug, url = %link.url, "Chapter failed: {}", e);
                outcome(ChapterStatus::Error, e.to_string(), Vec::new())
            }
        }
    }

    async fn fetch_chapter(
        &self,
        manga: &Manga,
        link: &ChapterLink,
        profile: &SiteProfile,
        content_type: ContentType,
    ) -> Result<NewChapter, CrawlError> {
        let page = self
            .engine
            .fetch(&FetchRequest::get(&link.url, self.request_timeout))
            .await?;

        let mut chapter = NewChapter {
            manga_id: manga.id,
            number: link.number,
            title: link.title.clone(),
            source_url: link.url.clone(),
            images: Vec::new(),
            content: None,
        };

        match content_type {
            ContentType::Manga => {
                chapter.images = profile.extract_images(&page.content, &page.final_url)?;
                if chapter.images.is_empty() {
                    return Err(CrawlError::Parse("no images found".to_string()));
                }
            }
            ContentType::Novel => {
                chapter.content = Some(
                    profile
                        .extract_text(&page.content)
                        .ok_or_else(|| CrawlError::Parse("no chapter text found".to_string()))?,
                );
            }
        }

        self.content.create_chapter(&chapter).await?;
        Ok(chapter)
    }
}

#[async_trait]
impl Crawler for CrawlService {
    async fn crawl(&self, source_url: &str, options: &CrawlOptions) -> Result<CrawlResult, CrawlError> {
        CrawlService::crawl(self, source_url, options).await
    }
}

#[cfg(test)]
#[path = "crawl_service_test.rs"]
mod tests;
