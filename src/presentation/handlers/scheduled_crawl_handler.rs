// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::models::crawl_result::ContentType;
use crate::domain::services::scheduled_crawl_service::ScheduledCrawlService;
use crate::presentation::errors::AppError;
use crate::queue::scheduler::SchedulerDriver;

/// 创建定时爬取请求
#[derive(Debug, Deserialize)]
pub struct CreateScheduledCrawlRequest {
    pub manga_title: String,
    pub source_url: String,
    #[serde(default)]
    pub content_type: ContentType,
    pub schedule_expression: String,
}

/// 手动触发请求，不指定ID时执行全部到期项
#[derive(Debug, Default, Deserialize)]
pub struct RunScheduledCrawlsRequest {
    #[serde(default)]
    pub scheduled_crawl_id: Option<Uuid>,
}

/// 创建定时爬取
pub async fn create_scheduled_crawl(
    Extension(registry): Extension<Arc<ScheduledCrawlService>>,
    Json(payload): Json<CreateScheduledCrawlRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.manga_title.trim().is_empty() {
        return Err(AppError::bad_request("manga_title cannot be empty"));
    }

    let crawl = registry
        .create(
            payload.manga_title,
            payload.source_url,
            payload.content_type,
            payload.schedule_expression,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(crawl)))
}

/// 列出定时爬取
pub async fn list_scheduled_crawls(
    Extension(registry): Extension<Arc<ScheduledCrawlService>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(registry.list().await?))
}

/// 立即执行定时爬取
///
/// 同步等待执行完成，返回tick摘要
pub async fn run_scheduled_crawls(
    Extension(scheduler): Extension<Arc<SchedulerDriver>>,
    Json(payload): Json<RunScheduledCrawlsRequest>,
) -> impl IntoResponse {
    Json(scheduler.run_now(payload.scheduled_crawl_id).await)
}
