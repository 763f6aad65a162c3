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

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        models::crawl_result::{ContentType, CrawlOptions},
        services::job_tracker::JobTracker,
    },
    presentation::errors::AppError,
    workers::crawl_job::CrawlJobRunner,
};

/// 手动爬取请求
#[derive(Debug, Deserialize)]
pub struct CrawlRequestDto {
    pub url: String,
    #[serde(default)]
    pub content_type: ContentType,
    pub start_chapter: Option<f64>,
}

/// 提交手动爬取
///
/// 立即返回任务ID，爬取在后台执行
pub async fn create_crawl(
    Extension(runner): Extension<Arc<CrawlJobRunner>>,
    Json(payload): Json<CrawlRequestDto>,
) -> Result<impl IntoResponse, AppError> {
    url::Url::parse(&payload.url)
        .map_err(|e| AppError::bad_request(format!("invalid url: {}", e)))?;
    if payload.start_chapter.is_some_and(|n| !n.is_finite() || n < 0.0) {
        return Err(AppError::bad_request("start_chapter must be a non-negative number"));
    }

    let options = CrawlOptions {
        job_id: None,
        content_type: payload.content_type,
        start_chapter: payload.start_chapter,
    };
    let job_id = runner.enqueue(payload.url, options).await?;

    Ok((StatusCode::ACCEPTED, Json(json!({ "job_id": job_id }))))
}

/// 查询任务记录
pub async fn get_scheduled_job(
    Extension(tracker): Extension<JobTracker>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    match tracker.find(job_id).await? {
        Some(job) => Ok((StatusCode::OK, Json(job)).into_response()),
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}
