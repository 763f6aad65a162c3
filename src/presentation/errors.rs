// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::domain::services::job_tracker::TrackerError;
use crate::domain::services::scheduled_crawl_service::RegistryError;

/// 应用错误类型
///
/// 封装所有可能的应用层错误，按领域错误类型映射HTTP状态码
#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl AppError {
    /// 请求参数错误
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(anyhow::Error::new(BadRequest(message.into())))
    }

    fn status(&self) -> StatusCode {
        if self.0.downcast_ref::<BadRequest>().is_some() {
            return StatusCode::BAD_REQUEST;
        }
        if let Some(e) = self.0.downcast_ref::<RegistryError>() {
            return match e {
                RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
                RegistryError::AlreadyRunning(_) => StatusCode::CONFLICT,
                RegistryError::Invalid(_) => StatusCode::BAD_REQUEST,
                RegistryError::Tracker(e) => tracker_status(e),
                RegistryError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
        }
        if let Some(e) = self.0.downcast_ref::<TrackerError>() {
            return tracker_status(e);
        }
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn tracker_status(error: &TrackerError) -> StatusCode {
    match error {
        TrackerError::NotFound(_) => StatusCode::NOT_FOUND,
        TrackerError::Rejected(_) => StatusCode::CONFLICT,
        TrackerError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct BadRequest(String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = self.0.to_string();
        if status.is_server_error() {
            error!("Request failed: {}", error_message);
        }

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
