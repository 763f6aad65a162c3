// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::services::job_tracker::JobTracker;
use crate::domain::services::scheduled_crawl_service::ScheduledCrawlService;
use crate::presentation::handlers::{crawl_handler, scheduled_crawl_handler};
use crate::queue::scheduler::SchedulerDriver;
use crate::workers::crawl_job::CrawlJobRunner;
use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// 路由依赖的服务
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ScheduledCrawlService>,
    pub scheduler: Arc<SchedulerDriver>,
    pub runner: Arc<CrawlJobRunner>,
    pub tracker: JobTracker,
}

/// 创建应用路由
///
/// # 返回值
///
/// 返回配置好的路由
pub fn routes(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/v1/version", get(version));

    let admin_routes = Router::new()
        .route(
            "/v1/admin/scheduled_crawls",
            post(scheduled_crawl_handler::create_scheduled_crawl)
                .get(scheduled_crawl_handler::list_scheduled_crawls),
        )
        .route(
            "/v1/admin/scheduled_crawls/run",
            post(scheduled_crawl_handler::run_scheduled_crawls),
        )
        .route("/v1/admin/crawls", post(crawl_handler::create_crawl))
        .route(
            "/v1/admin/scheduled_jobs/{id}",
            get(crawl_handler::get_scheduled_job),
        )
        .layer(Extension(state.registry))
        .layer(Extension(state.scheduler))
        .layer(Extension(state.runner))
        .layer(Extension(state.tracker));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
}

/// 健康检查端点
///
/// # 返回值
///
/// 返回"OK"字符串
pub async fn health_check() -> &'static str {
    "OK"
}

/// 版本信息端点
pub async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
#[path = "routes_test.rs"]
mod tests;
