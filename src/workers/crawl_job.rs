// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_result::{CrawlOptions, CrawlResult};
use crate::domain::models::notification::AdminNotification;
use crate::domain::models::scheduled_job::JobSummary;
use crate::domain::repositories::notification_repository::Notifier;
use crate::domain::services::crawl_service::{CrawlError, Crawler};
use crate::domain::services::job_tracker::{JobTracker, TrackerError};
use crate::domain::services::scheduled_crawl_service::CrawlJob;
use crate::utils::retry_policy::RetryPolicy;
use async_trait::async_trait;
use metrics::{counter, histogram};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// 爬取任务执行器
///
/// 一次爬取的外层包装：推进任务状态、对瞬时错误做整体重试、
/// 记录指标，并在成功或失败后通知管理员
pub struct CrawlJobRunner {
    crawler: Arc<dyn Crawler>,
    tracker: JobTracker,
    notifier: Arc<dyn Notifier>,
    policy: RetryPolicy,
}

impl CrawlJobRunner {
    pub fn new(
        crawler: Arc<dyn Crawler>,
        tracker: JobTracker,
        notifier: Arc<dyn Notifier>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            crawler,
            tracker,
            notifier,
            policy,
        }
    }

    /// 创建待执行任务并在后台运行
    ///
    /// # 返回值
    ///
    /// 新任务的ID，任务状态可通过任务记录器查询
    pub async fn enqueue(
        self: &Arc<Self>,
        source_url: String,
        options: CrawlOptions,
    ) -> Result<Uuid, TrackerError> {
        let job_id = self
            .tracker
            .create(options.content_type, &source_url, None)
            .await?;

        let runner = Arc::clone(self);
        tokio::spawn(async move {
            runner.run(job_id, &source_url, options).await;
        });

        Ok(job_id)
    }

    /// 带退避的重试循环
    ///
    /// 只有可重试的错误会消耗重试次数，其他错误立即返回
    async fn attempt(&self, job_id: Uuid, source_url: &str, options: &CrawlOptions) -> Result<CrawlResult, CrawlError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            counter!("crawl_attempts_total").increment(1);
            if let Err(e) = self.tracker.record_attempt(job_id).await {
                warn!(job_id = %job_id, "Failed to record attempt: {}", e);
            }

            match self.crawler.crawl(source_url, options).await {
                Ok(result) => return Ok(result),
                Err(e) if self.policy.should_retry_with_error(attempt, &e) => {
                    let backoff = self.policy.calculate_backoff(attempt);
                    warn!(
                        job_id = %job_id,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "Crawl attempt failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    error!(job_id = %job_id, attempt, "Crawl failed: {}", e);
                    return Err(e);
                }
            }
        }
    }

    async fn notify(&self, result: &CrawlResult) {
        let notification = AdminNotification::for_crawl(result);
        match self.notifier.notify_admins(&notification).await {
            Ok(delivered) => info!(delivered, kind = %notification.kind, "Admins notified"),
            Err(e) => error!("Failed to notify admins: {}", e),
        }
    }
}

#[async_trait]
impl CrawlJob for CrawlJobRunner {
    #[instrument(skip(self, options))]
    async fn run(&self, job_id: Uuid, source_url: &str, options: CrawlOptions) -> CrawlResult {
        let options = CrawlOptions {
            job_id: Some(job_id),
            ..options
        };

        if let Err(e) = self.tracker.start(job_id).await {
            error!("Job could not be started: {}", e);
            let result = CrawlResult::error(source_url.to_string(), e.to_string());
            counter!("crawl_runs_total", "status" => "error").increment(1);
            self.notify(&result).await;
            return result;
        }

        let started = Instant::now();
        let result = match self.attempt(job_id, source_url, &options).await {
            Ok(result) => {
                if let Err(e) = self.tracker.complete(job_id, JobSummary::from(&result)).await {
                    error!("Failed to mark job completed: {}", e);
                }
                result
            }
            Err(e) => {
                let message = e.to_string();
                if let Err(e) = self.tracker.fail(job_id, message.clone()).await {
                    error!("Failed to mark job failed: {}", e);
                }
                CrawlResult::error(source_url.to_string(), message)
            }
        };

        let status = if result.is_success() { "success" } else { "error" };
        counter!("crawl_runs_total", "status" => status).increment(1);
        histogram!("crawl_duration_seconds").record(started.elapsed().as_secs_f64());

        self.notify(&result).await;
        result
    }
}

#[cfg(test)]
#[path = "crawl_job_test.rs"]
mod tests;
