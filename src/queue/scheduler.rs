// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::SchedulerSettings;
use crate::domain::models::crawl_result::CrawlResultStatus;
use crate::domain::models::scheduled_crawl::ScheduledCrawl;
use crate::domain::services::scheduled_crawl_service::{ExecutionOutcome, ScheduledCrawlService};
use crate::infrastructure::process_lock::{LockCoordinator, LockHealth};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use metrics::counter;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};
use uuid::Uuid;

/// 单个定时爬取在一次tick中的错误
#[derive(Debug, Clone, Serialize)]
pub struct TickError {
    /// 出错的定时爬取（查询到期列表失败时为空）
    pub scheduled_crawl_id: Option<Uuid>,
    pub message: String,
}

/// 一次tick的结果摘要
#[derive(Debug, Clone, Serialize)]
pub struct TickSummary {
    pub timestamp: DateTime<Utc>,
    pub total_scheduled_crawls: usize,
    pub executed_crawls: Vec<ExecutionOutcome>,
    pub errors: Vec<TickError>,
}

impl TickSummary {
    fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            total_scheduled_crawls: 0,
            executed_crawls: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn record_failure(&mut self, scheduled_crawl_id: Option<Uuid>, message: String) {
        self.errors.push(TickError {
            scheduled_crawl_id,
            message,
        });
    }
}

/// 调度驱动器
///
/// 锁健康检查和到期检查是两个独立的定时任务，
/// 长时间运行的爬取不会推迟锁检查。
/// 检测到锁被其他进程接管时发送停止信号，本进程不再执行任何爬取。
pub struct SchedulerDriver {
    registry: Arc<ScheduledCrawlService>,
    lock_check_interval: Duration,
    tick_interval: Duration,
    stop_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl SchedulerDriver {
    pub fn new(registry: Arc<ScheduledCrawlService>, settings: &SchedulerSettings) -> Self {
        Self::with_intervals(
            registry,
            settings.lock_check_interval(),
            settings.tick_interval(),
        )
    }

    pub fn with_intervals(
        registry: Arc<ScheduledCrawlService>,
        lock_check_interval: Duration,
        tick_interval: Duration,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            registry,
            lock_check_interval,
            tick_interval,
            stop_tx,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// 启动锁检查与到期检查两个后台任务
    ///
    /// 调用方必须已经通过 `coordinator` 取得锁
    pub fn start(self: &Arc<Self>, coordinator: LockCoordinator) {
        let lock_task = {
            let driver = Arc::clone(self);
            let mut stop_rx = self.subscribe();
            tokio::spawn(async move {
                let mut ticker = interval(driver.lock_check_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // The lock was just acquired; skip the immediate first tick.
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {}
                        _ = stop_rx.changed() => break,
                    }
                    match coordinator.verify_and_heal().await {
                        LockHealth::Owned | LockHealth::Healed => {}
                        LockHealth::Demoted { owner } => {
                            warn!(?owner, pid = coordinator.pid(), "Lock taken over by another process, scheduler stopped");
                            driver.stop();
                            break;
                        }
                        LockHealth::Lost => {
                            error!(pid = coordinator.pid(), "Lock could not be verified, scheduler stopped");
                            driver.stop();
                            break;
                        }
                    }
                }
            })
        };

        let tick_task = {
            let driver = Arc::clone(self);
            let mut stop_rx = self.subscribe();
            tokio::spawn(async move {
                let mut ticker = interval(driver.tick_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {}
                        _ = stop_rx.changed() => break,
                    }
                    if driver.is_stopped() {
                        break;
                    }
                    driver.run_tick(Utc::now()).await;
                }
            })
        };

        let mut handles = self.handles.lock();
        handles.push(lock_task);
        handles.push(tick_task);
        info!(
            lock_check_secs = self.lock_check_interval.as_secs(),
            tick_secs = self.tick_interval.as_secs(),
            "Scheduler started"
        );
    }

    /// 发送停止信号，不等待后台任务
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// 订阅停止信号
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.stop_tx.subscribe()
    }

    /// 停止并等待后台任务结束
    ///
    /// 正在执行的tick会先跑完
    pub async fn shutdown(&self) {
        self.stop();
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock());
        for result in join_all(handles).await {
            if let Err(e) = result {
                error!("Scheduler task ended abnormally: {}", e);
            }
        }
        info!("Scheduler shut down");
    }

    /// 执行一次定时到期检查
    ///
    /// 到期的定时爬取逐个顺序执行；收到停止信号后剩余的不再执行
    pub async fn run_tick(&self, now: DateTime<Utc>) -> TickSummary {
        counter!("scheduler_ticks_total").increment(1);
        let mut summary = TickSummary::new(now);

        let due = match self.registry.due_for_run(now).await {
            Ok(due) => due,
            Err(e) => {
                error!("Failed to load due scheduled crawls: {}", e);
                summary.record_failure(None, e.to_string());
                return summary;
            }
        };
        summary.total_scheduled_crawls = due.len();

        for (index, crawl) in due.iter().enumerate() {
            if self.is_stopped() {
                warn!(remaining = due.len() - index, "Scheduler stopped mid-tick");
                break;
            }
            self.execute_into(crawl, &mut summary).await;
        }

        info!(
            total = summary.total_scheduled_crawls,
            executed = summary.executed_crawls.len(),
            errors = summary.errors.len(),
            "Scheduler tick finished"
        );
        summary
    }

    /// 手动触发
    ///
    /// 指定ID时跳过到期检查立即执行该定时爬取，否则执行全部到期项
    pub async fn run_now(&self, scheduled_crawl_id: Option<Uuid>) -> TickSummary {
        let now = Utc::now();
        let Some(id) = scheduled_crawl_id else {
            return self.run_manual_tick(now).await;
        };

        let mut summary = TickSummary::new(now);
        match self.registry.find(id).await {
            Ok(crawl) => {
                summary.total_scheduled_crawls = 1;
                self.execute_into(&crawl, &mut summary).await;
            }
            Err(e) => {
                warn!(crawl_id = %id, "Manual trigger failed: {}", e);
                summary.record_failure(Some(id), e.to_string());
            }
        }
        summary
    }

    /// 手动触发不受停止信号限制
    async fn run_manual_tick(&self, now: DateTime<Utc>) -> TickSummary {
        let mut summary = TickSummary::new(now);
        match self.registry.due_for_run(now).await {
            Ok(due) => {
                summary.total_scheduled_crawls = due.len();
                for crawl in &due {
                    self.execute_into(crawl, &mut summary).await;
                }
            }
            Err(e) => summary.record_failure(None, e.to_string()),
        }
        summary
    }

    async fn execute_into(&self, crawl: &ScheduledCrawl, summary: &mut TickSummary) {
        match self.registry.execute(crawl).await {
            Ok(outcome) => {
                if outcome.status == CrawlResultStatus::Error {
                    summary.record_failure(
                        Some(crawl.id),
                        outcome
                            .error
                            .clone()
                            .unwrap_or_else(|| "crawl failed".to_string()),
                    );
                }
                summary.executed_crawls.push(outcome);
            }
            Err(e) => {
                error!(crawl_id = %crawl.id, "Scheduled crawl execution failed: {}", e);
                summary.record_failure(Some(crawl.id), e.to_string());
            }
        }
    }
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod tests;
