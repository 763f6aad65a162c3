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

use mangacrawl::config::settings::Settings;
use mangacrawl::domain::services::crawl_service::CrawlService;
use mangacrawl::domain::services::job_tracker::JobTracker;
use mangacrawl::domain::services::scheduled_crawl_service::ScheduledCrawlService;
use mangacrawl::engines::reqwest_engine::ReqwestEngine;
use mangacrawl::infrastructure::database::connection;
use mangacrawl::infrastructure::process_lock::LockCoordinator;
use mangacrawl::infrastructure::repositories::content_repo_impl::ContentRepositoryImpl;
use mangacrawl::infrastructure::repositories::notifier_impl::DatabaseNotifier;
use mangacrawl::infrastructure::repositories::scheduled_crawl_repo_impl::ScheduledCrawlRepositoryImpl;
use mangacrawl::infrastructure::repositories::scheduled_job_repo_impl::ScheduledJobRepositoryImpl;
use mangacrawl::presentation::routes::{self, AppState};
use mangacrawl::queue::scheduler::SchedulerDriver;
use mangacrawl::utils::retry_policy::RetryPolicy;
use mangacrawl::workers::crawl_job::CrawlJobRunner;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use mangacrawl::utils::telemetry;
use migration::{Migrator, MigratorTrait};

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动服务
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting mangacrawl...");

    // 2. Load configuration
    let settings = Arc::new(Settings::new()?);
    info!("Configuration loaded");

    if settings.metrics.enabled {
        mangacrawl::infrastructure::metrics::init_metrics(&settings.metrics.listen_addr);
    }

    // 3. Connect to database
    let db = connection::create_pool(&settings.database).await?;
    let db = Arc::new(db);
    info!("Database connection established");

    info!("Running database migrations...");
    Migrator::up(db.as_ref(), None).await?;
    info!("Database migrations applied");

    // 4. Initialize components
    let crawl_repo = Arc::new(ScheduledCrawlRepositoryImpl::new(db.clone()));
    let job_repo = Arc::new(ScheduledJobRepositoryImpl::new(db.clone()));
    let content_repo = Arc::new(ContentRepositoryImpl::new(db.clone()));
    let notifier = Arc::new(DatabaseNotifier::new(db.clone()));

    let engine = Arc::new(ReqwestEngine::new(
        &settings.crawler.user_agent,
        settings.crawler.requests_per_second,
    )?);
    let crawler = Arc::new(CrawlService::new(engine, content_repo, &settings.crawler)?);

    let tracker = JobTracker::new(job_repo);
    let runner = Arc::new(CrawlJobRunner::new(
        crawler,
        tracker.clone(),
        notifier,
        RetryPolicy::from(&settings.crawler.retry),
    ));
    let registry = Arc::new(ScheduledCrawlService::new(
        crawl_repo,
        tracker.clone(),
        runner.clone(),
    ));
    let scheduler = Arc::new(SchedulerDriver::new(registry.clone(), &settings.scheduler));

    // 5. Start the scheduler if this process wins the lock
    let lock_guard = if settings.scheduler.enabled {
        let coordinator = LockCoordinator::for_current_process(&settings.scheduler.lock_path);
        match coordinator.acquire().await {
            Ok(Some(guard)) => {
                scheduler.start(coordinator);
                Some(guard)
            }
            Ok(None) => {
                info!("Another process owns the scheduler, not starting it here");
                None
            }
            Err(e) => {
                error!("Scheduler lock unavailable, not starting scheduler: {}", e);
                None
            }
        }
    } else {
        info!("Scheduler disabled by configuration");
        None
    };

    // 6. Start HTTP server
    let app = routes::routes(AppState {
        registry,
        scheduler: scheduler.clone(),
        runner,
        tracker,
    });

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // 7. Stop scheduling before giving up the lock
    scheduler.shutdown().await;
    if let Some(guard) = lock_guard {
        if let Err(e) = guard.release().await {
            warn!("Failed to release scheduler lock: {}", e);
        }
    }

    served?;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
