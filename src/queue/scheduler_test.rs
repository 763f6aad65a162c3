// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::*;
use crate::domain::models::crawl_result::{
    ChapterOutcome, ChapterStatus, ContentType, CrawlOptions, CrawlResult,
};
use crate::domain::models::scheduled_job::ScheduledJob;
use crate::domain::repositories::scheduled_crawl_repository::ScheduledCrawlRepository;
use crate::domain::repositories::scheduled_job_repository::{
    RepositoryError, ScheduledJobRepository,
};
use crate::domain::services::job_tracker::JobTracker;
use crate::domain::services::scheduled_crawl_service::CrawlJob;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

#[derive(Default)]
struct MemoryCrawls {
    crawls: Mutex<HashMap<Uuid, ScheduledCrawl>>,
}

#[async_trait]
impl ScheduledCrawlRepository for MemoryCrawls {
    async fn create(&self, crawl: &ScheduledCrawl) -> Result<ScheduledCrawl, RepositoryError> {
        self.crawls.lock().insert(crawl.id, crawl.clone());
        Ok(crawl.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ScheduledCrawl>, RepositoryError> {
        Ok(self.crawls.lock().get(&id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<ScheduledCrawl>, RepositoryError> {
        Ok(self.crawls.lock().values().cloned().collect())
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledCrawl>, RepositoryError> {
        Ok(self
            .crawls
            .lock()
            .values()
            .filter(|c| c.is_due(now))
            .cloned()
            .collect())
    }

    async fn update(&self, crawl: &ScheduledCrawl) -> Result<ScheduledCrawl, RepositoryError> {
        self.crawls.lock().insert(crawl.id, crawl.clone());
        Ok(crawl.clone())
    }

    async fn claim(
        &self,
        id: Uuid,
        due_by: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut crawls = self.crawls.lock();
        match crawls.get_mut(&id) {
            Some(crawl) if crawl.next_run_at <= due_by => {
                crawl.next_run_at = next_run_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_run(
        &self,
        id: Uuid,
        last_run_at: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut crawls = self.crawls.lock();
        let crawl = crawls.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        crawl.last_run_at = Some(last_run_at);
        crawl.next_run_at = next_run_at;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        Ok(self.crawls.lock().remove(&id).is_some())
    }
}

#[derive(Default)]
struct MemoryJobs {
    jobs: Mutex<HashMap<Uuid, ScheduledJob>>,
}

#[async_trait]
impl ScheduledJobRepository for MemoryJobs {
    async fn create(&self, job: &ScheduledJob) -> Result<ScheduledJob, RepositoryError> {
        self.jobs.lock().insert(job.id, job.clone());
        Ok(job.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ScheduledJob>, RepositoryError> {
        Ok(self.jobs.lock().get(&id).cloned())
    }

    async fn update(&self, job: &ScheduledJob) -> Result<ScheduledJob, RepositoryError> {
        self.jobs.lock().insert(job.id, job.clone());
        Ok(job.clone())
    }
}

/// 来源地址包含 `broken` 时返回失败结果
#[derive(Default)]
struct StubJob {
    runs: Mutex<Vec<String>>,
}

#[async_trait]
impl CrawlJob for StubJob {
    async fn run(&self, _job_id: Uuid, source_url: &str, _options: CrawlOptions) -> CrawlResult {
        self.runs.lock().push(source_url.to_string());
        if source_url.contains("broken") {
            return CrawlResult::error(source_url.to_string(), "site unreachable".to_string());
        }
        CrawlResult::success(
            source_url.to_string(),
            Uuid::new_v4(),
            "Demo".to_string(),
            vec![ChapterOutcome {
                number: 1.0,
                url: format!("{}/chapter-1", source_url),
                status: ChapterStatus::Success,
                message: String::new(),
                images: Vec::new(),
            }],
        )
    }
}

struct Fixture {
    crawls: Arc<MemoryCrawls>,
    job: Arc<StubJob>,
    registry: Arc<ScheduledCrawlService>,
}

fn fixture() -> Fixture {
    let crawls = Arc::new(MemoryCrawls::default());
    let job = Arc::new(StubJob::default());
    let tracker = JobTracker::new(Arc::new(MemoryJobs::default()));
    let registry = Arc::new(ScheduledCrawlService::new(
        crawls.clone(),
        tracker,
        job.clone(),
    ));
    Fixture {
        crawls,
        job,
        registry,
    }
}

fn seed(fixture: &Fixture, url: &str, next_run_at: DateTime<Utc>) -> Uuid {
    let mut crawl = ScheduledCrawl::new(
        "Demo".to_string(),
        url.to_string(),
        ContentType::Manga,
        "daily".to_string(),
    )
    .unwrap();
    crawl.next_run_at = next_run_at;
    let id = crawl.id;
    fixture.crawls.crawls.lock().insert(id, crawl);
    id
}

fn driver(fixture: &Fixture, lock_check: Duration, tick: Duration) -> Arc<SchedulerDriver> {
    Arc::new(SchedulerDriver::with_intervals(
        fixture.registry.clone(),
        lock_check,
        tick,
    ))
}

#[tokio::test]
async fn test_tick_runs_due_crawls_and_reports_failures() {
    let f = fixture();
    let now = Utc::now();
    let ok = seed(&f, "https://example.com/ok", now - chrono::Duration::days(1));
    let broken = seed(&f, "https://example.com/broken", now - chrono::Duration::hours(1));
    let future = seed(&f, "https://example.com/later", now + chrono::Duration::days(1));

    let d = driver(&f, Duration::from_secs(60), Duration::from_secs(60));
    let summary = d.run_tick(now).await;

    assert_eq!(summary.total_scheduled_crawls, 2);
    assert_eq!(summary.executed_crawls.len(), 2);
    assert_eq!(summary.executed_crawls[0].scheduled_crawl_id, ok);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].scheduled_crawl_id, Some(broken));
    assert_eq!(summary.errors[0].message, "site unreachable");

    let crawls = f.crawls.crawls.lock();
    for id in [ok, broken] {
        let crawl = &crawls[&id];
        assert!(crawl.next_run_at > now);
        assert!(crawl.last_run_at.is_some());
    }
    assert!(crawls[&future].last_run_at.is_none());
}

#[tokio::test]
async fn test_run_now_bypasses_due_check() {
    let f = fixture();
    let id = seed(&f, "https://example.com/later", Utc::now() + chrono::Duration::days(3));

    let d = driver(&f, Duration::from_secs(60), Duration::from_secs(60));
    let summary = d.run_now(Some(id)).await;

    assert_eq!(summary.total_scheduled_crawls, 1);
    assert_eq!(summary.executed_crawls.len(), 1);
    assert!(summary.errors.is_empty());
    assert_eq!(f.job.runs.lock().len(), 1);
}

#[tokio::test]
async fn test_run_now_unknown_id_is_structured_error() {
    let f = fixture();
    seed(&f, "https://example.com/ok", Utc::now() - chrono::Duration::days(1));
    let missing = Uuid::new_v4();

    let d = driver(&f, Duration::from_secs(60), Duration::from_secs(60));
    let summary = d.run_now(Some(missing)).await;

    assert_eq!(summary.total_scheduled_crawls, 0);
    assert!(summary.executed_crawls.is_empty());
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].scheduled_crawl_id, Some(missing));
    assert!(f.job.runs.lock().is_empty());
}

#[tokio::test]
async fn test_stopped_driver_skips_remaining_crawls() {
    let f = fixture();
    let now = Utc::now();
    seed(&f, "https://example.com/a", now - chrono::Duration::days(1));
    seed(&f, "https://example.com/b", now - chrono::Duration::days(1));

    let d = driver(&f, Duration::from_secs(60), Duration::from_secs(60));
    d.stop();
    let summary = d.run_tick(now).await;

    assert_eq!(summary.total_scheduled_crawls, 2);
    assert!(summary.executed_crawls.is_empty());
    assert!(f.job.runs.lock().is_empty());
}

#[tokio::test]
async fn test_demotion_stops_scheduler() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scheduler.lock");
    let f = fixture();

    let coordinator = LockCoordinator::for_current_process(&path);
    let guard = coordinator.acquire().await.unwrap().unwrap();

    let d = driver(&f, Duration::from_millis(20), Duration::from_secs(3600));
    let mut stopped = d.subscribe();
    d.start(coordinator);

    // Another process takes over the lock.
    tokio::fs::write(&path, "1").await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), stopped.wait_for(|s| *s))
        .await
        .expect("scheduler was not stopped")
        .unwrap();
    assert!(d.is_stopped());

    // A crawl becoming due afterwards is never executed by the tick task.
    seed(&f, "https://example.com/ok", Utc::now() - chrono::Duration::days(1));
    d.shutdown().await;
    assert!(f.job.runs.lock().is_empty());

    // The guard must not remove a lock that now belongs to someone else.
    drop(guard);
    assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "1");
}

#[tokio::test]
async fn test_tick_task_executes_due_crawls() {
    let f = fixture();
    seed(&f, "https://example.com/ok", Utc::now() - chrono::Duration::days(1));
    let dir = TempDir::new().unwrap();
    let coordinator = LockCoordinator::for_current_process(dir.path().join("scheduler.lock"));
    let _guard = coordinator.acquire().await.unwrap().unwrap();

    let d = driver(&f, Duration::from_secs(60), Duration::from_millis(20));
    d.start(coordinator);

    for _ in 0..100 {
        if !f.job.runs.lock().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    d.shutdown().await;

    // Executed once; next_run_at moved a day ahead so later ticks skip it.
    assert_eq!(f.job.runs.lock().len(), 1);
}
