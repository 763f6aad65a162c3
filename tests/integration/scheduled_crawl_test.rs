// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{create_test_app, mount_manga_site, seed_admin, TestApp};
use chrono::{Duration, Utc};
use mangacrawl::domain::models::crawl_result::{ContentType, CrawlResultStatus};
use mangacrawl::domain::models::scheduled_crawl::ScheduledCrawl;
use mangacrawl::domain::models::scheduled_job::JobStatus;
use mangacrawl::domain::repositories::scheduled_crawl_repository::ScheduledCrawlRepository;
use mangacrawl::domain::services::scheduled_crawl_service::{RegistryError, ScheduledCrawlService};
use mangacrawl::infrastructure::database::entities::{chapter, notification};
use sea_orm::{EntityTrait, PaginatorTrait};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// 创建定时爬取并把下次运行时间改到昨天
async fn due_crawl(app: &TestApp, source_url: String) -> ScheduledCrawl {
    let mut crawl = app
        .registry
        .create(
            "Demo Manga".to_string(),
            source_url,
            ContentType::Manga,
            "daily".to_string(),
        )
        .await
        .unwrap();
    crawl.next_run_at = Utc::now() - Duration::days(1);
    app.crawls.update(&crawl).await.unwrap()
}

async fn chapter_count(app: &TestApp) -> u64 {
    chapter::Entity::find().count(app.db.as_ref()).await.unwrap()
}

#[tokio::test]
async fn test_due_crawl_with_one_broken_chapter() {
    let server = MockServer::start().await;
    let url = mount_manga_site(&server, 10, &[7]).await;
    let app = create_test_app().await;
    seed_admin(&app.db, "admin@example.com").await;
    let crawl = due_crawl(&app, url).await;

    let due = app.registry.due_for_run(Utc::now()).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, crawl.id);

    let started = Utc::now();
    let summary = app.scheduler.run_tick(Utc::now()).await;

    assert_eq!(summary.total_scheduled_crawls, 1);
    assert!(summary.errors.is_empty());
    let outcome = &summary.executed_crawls[0];
    assert_eq!(outcome.status, CrawlResultStatus::Success);
    assert_eq!(outcome.successful, 9);
    assert_eq!(outcome.failed, 1);
    assert_eq!(outcome.skipped, 0);
    assert_eq!(chapter_count(&app).await, 9);

    let job = app.tracker.find(outcome.job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.scheduled_crawl_id, Some(crawl.id));
    assert_eq!(job.attempts, 1);
    assert!(job.result_summarized);
    let stored = job.summary_result.unwrap();
    assert_eq!(stored.total_chapters, 10);
    assert_eq!(stored.title.as_deref(), Some("Demo Manga"));

    let after = app.crawls.find_by_id(crawl.id).await.unwrap().unwrap();
    let last_run_at = after.last_run_at.unwrap();
    assert!(last_run_at >= started);
    assert_eq!(after.next_run_at, last_run_at + Duration::days(1));
    assert_eq!(after.manga_id, stored.manga_id);

    let notes = notification::Entity::find().all(app.db.as_ref()).await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].notification_type, "crawl_success");
    assert!(notes[0].content.contains("9 crawled"));

    // Not due anymore.
    assert!(app.registry.due_for_run(Utc::now()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_second_run_skips_recorded_chapters() {
    let server = MockServer::start().await;
    let url = mount_manga_site(&server, 10, &[7]).await;
    let app = create_test_app().await;
    let crawl = due_crawl(&app, url).await;

    app.scheduler.run_tick(Utc::now()).await;
    let summary = app.scheduler.run_now(Some(crawl.id)).await;

    let outcome = &summary.executed_crawls[0];
    assert_eq!(outcome.status, CrawlResultStatus::Success);
    assert_eq!(outcome.skipped, 9);
    assert_eq!(outcome.successful, 0);
    assert_eq!(outcome.failed, 1);
    assert_eq!(chapter_count(&app).await, 9);
}

#[tokio::test]
async fn test_unreachable_site_is_retried_then_failed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/manga/down"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let app = create_test_app().await;
    seed_admin(&app.db, "admin@example.com").await;
    let crawl = due_crawl(&app, format!("{}/manga/down", server.uri())).await;

    let summary = app.scheduler.run_tick(Utc::now()).await;

    assert_eq!(summary.executed_crawls.len(), 1);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].scheduled_crawl_id, Some(crawl.id));
    let outcome = &summary.executed_crawls[0];
    assert_eq!(outcome.status, CrawlResultStatus::Error);

    let job = app.tracker.find(outcome.job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, 3);
    assert!(job.error_message.unwrap().contains("503"));

    // A failed crawl still moves to its next interval.
    let after = app.crawls.find_by_id(crawl.id).await.unwrap().unwrap();
    assert!(after.next_run_at > Utc::now());
    assert!(after.manga_id.is_none());

    let notes = notification::Entity::find().all(app.db.as_ref()).await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].notification_type, "crawl_failure");
    server.verify().await;
}

#[tokio::test]
async fn test_disabled_and_future_crawls_are_not_due() {
    let app = create_test_app().await;

    let mut disabled = app
        .registry
        .create(
            "Disabled".to_string(),
            "https://example.com/a".to_string(),
            ContentType::Manga,
            "hourly".to_string(),
        )
        .await
        .unwrap();
    disabled.enabled = false;
    disabled.next_run_at = Utc::now() - Duration::days(2);
    app.crawls.update(&disabled).await.unwrap();

    app.registry
        .create(
            "Future".to_string(),
            "https://example.com/b".to_string(),
            ContentType::Novel,
            "weekly".to_string(),
        )
        .await
        .unwrap();

    assert!(app.registry.due_for_run(Utc::now()).await.unwrap().is_empty());
    let summary = app.scheduler.run_tick(Utc::now()).await;
    assert_eq!(summary.total_scheduled_crawls, 0);
}

#[tokio::test]
async fn test_crawl_runs_once_across_registries_sharing_a_database() {
    let server = MockServer::start().await;
    let url = mount_manga_site(&server, 3, &[]).await;
    let app = create_test_app().await;
    let crawl = due_crawl(&app, url).await;

    // 第二个实例有自己的执行中集合，相当于另一个进程
    let other = Arc::new(ScheduledCrawlService::new(
        app.crawls.clone(),
        app.tracker.clone(),
        app.runner.clone(),
    ));

    let now = Utc::now();
    let seen_here = app.registry.due_for_run(now).await.unwrap();
    let seen_there = other.due_for_run(now).await.unwrap();
    assert_eq!(seen_here.len(), 1);
    assert_eq!(seen_there.len(), 1);

    let outcome = app.registry.execute(&seen_here[0]).await.unwrap();
    assert_eq!(outcome.successful, 3);

    let stale = other.execute(&seen_there[0]).await;
    assert!(matches!(stale, Err(RegistryError::AlreadyRunning(id)) if id == crawl.id));

    let index_hits = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/manga/demo")
        .count();
    assert_eq!(index_hits, 1);
    assert_eq!(chapter_count(&app).await, 3);
}
