// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::Utc;
use mangacrawl::config::settings::Settings;
use mangacrawl::domain::services::crawl_service::CrawlService;
use mangacrawl::domain::services::job_tracker::JobTracker;
use mangacrawl::domain::services::scheduled_crawl_service::ScheduledCrawlService;
use mangacrawl::engines::reqwest_engine::ReqwestEngine;
use mangacrawl::infrastructure::database::entities::user;
use mangacrawl::infrastructure::repositories::content_repo_impl::ContentRepositoryImpl;
use mangacrawl::infrastructure::repositories::notifier_impl::DatabaseNotifier;
use mangacrawl::infrastructure::repositories::scheduled_crawl_repo_impl::ScheduledCrawlRepositoryImpl;
use mangacrawl::infrastructure::repositories::scheduled_job_repo_impl::ScheduledJobRepositoryImpl;
use mangacrawl::queue::scheduler::SchedulerDriver;
use mangacrawl::utils::retry_policy::RetryPolicy;
use mangacrawl::workers::crawl_job::CrawlJobRunner;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// 组装好的完整服务，数据库为内存 SQLite
pub struct TestApp {
    pub db: Arc<DatabaseConnection>,
    pub crawls: Arc<ScheduledCrawlRepositoryImpl>,
    pub tracker: JobTracker,
    pub runner: Arc<CrawlJobRunner>,
    pub registry: Arc<ScheduledCrawlService>,
    pub scheduler: Arc<SchedulerDriver>,
}

/// 默认配置，缩短退避并放开限流
pub fn test_settings() -> Settings {
    let mut settings = Settings::defaults().unwrap();
    settings.crawler.requests_per_second = 1000;
    settings.crawler.request_timeout_secs = 5;
    settings.crawler.retry.initial_backoff_ms = 10;
    settings.crawler.retry.backoff_multiplier = 2.0;
    settings.crawler.retry.max_backoff_ms = 200;
    settings
}

pub async fn create_test_app() -> TestApp {
    let settings = test_settings();

    let db = Arc::new(Database::connect("sqlite::memory:").await.unwrap());
    Migrator::up(db.as_ref(), None).await.unwrap();

    let crawls = Arc::new(ScheduledCrawlRepositoryImpl::new(db.clone()));
    let tracker = JobTracker::new(Arc::new(ScheduledJobRepositoryImpl::new(db.clone())));

    let engine = Arc::new(
        ReqwestEngine::new(
            &settings.crawler.user_agent,
            settings.crawler.requests_per_second,
        )
        .unwrap(),
    );
    let crawler = Arc::new(
        CrawlService::new(
            engine,
            Arc::new(ContentRepositoryImpl::new(db.clone())),
            &settings.crawler,
        )
        .unwrap(),
    );
    let runner = Arc::new(CrawlJobRunner::new(
        crawler,
        tracker.clone(),
        Arc::new(DatabaseNotifier::new(db.clone())),
        RetryPolicy::from(&settings.crawler.retry),
    ));
    let registry = Arc::new(ScheduledCrawlService::new(
        crawls.clone(),
        tracker.clone(),
        runner.clone(),
    ));
    let scheduler = Arc::new(SchedulerDriver::with_intervals(
        registry.clone(),
        Duration::from_secs(60),
        Duration::from_secs(3600),
    ));

    TestApp {
        db,
        crawls,
        tracker,
        runner,
        registry,
        scheduler,
    }
}

pub async fn seed_admin(db: &DatabaseConnection, email: &str) {
    user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        admin: Set(true),
        created_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await
    .unwrap();
}

/// 挂载一个漫画站点：目录页按最新在前列出章节，`failing` 中的章节返回500
///
/// 返回目录页地址
pub async fn mount_manga_site(server: &MockServer, chapters: u32, failing: &[u32]) -> String {
    let links: String = (1..=chapters)
        .rev()
        .map(|n| format!(r#"<li><a href="/manga/demo/chapter-{n}">Chapter {n}</a></li>"#))
        .collect();
    let index = format!(
        r#"<html><body><h1>Demo Manga</h1><ul class="chapter-list">{}</ul></body></html>"#,
        links
    );

    Mock::given(method("GET"))
        .and(path("/manga/demo"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(index, "text/html"))
        .mount(server)
        .await;

    for n in 1..=chapters {
        let response = if failing.contains(&n) {
            ResponseTemplate::new(500)
        } else {
            let page = format!(
                r#"<html><body><div class="reading-content"><img src="/img/{n}-1.jpg"><img data-src="/img/{n}-2.jpg"></div></body></html>"#
            );
            ResponseTemplate::new(200).set_body_raw(page, "text/html")
        };
        Mock::given(method("GET"))
            .and(path(format!("/manga/demo/chapter-{}", n)))
            .respond_with(response)
            .mount(server)
            .await;
    }

    format!("{}/manga/demo", server.uri())
}
