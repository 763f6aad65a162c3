// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::create_test_app;
use mangacrawl::infrastructure::process_lock::{LockCoordinator, LockHealth};
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn test_concurrent_acquire_has_single_winner() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scheduler.lock");

    // pid 1 is always alive, so neither side treats the other as stale.
    let ours = LockCoordinator::for_current_process(&path);
    let theirs = LockCoordinator::new(&path, 1);

    let (a, b) = tokio::join!(ours.acquire(), theirs.acquire());
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(a.is_some() ^ b.is_some());

    let winner = if a.is_some() { ours.pid() } else { theirs.pid() };
    let content = tokio::fs::read_to_string(&path).await.unwrap();
    assert_eq!(content, winner.to_string());
}

#[tokio::test]
async fn test_deleted_lock_is_healed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scheduler.lock");
    let coordinator = LockCoordinator::for_current_process(&path);
    let guard = coordinator.acquire().await.unwrap().unwrap();

    tokio::fs::remove_file(&path).await.unwrap();
    assert_eq!(coordinator.verify_and_heal().await, LockHealth::Healed);
    assert_eq!(
        tokio::fs::read_to_string(&path).await.unwrap(),
        coordinator.pid().to_string()
    );

    assert!(guard.release().await.unwrap());
    assert!(!path.exists());
}

#[tokio::test]
async fn test_takeover_stops_running_scheduler() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scheduler.lock");
    let app = create_test_app().await;

    let coordinator = LockCoordinator::for_current_process(&path);
    let _guard = coordinator.acquire().await.unwrap().unwrap();

    let driver = std::sync::Arc::new(mangacrawl::queue::scheduler::SchedulerDriver::with_intervals(
        app.registry.clone(),
        Duration::from_millis(20),
        Duration::from_secs(3600),
    ));
    let mut stopped = driver.subscribe();
    driver.start(coordinator);

    tokio::fs::write(&path, "1").await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), stopped.wait_for(|s| *s))
        .await
        .expect("scheduler kept running after takeover")
        .unwrap();
    driver.shutdown().await;
    assert!(driver.is_stopped());
}
