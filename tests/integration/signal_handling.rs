use std::time::Duration;

use crate::support::scripted::{engine, RecordingSink, ScriptedSource};
use log_harvester::harvester::Scheduler;
use log_harvester::shutdown::ShutdownCoordinator;
use tempfile::TempDir;

#[tokio::test]
async fn stop_request_wakes_waiter() {
    let shutdown = ShutdownCoordinator::shared();
    let waiter = {
        let handle = shutdown.clone();
        tokio::spawn(async move {
            handle.wait_for_shutdown().await;
        })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    shutdown.request_shutdown();

    let result = tokio::time::timeout(Duration::from_secs(1), waiter).await;
    assert!(result.is_ok());
}

/// A request that lands before the wait starts must not be missed
#[tokio::test]
async fn stop_requested_before_wait_is_observed() {
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();

    let result =
        tokio::time::timeout(Duration::from_millis(100), shutdown.wait_for_shutdown()).await;
    assert!(result.is_ok(), "wait_for_shutdown missed an earlier request");
}

#[tokio::test]
async fn every_waiter_is_notified() {
    let shutdown = ShutdownCoordinator::shared();
    let waiters: Vec<_> = (0..10)
        .map(|_| {
            let handle = shutdown.clone();
            tokio::spawn(async move { handle.wait_for_shutdown().await })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(10)).await;
    shutdown.request_shutdown();

    for waiter in waiters {
        let result = tokio::time::timeout(Duration::from_secs(1), waiter).await;
        assert!(result.is_ok(), "a waiter was not notified");
    }
}

/// One Ctrl+C handler stops every scheduler sharing the coordinator
#[tokio::test(start_paused = true)]
async fn one_request_stops_all_schedulers() {
    let dir = TempDir::new().unwrap();
    let shutdown = ShutdownCoordinator::shared();

    let handles: Vec<_> = ["first", "second"]
        .iter()
        .map(|name| {
            let engine = engine(
                &dir.path().join(name),
                &ScriptedSource::new(),
                &RecordingSink::new(),
            );
            Scheduler::new(engine, shutdown.clone()).spawn()
        })
        .collect();

    tokio::task::yield_now().await;
    shutdown.request_shutdown();

    for handle in handles {
        let summary = handle.join().await.unwrap();
        assert_eq!(summary.cycles_completed, 0);
    }
}
