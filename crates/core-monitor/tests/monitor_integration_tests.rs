//! Integration tests for the failure monitor wired to the retry executor

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tether_core_monitor::{
    AttemptStore, FailureMonitor, HealthLevel, MonitorConfig, SqliteAttemptStore, StaticRegistry,
};
use tether_core_resilience::{CallError, CircuitConfig, CircuitRegistry, RetryConfig, RetryExecutor};

async fn sqlite_monitor(dir: &TempDir, ids: &[&str]) -> FailureMonitor {
    let path = dir.path().join("attempts.db");
    let store = SqliteAttemptStore::open(path.to_str().unwrap())
        .await
        .unwrap();
    FailureMonitor::new(
        Arc::new(store),
        Arc::new(StaticRegistry::new(ids.iter().copied())),
        MonitorConfig::default(),
    )
    .unwrap()
}

fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay: std::time::Duration::from_millis(1),
        max_delay: std::time::Duration::from_millis(5),
        backoff_factor: 2.0,
    }
}

#[tokio::test]
async fn test_every_attempt_is_persisted() {
    let dir = TempDir::new().unwrap();
    let monitor = sqlite_monitor(&dir, &["canvas"]).await;
    let executor = RetryExecutor::new(
        CircuitRegistry::new(CircuitConfig {
            failure_threshold: 100,
            ..Default::default()
        }),
        Arc::new(monitor.clone()),
        fast_retry(3),
    );

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let result = executor
        .with_retry("canvas", || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(format!("HTTP 503 (attempt {})", n + 1))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), 42);
    monitor.flush().await.unwrap();

    let status = monitor.get_status("canvas").await.unwrap();
    assert_eq!(status.total_attempts, 3);
    assert_eq!(status.success_count, 1);
    assert_eq!(status.failure_count, 2);
    assert_eq!(status.last_error.as_deref(), Some("HTTP 503 (attempt 2)"));
}

#[tokio::test]
async fn test_open_circuit_attempts_not_logged() {
    let dir = TempDir::new().unwrap();
    let monitor = sqlite_monitor(&dir, &["clever"]).await;
    let executor = RetryExecutor::new(
        CircuitRegistry::new(CircuitConfig {
            failure_threshold: 2,
            ..Default::default()
        }),
        Arc::new(monitor.clone()),
        fast_retry(5),
    );

    let result: Result<(), CallError<&str>> = executor
        .with_retry("clever", || async { Err("connection refused") })
        .await;
    assert!(result.unwrap_err().is_circuit_open());

    let again: Result<(), CallError<&str>> = executor
        .with_retry("clever", || async { Ok(()) })
        .await;
    assert!(again.unwrap_err().is_circuit_open());

    monitor.flush().await.unwrap();
    let status = monitor.get_status("clever").await.unwrap();
    assert_eq!(status.total_attempts, 2);

    let report = monitor.check_health("clever").await.unwrap();
    assert_eq!(report.health, HealthLevel::Unhealthy);
}

#[tokio::test]
async fn test_log_survives_restart() {
    let dir = TempDir::new().unwrap();

    {
        let monitor = sqlite_monitor(&dir, &["canvas"]).await;
        for _ in 0..19 {
            monitor.log_attempt("canvas", true, None);
        }
        monitor.log_attempt("canvas", false, Some("timeout".to_string()));
        monitor.shutdown().await.unwrap();
    }

    let monitor = sqlite_monitor(&dir, &["canvas", "schoology"]).await;
    let summary = monitor.monitor_all().await.unwrap();

    assert_eq!(summary.total, 2);
    assert_eq!(summary.healthy, 1);
    assert_eq!(summary.unhealthy, 1);

    let canvas = &summary.integrations[0];
    assert_eq!(canvas.status.success_rate, 95.0);
    assert_eq!(canvas.health, HealthLevel::Healthy);

    let metrics = monitor.get_metrics("canvas").await.unwrap();
    assert_eq!(metrics.total_attempts, 20);
    let errors: Vec<_> = metrics
        .daily
        .values()
        .flat_map(|day| day.errors.iter())
        .collect();
    assert_eq!(errors, vec!["timeout"]);
}

#[tokio::test]
async fn test_concurrent_integrations_logged_independently() {
    let dir = TempDir::new().unwrap();
    let monitor = sqlite_monitor(&dir, &[]).await;
    let executor = RetryExecutor::new(
        CircuitRegistry::new_default(),
        Arc::new(monitor.clone()),
        RetryConfig::single_attempt(),
    );

    let mut handles = Vec::new();
    for i in 0..20 {
        let executor = executor.clone();
        handles.push(tokio::spawn(async move {
            let id = if i % 2 == 0 { "canvas" } else { "clever" };
            let _: Result<(), CallError<&str>> = executor.with_retry(id, || async { Ok(()) }).await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    monitor.flush().await.unwrap();
    let since = chrono::Utc::now() - chrono::Duration::hours(1);
    assert_eq!(
        monitor.store().integrations_since(since).await.unwrap(),
        vec!["canvas", "clever"]
    );
    assert_eq!(monitor.get_status("canvas").await.unwrap().total_attempts, 10);
    assert_eq!(monitor.get_status("clever").await.unwrap().total_attempts, 10);
}
