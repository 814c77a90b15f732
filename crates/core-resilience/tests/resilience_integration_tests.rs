//! Integration tests for the gate and retry loop working together

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tether_core_resilience::{
    AttemptRecorder, CallError, CircuitConfig, CircuitRegistry, CircuitState, NoopRecorder,
    RetryConfig, RetryExecutor,
};

#[derive(Default)]
struct CountingRecorder {
    successes: AtomicUsize,
    failures: AtomicUsize,
}

impl AttemptRecorder for CountingRecorder {
    fn record_attempt(&self, _integration_id: &str, success: bool, _error: Option<String>) {
        if success {
            self.successes.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_threshold_opens_for_any_t() {
    for threshold in 1..=8u32 {
        let registry = CircuitRegistry::new(CircuitConfig {
            failure_threshold: threshold,
            ..Default::default()
        });
        let id = format!("lms-{}", threshold);
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..threshold {
            let counter = calls.clone();
            let _: Result<(), CallError<&str>> = registry
                .execute(&id, || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err("down")
                })
                .await;
        }
        assert_eq!(registry.status(&id).state, CircuitState::Open);

        let counter = calls.clone();
        let rejected: Result<(), CallError<&str>> = registry
            .execute(&id, || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(rejected.unwrap_err().is_circuit_open());
        assert_eq!(calls.load(Ordering::SeqCst), threshold as usize);
    }
}

#[tokio::test(start_paused = true)]
async fn test_retry_resumes_after_circuit_recovers() {
    let recorder = Arc::new(CountingRecorder::default());
    let circuits = CircuitRegistry::new(CircuitConfig {
        failure_threshold: 2,
        reset_timeout: Duration::from_secs(10),
        half_open_timeout: Duration::from_secs(5),
    });
    let executor = RetryExecutor::new(circuits, recorder.clone(), RetryConfig::default());

    let first: Result<(), CallError<&str>> = executor
        .with_retry("oauth", || async { Err("invalid_grant") })
        .await;
    assert!(first.unwrap_err().is_circuit_open());
    assert_eq!(recorder.failures.load(Ordering::SeqCst), 2);

    tokio::time::advance(Duration::from_secs(10)).await;

    let token = executor
        .with_retry("oauth", || async { Ok::<_, &str>("access-token") })
        .await
        .unwrap();
    assert_eq!(token, "access-token");
    assert_eq!(recorder.successes.load(Ordering::SeqCst), 1);

    let snapshot = executor.circuits().status("oauth");
    assert_eq!(snapshot.state, CircuitState::Closed);
    assert_eq!(snapshot.failure_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_trial_reopens_and_stops_retry() {
    let circuits = CircuitRegistry::new(CircuitConfig {
        failure_threshold: 1,
        reset_timeout: Duration::from_secs(10),
        ..Default::default()
    });
    let executor = RetryExecutor::new(circuits, Arc::new(NoopRecorder), RetryConfig::default());

    let _: Result<(), CallError<&str>> = executor
        .with_retry("clever", || async { Err("HTTP 500") })
        .await;
    tokio::time::advance(Duration::from_secs(10)).await;

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let result: Result<(), CallError<&str>> = executor
        .with_retry("clever", || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err("HTTP 500") }
        })
        .await;

    // Trial failed, circuit reopened, second attempt gated
    assert!(result.unwrap_err().is_circuit_open());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let snapshot = executor.circuits().status("clever");
    assert_eq!(snapshot.state, CircuitState::Open);
    assert_eq!(snapshot.failure_count, 2);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_retry_future_stops_attempts() {
    let recorder = Arc::new(CountingRecorder::default());
    let executor = RetryExecutor::new(
        CircuitRegistry::new_default(),
        recorder.clone(),
        RetryConfig::default(),
    );
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = calls.clone();
    let abandoned = tokio::time::timeout(
        Duration::from_millis(1500),
        executor.with_retry("zoom", || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("HTTP 503") }
        }),
    )
    .await;
    assert!(abandoned.is_err());

    // Attempts at t=0 and t=1s; the t=3s attempt never happens
    tokio::time::advance(Duration::from_secs(60)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(recorder.failures.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_half_open_admits_one_trial() {
    let registry = CircuitRegistry::new(CircuitConfig {
        failure_threshold: 1,
        reset_timeout: Duration::from_secs(1),
        half_open_timeout: Duration::from_secs(30),
    });
    let _: Result<(), CallError<&str>> = registry.execute("canvas", || async { Err("down") }).await;
    tokio::time::advance(Duration::from_secs(1)).await;

    let trial = registry.acquire("canvas", None).unwrap();
    assert!(trial.is_trial());

    let second = registry.acquire("canvas", None).unwrap_err();
    assert_eq!(second.state, CircuitState::HalfOpen);

    trial.record_success();
    assert_eq!(registry.status("canvas").state, CircuitState::Closed);
    assert!(registry.acquire("canvas", None).is_ok());
}
