//! Outcome reporting seam between the retry loop and the failure monitor

use std::sync::Arc;

/// Receives one report per attempt the retry loop makes.
///
/// Implementations must not block and must not fail: persistence problems are
/// the recorder's own concern and never reach the caller of the wrapped operation.
pub trait AttemptRecorder: Send + Sync {
    fn record_attempt(&self, integration_id: &str, success: bool, error: Option<String>);
}

/// Recorder that discards every report
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecorder;

impl AttemptRecorder for NoopRecorder {
    fn record_attempt(&self, _integration_id: &str, _success: bool, _error: Option<String>) {}
}

impl<R: AttemptRecorder + ?Sized> AttemptRecorder for Arc<R> {
    fn record_attempt(&self, integration_id: &str, success: bool, error: Option<String>) {
        (**self).record_attempt(integration_id, success, error)
    }
}
