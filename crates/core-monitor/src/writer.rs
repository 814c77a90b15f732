//! AttemptWriter: write-behind for the attempt log
//!
//! Callers of the retry loop must never wait on the attempt store, and a
//! failing store must never turn into a failed integration call. The writer
//! stamps each record when it is logged, pushes it onto an unbounded channel
//! and returns. A background task drains the channel in batches and appends
//! them to the store.
//!
//! ```text
//! attempt 1 ──┐
//!             ├──► log() ──► channel ──► writer task ──► append_batch() ──► store
//! attempt 2 ──┘   (never blocks)            │
//!                                     flush()/shutdown()
//!                                     acks in channel order
//! ```
//!
//! Commands are processed in channel order, so `flush()` resolves only after
//! every record logged before it has been handed to the store.

use crate::error::{MonitorError, Result};
use crate::record::AttemptRecord;
use crate::store::AttemptStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

enum Command {
    Record(AttemptRecord),
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Counters maintained by the writer task
#[derive(Debug, Default)]
pub struct WriterStats {
    written: AtomicU64,
    failed: AtomicU64,
}

impl WriterStats {
    /// Records the store accepted
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Records dropped because the store rejected their batch
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Handle to the background attempt writer
#[derive(Clone)]
pub struct AttemptWriter {
    tx: mpsc::UnboundedSender<Command>,
    stats: Arc<WriterStats>,
}

impl std::fmt::Debug for AttemptWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttemptWriter")
            .field("closed", &self.tx.is_closed())
            .field("stats", &self.stats)
            .finish()
    }
}

impl AttemptWriter {
    /// Spawn the writer task on the current tokio runtime
    pub fn spawn(store: Arc<dyn AttemptStore>, batch_size: usize) -> Result<Self> {
        let handle = tokio::runtime::Handle::try_current().map_err(|e| {
            MonitorError::Store(format!("attempt writer needs a tokio runtime: {}", e))
        })?;

        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(WriterStats::default());

        handle.spawn(run_writer_loop(store, rx, batch_size.max(1), stats.clone()));

        Ok(Self { tx, stats })
    }

    /// Enqueue a record (fire-and-forget)
    pub fn log(&self, record: AttemptRecord) -> Result<()> {
        self.tx
            .send(Command::Record(record))
            .map_err(|_| MonitorError::WriterClosed)
    }

    /// Wait until every record logged before this call has reached the store
    pub async fn flush(&self) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(Command::Flush(ack_tx))
            .map_err(|_| MonitorError::WriterClosed)?;
        ack_rx.await.map_err(|_| MonitorError::WriterClosed)
    }

    /// Drain pending records and stop the writer task.
    ///
    /// Every clone of this handle is closed afterwards; further `log` calls
    /// return [`MonitorError::WriterClosed`]. Calling it twice is harmless.
    pub async fn shutdown(&self) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Command::Shutdown(ack_tx)).is_err() {
            return Ok(());
        }
        // A concurrent shutdown may have won the race and dropped our ack
        let _ = ack_rx.await;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn stats(&self) -> &WriterStats {
        &self.stats
    }
}

async fn run_writer_loop(
    store: Arc<dyn AttemptStore>,
    mut rx: mpsc::UnboundedReceiver<Command>,
    batch_size: usize,
    stats: Arc<WriterStats>,
) {
    let mut buffer = Vec::with_capacity(batch_size);
    debug!(batch_size, "Attempt writer started");

    while let Some(command) = rx.recv().await {
        let mut next = Some(command);

        while let Some(command) = next.take() {
            match command {
                Command::Record(record) => {
                    buffer.push(record);
                    if buffer.len() >= batch_size {
                        write_batch(store.as_ref(), &mut buffer, &stats).await;
                    }
                }
                Command::Flush(ack) => {
                    write_batch(store.as_ref(), &mut buffer, &stats).await;
                    let _ = ack.send(());
                }
                Command::Shutdown(ack) => {
                    write_batch(store.as_ref(), &mut buffer, &stats).await;
                    rx.close();

                    // Records raced in before close(); acks of late flushes drop
                    while let Ok(command) = rx.try_recv() {
                        if let Command::Record(record) = command {
                            buffer.push(record);
                        }
                    }
                    write_batch(store.as_ref(), &mut buffer, &stats).await;

                    info!(
                        written = stats.written(),
                        failed = stats.failed(),
                        "Attempt writer stopped"
                    );
                    let _ = ack.send(());
                    return;
                }
            }

            next = rx.try_recv().ok();
        }

        // Channel momentarily empty: persist what we have rather than wait
        write_batch(store.as_ref(), &mut buffer, &stats).await;
    }

    write_batch(store.as_ref(), &mut buffer, &stats).await;
    debug!("Attempt writer stopped, all handles dropped");
}

async fn write_batch(
    store: &dyn AttemptStore,
    buffer: &mut Vec<AttemptRecord>,
    stats: &WriterStats,
) {
    if buffer.is_empty() {
        return;
    }

    let count = buffer.len() as u64;
    match store.append_batch(&buffer[..]).await {
        Ok(()) => {
            stats.written.fetch_add(count, Ordering::Relaxed);
            debug!(count, "Flushed attempt records");
        }
        Err(e) => {
            stats.failed.fetch_add(count, Ordering::Relaxed);
            let integration_id = buffer.first().map(|r| r.integration_id.as_str());
            warn!(
                count,
                integration_id,
                error = %e,
                "Failed to persist attempt records"
            );
        }
    }
    buffer.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryAttemptStore;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};

    struct BrokenStore;

    #[async_trait]
    impl AttemptStore for BrokenStore {
        async fn append(&self, _record: &AttemptRecord) -> Result<()> {
            Err(MonitorError::Store("disk full".to_string()))
        }

        async fn records_since(
            &self,
            _integration_id: &str,
            _since: DateTime<Utc>,
        ) -> Result<Vec<AttemptRecord>> {
            Ok(Vec::new())
        }

        async fn integrations_since(&self, _since: DateTime<Utc>) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_flush_persists_everything_logged_before_it() {
        let store = Arc::new(MemoryAttemptStore::new());
        let writer = AttemptWriter::spawn(store.clone(), 4).unwrap();

        for i in 0..10 {
            writer
                .log(AttemptRecord::new("canvas", i % 2 == 0, None))
                .unwrap();
        }
        writer.flush().await.unwrap();

        assert_eq!(store.len().await, 10);
        assert_eq!(writer.stats().written(), 10);
        assert_eq!(writer.stats().failed(), 0);
    }

    #[tokio::test]
    async fn test_timestamp_taken_at_log_time() {
        let store = Arc::new(MemoryAttemptStore::new());
        let writer = AttemptWriter::spawn(store.clone(), 64).unwrap();

        let before = Utc::now();
        writer.log(AttemptRecord::success("canvas")).unwrap();
        writer.flush().await.unwrap();

        let records = store
            .records_since("canvas", before - Duration::seconds(1))
            .await
            .unwrap();
        assert!(records[0].timestamp >= before);
    }

    #[tokio::test]
    async fn test_shutdown_drains_and_closes() {
        let store = Arc::new(MemoryAttemptStore::new());
        let writer = AttemptWriter::spawn(store.clone(), 64).unwrap();
        let clone = writer.clone();

        writer.log(AttemptRecord::success("canvas")).unwrap();
        writer.shutdown().await.unwrap();

        assert_eq!(store.len().await, 1);
        assert!(clone.is_closed());
        assert!(matches!(
            clone.log(AttemptRecord::success("canvas")),
            Err(MonitorError::WriterClosed)
        ));
        assert!(matches!(clone.flush().await, Err(MonitorError::WriterClosed)));
        assert!(writer.shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn test_store_failures_are_counted_not_raised() {
        let writer = AttemptWriter::spawn(Arc::new(BrokenStore), 64).unwrap();

        writer
            .log(AttemptRecord::failure("canvas", "HTTP 500"))
            .unwrap();
        writer.log(AttemptRecord::success("canvas")).unwrap();
        writer.flush().await.unwrap();

        assert_eq!(writer.stats().failed(), 2);
        assert_eq!(writer.stats().written(), 0);
    }
}
