//! Batched, asynchronous soft deletion.
//!
//! Deletion requests are queued through a [`DeletionQueue`] and return
//! immediately. A single background task buffers the entries and hands them to
//! [`Storage::delete_urls`] once `batch_size` entries are buffered or the flush
//! interval elapses. Shutdown always ends with a final flush.
//!
//! Delivery is at most once: a batch the storage rejects is logged and
//! dropped, never retried.

use linkstash_core::{DeletionEntry, Handle, ShortenerError, Storage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace};
use typed_builder::TypedBuilder;

pub const DEFAULT_BATCH_SIZE: usize = 5;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(10);
/// Shortest flush period the timer accepts.
pub const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, TypedBuilder)]
pub struct DeletionConfig {
    /// Buffered entries that trigger an immediate flush.
    #[builder(default = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
    /// Period of the flush timer.
    #[builder(default = DEFAULT_FLUSH_INTERVAL)]
    pub flush_interval: Duration,
}

impl Default for DeletionConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Producer side of the pipeline. Cheap to clone.
#[derive(Debug, Clone)]
pub struct DeletionQueue {
    sender: mpsc::UnboundedSender<DeletionEntry>,
}

impl DeletionQueue {
    /// Queues one entry per handle. Never waits for storage.
    ///
    /// Returns `Err(ShuttingDown)` once the pipeline has stopped accepting
    /// entries.
    pub fn request_deletion(&self, owner: &str, handles: Vec<Handle>) -> Result<(), ShortenerError> {
        let count = handles.len();
        for handle in handles {
            self.enqueue(DeletionEntry::new(owner, handle))?;
        }
        debug!(owner, count, "queued deletion request");
        Ok(())
    }

    /// Queues a single entry.
    pub fn enqueue(&self, entry: DeletionEntry) -> Result<(), ShortenerError> {
        self.sender
            .send(entry)
            .map_err(|_| ShortenerError::ShuttingDown)
    }
}

/// Owner handle of the background task.
#[derive(Debug)]
pub struct DeletionWorker {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl DeletionWorker {
    /// Asks the task for its final flush and waits until it has exited.
    pub async fn shutdown(self) {
        // The task may already be gone if every queue was dropped.
        let _ = self.shutdown.send(());

        if let Err(err) = self.task.await {
            error!(error = %err, "deletion pipeline task failed");
        }
    }
}

/// The buffering loop. Lives inside the task spawned by [`DeletionPipeline::spawn`].
pub struct DeletionPipeline<S: ?Sized> {
    storage: Arc<S>,
    receiver: mpsc::UnboundedReceiver<DeletionEntry>,
    buffer: Vec<DeletionEntry>,
    config: DeletionConfig,
}

impl<S: Storage + ?Sized> DeletionPipeline<S> {
    /// Starts the background task on the current tokio runtime.
    pub fn spawn(storage: Arc<S>, config: DeletionConfig) -> (DeletionQueue, DeletionWorker) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let config = DeletionConfig {
            batch_size: config.batch_size.max(1),
            flush_interval: config.flush_interval.max(MIN_FLUSH_INTERVAL),
        };
        let pipeline = Self {
            storage,
            receiver,
            buffer: Vec::with_capacity(config.batch_size),
            config,
        };

        let task = tokio::spawn(pipeline.run(shutdown_rx));

        (
            DeletionQueue { sender },
            DeletionWorker {
                shutdown: shutdown_tx,
                task,
            },
        )
    }

    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        let period = self.config.flush_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            batch_size = self.config.batch_size,
            flush_interval = ?period,
            "deletion pipeline started"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    debug!("deletion pipeline received shutdown signal");
                    break;
                }
                entry = self.receiver.recv() => match entry {
                    Some(entry) => self.push(entry).await,
                    None => {
                        debug!("all deletion queues dropped");
                        break;
                    }
                },
                _ = ticker.tick() => self.flush("interval").await,
            }
        }

        self.drain().await;
        info!("deletion pipeline stopped");
    }

    async fn push(&mut self, entry: DeletionEntry) {
        trace!(owner = %entry.owner, handle = %entry.handle, "buffered deletion entry");
        self.buffer.push(entry);

        if self.buffer.len() >= self.config.batch_size {
            self.flush("batch full").await;
        }
    }

    /// Refuses further entries, then flushes everything already queued.
    async fn drain(&mut self) {
        self.receiver.close();
        while let Ok(entry) = self.receiver.try_recv() {
            self.push(entry).await;
        }
        self.flush("shutdown").await;
    }

    async fn flush(&mut self, reason: &'static str) {
        if self.buffer.is_empty() {
            trace!(reason, "nothing to flush");
            return;
        }

        let batch = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.config.batch_size));
        let count = batch.len();

        match self.storage.delete_urls(batch).await {
            Ok(()) => debug!(count, reason, "flushed deletion batch"),
            Err(err) => error!(count, reason, error = %err, "dropped deletion batch"),
        }
    }
}
