// Embedding request queue
//
// Coalesces single-text requests into batches for the provider. One
// scheduler task owns the dequeue side; a bounded channel gives enqueue
// backpressure and a semaphore caps in-flight batches. Batch size adapts to
// observed latency: shrink when a batch runs over 1.5x the target, grow when
// it comes in under 0.5x, always clamped to [min_batch, max_batch].
//
// Cancellation: a caller dropping its future before dispatch removes the
// request from the batch; after dispatch the batch still runs and the result
// is discarded.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use super::{EmbeddingConfig, EmbeddingProvider};
use crate::errors::{IndexError, Result};

const HISTORY_WINDOW: usize = 100;

struct EmbedRequest {
    text: String,
    reply: oneshot::Sender<Result<Option<Vec<f32>>>>,
}

#[derive(Default)]
struct RollingHistory {
    latencies_ms: VecDeque<f64>,
    batch_sizes: VecDeque<f64>,
}

impl RollingHistory {
    fn push(&mut self, latency_ms: f64, batch_size: usize) {
        if self.latencies_ms.len() == HISTORY_WINDOW {
            self.latencies_ms.pop_front();
            self.batch_sizes.pop_front();
        }
        self.latencies_ms.push_back(latency_ms);
        self.batch_sizes.push_back(batch_size as f64);
    }

    fn avg(values: &VecDeque<f64>) -> f64 {
        if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    }
}

struct QueueState {
    queue_depth: AtomicUsize,
    inflight: AtomicUsize,
    total_processed: AtomicU64,
    total_failed: AtomicU64,
    current_batch_size: AtomicUsize,
    history: Mutex<RollingHistory>,
}

/// Point-in-time view of the queue's counters.
#[derive(Debug, Clone, serde::Serialize)]
pub struct QueueMetricsSnapshot {
    pub queue_depth: usize,
    pub inflight: usize,
    pub total_processed: u64,
    pub total_failed: u64,
    pub avg_latency_ms: f64,
    pub avg_batch_size: f64,
    pub current_batch_size: usize,
}

pub struct EmbeddingQueue {
    tx: mpsc::Sender<EmbedRequest>,
    state: Arc<QueueState>,
    worker: JoinHandle<()>,
}

impl EmbeddingQueue {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: EmbeddingConfig) -> Self {
        let state = Arc::new(QueueState {
            queue_depth: AtomicUsize::new(0),
            inflight: AtomicUsize::new(0),
            total_processed: AtomicU64::new(0),
            total_failed: AtomicU64::new(0),
            current_batch_size: AtomicUsize::new(config.initial_batch.max(1)),
            history: Mutex::new(RollingHistory::default()),
        });

        // Enqueue suspends once the channel holds a full complement of
        // batches for every in-flight slot.
        let capacity = (config.max_batch * config.max_concurrent).max(1);
        let (tx, rx) = mpsc::channel(capacity);

        let worker = tokio::spawn(run_scheduler(rx, provider, config, state.clone()));

        Self { tx, state, worker }
    }

    /// Embed one text. Resolves to None when the service could not embed this
    /// particular text; rejects on terminal batch failure.
    pub async fn embed(&self, text: String) -> Result<Option<Vec<f32>>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.state.queue_depth.fetch_add(1, Ordering::Relaxed);

        if self
            .tx
            .send(EmbedRequest {
                text,
                reply: reply_tx,
            })
            .await
            .is_err()
        {
            self.state.queue_depth.fetch_sub(1, Ordering::Relaxed);
            return Err(IndexError::embedding("embedding queue is shut down"));
        }

        reply_rx
            .await
            .map_err(|_| IndexError::embedding("embedding request dropped by scheduler"))?
    }

    /// Embed many texts, resolving positionally.
    pub async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Option<Vec<f32>>>> {
        let futures = texts.into_iter().map(|t| self.embed(t));
        futures::future::join_all(futures)
            .await
            .into_iter()
            .collect()
    }

    pub fn metrics(&self) -> QueueMetricsSnapshot {
        let history = self.state.history.lock().expect("history mutex poisoned");
        QueueMetricsSnapshot {
            queue_depth: self.state.queue_depth.load(Ordering::Relaxed),
            inflight: self.state.inflight.load(Ordering::Relaxed),
            total_processed: self.state.total_processed.load(Ordering::Relaxed),
            total_failed: self.state.total_failed.load(Ordering::Relaxed),
            avg_latency_ms: RollingHistory::avg(&history.latencies_ms),
            avg_batch_size: RollingHistory::avg(&history.batch_sizes),
            current_batch_size: self.state.current_batch_size.load(Ordering::Relaxed),
        }
    }

    /// Flush remaining work and stop the scheduler.
    pub async fn shutdown(self) {
        let Self { tx, worker, .. } = self;
        drop(tx);
        let _ = worker.await;
    }
}

async fn run_scheduler(
    mut rx: mpsc::Receiver<EmbedRequest>,
    provider: Arc<dyn EmbeddingProvider>,
    config: EmbeddingConfig,
    state: Arc<QueueState>,
) {
    let max_concurrent = config.max_concurrent.max(1);
    let semaphore = Arc::new(Semaphore::new(max_concurrent));
    let flush_interval = Duration::from_millis(config.flush_interval_ms.max(1));
    let mut pending: VecDeque<EmbedRequest> = VecDeque::new();
    let mut closed = false;

    loop {
        if pending.is_empty() {
            if closed {
                break;
            }
            match rx.recv().await {
                Some(req) => pending.push_back(req),
                None => break,
            }
        }

        // Accumulate until the batch fills or the flush interval elapses,
        // measured from the first queued request.
        let deadline = Instant::now() + flush_interval;
        let batch_target = state.current_batch_size.load(Ordering::Relaxed).max(1);
        while !closed && pending.len() < batch_target {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(req)) => pending.push_back(req),
                Ok(None) => closed = true,
                Err(_) => break,
            }
        }

        let take = pending.len().min(batch_target);
        let mut batch = Vec::with_capacity(take);
        for _ in 0..take {
            let req = pending.pop_front().expect("bounded by take");
            state.queue_depth.fetch_sub(1, Ordering::Relaxed);
            if req.reply.is_closed() {
                // Cancelled before dispatch: drop silently.
                continue;
            }
            batch.push(req);
        }
        if batch.is_empty() {
            continue;
        }

        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("scheduler semaphore closed");
        tokio::spawn(dispatch_batch(
            permit,
            provider.clone(),
            batch,
            config.clone(),
            state.clone(),
        ));
    }

    // Wait for in-flight batches before reporting shutdown complete.
    let _drain = semaphore
        .acquire_many(max_concurrent as u32)
        .await
        .expect("scheduler semaphore closed");
    debug!("embedding scheduler drained");
}

async fn dispatch_batch(
    permit: tokio::sync::OwnedSemaphorePermit,
    provider: Arc<dyn EmbeddingProvider>,
    batch: Vec<EmbedRequest>,
    config: EmbeddingConfig,
    state: Arc<QueueState>,
) {
    state.inflight.fetch_add(1, Ordering::Relaxed);
    let texts: Vec<String> = batch.iter().map(|r| r.text.clone()).collect();

    let started = Instant::now();
    let outcome = provider.embed_batch(&texts).await;
    let latency_ms = started.elapsed().as_millis() as f64;

    adapt_batch_size(&state, &config, latency_ms);
    {
        let mut history = state.history.lock().expect("history mutex poisoned");
        history.push(latency_ms, batch.len());
    }

    match outcome {
        Ok(mut vectors) => {
            vectors.resize(batch.len(), None);
            state
                .total_processed
                .fetch_add(batch.len() as u64, Ordering::Relaxed);
            for (req, vector) in batch.into_iter().zip(vectors) {
                // A closed receiver means the caller cancelled after
                // dispatch; the slot was spent either way.
                let _ = req.reply.send(Ok(vector));
            }
        }
        Err(e) => {
            state
                .total_failed
                .fetch_add(batch.len() as u64, Ordering::Relaxed);
            let message = e.to_string();
            for req in batch {
                let _ = req.reply.send(Err(IndexError::embedding(message.clone())));
            }
        }
    }

    state.inflight.fetch_sub(1, Ordering::Relaxed);
    drop(permit);
}

fn adapt_batch_size(state: &QueueState, config: &EmbeddingConfig, latency_ms: f64) {
    let target = config.target_latency_ms as f64;
    let current = state.current_batch_size.load(Ordering::Relaxed) as f64;

    let next = if latency_ms > 1.5 * target {
        (current * 0.8).floor().max(config.min_batch as f64)
    } else if latency_ms < 0.5 * target {
        (current * 1.2).ceil().min(config.max_batch as f64)
    } else {
        current
    };

    if next != current {
        debug!(
            latency_ms,
            from = current,
            to = next,
            "adapted embedding batch size"
        );
        state
            .current_batch_size
            .store(next as usize, Ordering::Relaxed);
    }
}
