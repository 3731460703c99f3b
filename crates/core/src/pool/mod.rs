//! Bounded worker pool around a shared [`EmotionEngine`].
//!
//! Requests go through a bounded `mpsc` queue. A fixed set of worker tasks
//! pull from it and run each analysis on tokio's blocking pool; results come
//! back over a `oneshot` per request. [`AnalysisPool::try_submit`] fails fast
//! when the queue is full, [`AnalysisPool::submit`] waits for space.

use crate::config::PoolConfig;
use crate::engine::{AnalysisRequest, DetectionResult, EmotionEngine, EngineError};
use crate::util::CancelFlag;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

const LOG_TARGET: &str = "pool";

#[derive(thiserror::Error, Debug)]
pub enum PoolError {
    #[error("analysis queue is full")]
    QueueFull,
    #[error("analysis pool is shut down")]
    Closed,
    #[error("worker dropped the request without replying")]
    WorkerLost,
    #[error(transparent)]
    Engine(#[from] EngineError),
}

type Reply = Result<DetectionResult, EngineError>;

struct Job {
    request: AnalysisRequest,
    cancel: CancelFlag,
    reply: oneshot::Sender<Reply>,
}

/// Handle to a queued analysis.
pub struct PendingAnalysis {
    rx: oneshot::Receiver<Reply>,
    cancel: CancelFlag,
}

impl PendingAnalysis {
    /// Asks the worker to stop at its next cancellation point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn wait(self) -> Result<DetectionResult, PoolError> {
        let reply = self.rx.await.map_err(|_| PoolError::WorkerLost)?;
        Ok(reply?)
    }
}

pub struct AnalysisPool {
    sender: mpsc::Sender<Job>,
    workers: Vec<JoinHandle<()>>,
}

impl AnalysisPool {
    /// Spawns the workers on the current tokio runtime.
    pub fn start(engine: Arc<EmotionEngine>, config: PoolConfig) -> Self {
        let (sender, receiver) = mpsc::channel::<Job>(config.queue_capacity.max(1));
        let queue = Arc::new(Mutex::new(receiver));

        let workers = (0..config.workers.max(1))
            .map(|id| {
                let engine = engine.clone();
                let queue = queue.clone();
                tokio::spawn(worker_loop(id, engine, queue))
            })
            .collect();

        tracing::debug!(
            target: LOG_TARGET,
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            "analysis pool started"
        );

        Self { sender, workers }
    }

    /// Queues a request, waiting for space if the queue is full.
    pub async fn submit(&self, request: AnalysisRequest) -> Result<PendingAnalysis, PoolError> {
        let (job, pending) = Self::job(request);
        self.sender.send(job).await.map_err(|_| PoolError::Closed)?;
        Ok(pending)
    }

    /// Queues a request or fails immediately with [`PoolError::QueueFull`].
    pub fn try_submit(&self, request: AnalysisRequest) -> Result<PendingAnalysis, PoolError> {
        let (job, pending) = Self::job(request);
        self.sender.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                tracing::warn!(target: LOG_TARGET, "analysis queue full, rejecting request");
                PoolError::QueueFull
            }
            mpsc::error::TrySendError::Closed(_) => PoolError::Closed,
        })?;
        Ok(pending)
    }

    /// Closes the queue, lets queued work drain and joins every worker.
    pub async fn shutdown(self) {
        let Self { sender, workers } = self;
        drop(sender);
        for (id, worker) in workers.into_iter().enumerate() {
            if let Err(e) = worker.await {
                tracing::warn!(target: LOG_TARGET, worker = id, error = %e, "worker ended abnormally");
            }
        }
        tracing::debug!(target: LOG_TARGET, "analysis pool stopped");
    }

    fn job(request: AnalysisRequest) -> (Job, PendingAnalysis) {
        let cancel = CancelFlag::new();
        let (reply, rx) = oneshot::channel();
        let job = Job {
            request,
            cancel: cancel.clone(),
            reply,
        };
        (job, PendingAnalysis { rx, cancel })
    }

    #[cfg(test)]
    fn without_workers(queue_capacity: usize) -> (Self, mpsc::Receiver<Job>) {
        let (sender, receiver) = mpsc::channel(queue_capacity);
        (
            Self {
                sender,
                workers: Vec::new(),
            },
            receiver,
        )
    }
}

async fn worker_loop(id: usize, engine: Arc<EmotionEngine>, queue: Arc<Mutex<mpsc::Receiver<Job>>>) {
    loop {
        let next = {
            let mut rx = queue.lock().await;
            rx.recv().await
        };
        let Some(Job {
            request,
            cancel,
            reply,
        }) = next
        else {
            break;
        };

        if reply.is_closed() {
            tracing::debug!(target: LOG_TARGET, worker = id, "caller gone, skipping request");
            continue;
        }

        let engine = engine.clone();
        let outcome =
            tokio::task::spawn_blocking(move || engine.analyze_with_cancel(&request, &cancel)).await;
        let result = outcome.unwrap_or_else(|e| {
            tracing::warn!(target: LOG_TARGET, worker = id, error = %e, "analysis task failed");
            Err(EngineError::WorkerFailed(e.to_string()))
        });

        if reply.send(result).is_err() {
            tracing::debug!(target: LOG_TARGET, worker = id, "caller dropped before the result arrived");
        }
    }
    tracing::debug!(target: LOG_TARGET, worker = id, "worker exiting");
}
