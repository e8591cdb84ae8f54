//! Local worker pool fed through bounded channels
//!
//! [`ChannelInvoker`] distributes submissions round-robin across one bounded
//! `mpsc` channel per worker; a full channel applies backpressure to the
//! submitter. [`WorkerPool`] drains the receivers and hands each payload to a
//! [`PayloadHandler`].

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{DispatchError, WorkerInvoker};

/// Submission travelling to a pool worker
#[derive(Debug, Clone)]
pub struct PoolJob {
    pub worker_name: String,
    pub payload: Vec<u8>,
}

/// Consumer of pool jobs
#[async_trait]
pub trait PayloadHandler: Send + Sync {
    async fn handle_payload(&self, worker_name: &str, payload: Vec<u8>);
}

/// Count of submissions not yet fully handled
#[derive(Debug, Default)]
pub struct PendingTracker {
    pending: AtomicUsize,
    idle: Notify,
}

impl PendingTracker {
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    fn start(&self) {
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    fn finish(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    /// Resolve once no submission is pending
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent finish is not missed
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Invoker that feeds the in-process [`WorkerPool`]
pub struct ChannelInvoker {
    channels: Vec<mpsc::Sender<PoolJob>>,
    next_worker: AtomicUsize,
    tracker: Arc<PendingTracker>,
}

impl ChannelInvoker {
    /// Create the invoker plus one receiver per worker
    pub fn new(num_workers: usize, queue_depth: usize) -> (Self, Vec<mpsc::Receiver<PoolJob>>) {
        info!(num_workers, queue_depth, "Creating local worker channels");

        let mut channels = Vec::with_capacity(num_workers);
        let mut receivers = Vec::with_capacity(num_workers);
        for _ in 0..num_workers {
            let (tx, rx) = mpsc::channel(queue_depth.max(1));
            channels.push(tx);
            receivers.push(rx);
        }

        let invoker = Self {
            channels,
            next_worker: AtomicUsize::new(0),
            tracker: Arc::new(PendingTracker::default()),
        };
        (invoker, receivers)
    }

    pub fn tracker(&self) -> Arc<PendingTracker> {
        self.tracker.clone()
    }

    pub fn num_workers(&self) -> usize {
        self.channels.len()
    }
}

#[async_trait]
impl WorkerInvoker for ChannelInvoker {
    async fn submit(&self, worker_name: &str, payload: Vec<u8>) -> Result<(), DispatchError> {
        if self.channels.is_empty() {
            return Err(DispatchError::Closed("no local workers".into()));
        }

        let worker_idx = self.next_worker.fetch_add(1, Ordering::Relaxed) % self.channels.len();
        let job = PoolJob {
            worker_name: worker_name.to_string(),
            payload,
        };

        self.tracker.start();
        match self.channels[worker_idx].send(job).await {
            Ok(()) => {
                debug!(worker_idx, worker_name, "Job sent to local worker");
                Ok(())
            }
            Err(_) => {
                self.tracker.finish();
                warn!(worker_idx, worker_name, "Local worker channel closed");
                Err(DispatchError::Closed(format!("worker {} is gone", worker_idx)))
            }
        }
    }
}

/// Background tasks draining [`ChannelInvoker`] receivers
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    tracker: Arc<PendingTracker>,
}

impl WorkerPool {
    pub fn spawn(
        receivers: Vec<mpsc::Receiver<PoolJob>>,
        tracker: Arc<PendingTracker>,
        handler: Arc<dyn PayloadHandler>,
    ) -> Self {
        let handles = receivers
            .into_iter()
            .enumerate()
            .map(|(worker_id, rx)| {
                tokio::spawn(run_worker(worker_id, rx, tracker.clone(), handler.clone()))
            })
            .collect();

        Self { handles, tracker }
    }

    pub fn pending(&self) -> usize {
        self.tracker.pending()
    }

    pub async fn wait_idle(&self) {
        self.tracker.wait_idle().await;
    }

    /// Wait for pending work, then stop every worker task
    pub async fn shutdown(self) {
        self.wait_idle().await;
        for handle in &self.handles {
            handle.abort();
        }
        for handle in self.handles {
            let _ = handle.await;
        }
        info!("Local worker pool stopped");
    }
}

async fn run_worker(
    worker_id: usize,
    mut rx: mpsc::Receiver<PoolJob>,
    tracker: Arc<PendingTracker>,
    handler: Arc<dyn PayloadHandler>,
) {
    debug!(worker_id, "Local worker started");
    while let Some(job) = rx.recv().await {
        debug!(worker_id, worker_name = %job.worker_name, size = job.payload.len(), "Handling job");
        handler.handle_payload(&job.worker_name, job.payload).await;
        tracker.finish();
    }
    debug!(worker_id, "Local worker channel closed");
}
