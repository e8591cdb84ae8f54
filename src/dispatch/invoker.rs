//! Worker-invocation facility abstraction

use async_trait::async_trait;
use std::sync::Mutex;

use super::DispatchError;

/// Submits a payload for asynchronous execution by a named worker
///
/// `Ok` means the facility accepted the submission; it says nothing about
/// whether the worker has started or will succeed.
#[async_trait]
pub trait WorkerInvoker: Send + Sync {
    async fn submit(&self, worker_name: &str, payload: Vec<u8>) -> Result<(), DispatchError>;
}

/// One captured submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub worker_name: String,
    pub payload: Vec<u8>,
}

/// Invoker that records submissions instead of starting workers
#[derive(Debug, Default)]
pub struct RecordingInvoker {
    submissions: Mutex<Vec<Submission>>,
    reject: bool,
}

impl RecordingInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoker that records and then refuses every submission
    pub fn rejecting() -> Self {
        Self {
            submissions: Mutex::new(Vec::new()),
            reject: true,
        }
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Remove and return everything recorded so far
    pub fn drain(&self) -> Vec<Submission> {
        self.submissions
            .lock()
            .map(|mut s| std::mem::take(&mut *s))
            .unwrap_or_default()
    }
}

#[async_trait]
impl WorkerInvoker for RecordingInvoker {
    async fn submit(&self, worker_name: &str, payload: Vec<u8>) -> Result<(), DispatchError> {
        tracing::info!(worker_name, size = payload.len(), "Recorded submission");
        if let Ok(mut submissions) = self.submissions.lock() {
            submissions.push(Submission {
                worker_name: worker_name.to_string(),
                payload,
            });
        }

        if self.reject {
            return Err(DispatchError::Rejected(format!(
                "worker '{}' refused submission",
                worker_name
            )));
        }
        Ok(())
    }
}
