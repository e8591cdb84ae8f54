//! Chain counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for bounded executions and how their chains ended
#[derive(Debug, Default)]
pub struct ChainMetrics {
    executions: AtomicU64,
    completed: AtomicU64,
    continued: AtomicU64,
    dispatch_failures: AtomicU64,
    aborted: AtomicU64,
    fetcher_failures: AtomicU64,
}

impl ChainMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn execution_started(&self) {
        self.executions.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "executions", "Metric incremented");
    }

    pub fn chain_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "completed", "Metric incremented");
    }

    pub fn chain_continued(&self) {
        self.continued.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "continued", "Metric incremented");
    }

    pub fn dispatch_failed(&self) {
        self.dispatch_failures.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "dispatch_failures", "Metric incremented");
    }

    pub fn chain_aborted(&self) {
        self.aborted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "aborted", "Metric incremented");
    }

    pub fn fetcher_failed(&self) {
        self.fetcher_failures.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "fetcher_failures", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            executions: self.executions.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            continued: self.continued.load(Ordering::Relaxed),
            dispatch_failures: self.dispatch_failures.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
            fetcher_failures: self.fetcher_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub executions: u64,
    pub completed: u64,
    pub continued: u64,
    pub dispatch_failures: u64,
    pub aborted: u64,
    pub fetcher_failures: u64,
}
