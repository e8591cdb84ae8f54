//! Deadline runner: one fetcher, one wall-clock budget
//!
//! The fetcher future is raced against the budget with `tokio::time::timeout`.
//! When the budget wins, the fetch future is dropped at its current
//! suspension point and the fetcher's progress is exported from whatever it
//! had durably completed.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::fetchers::{FetchError, FetcherRegistry};
use crate::invocation::{HarvestRequest, ProgressSnapshot};

/// Budget used when none is configured
pub const DEFAULT_BUDGET: Duration = Duration::from_secs(10);

/// Result of one bounded execution
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed,
    /// Budget elapsed first; carries progress exported at preemption
    BudgetExceeded(ProgressSnapshot),
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("unknown harvest type: {0}")]
    UnknownHarvestType(String),

    #[error(transparent)]
    Fetcher(#[from] FetchError),
}

pub struct DeadlineRunner {
    registry: Arc<FetcherRegistry>,
    budget: Duration,
}

impl DeadlineRunner {
    pub fn new(registry: Arc<FetcherRegistry>, budget: Duration) -> Self {
        Self { registry, budget }
    }

    pub fn with_default_budget(registry: Arc<FetcherRegistry>) -> Self {
        Self::new(registry, DEFAULT_BUDGET)
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn registry(&self) -> &FetcherRegistry {
        &self.registry
    }

    /// Drive the request's fetcher until it completes or the budget elapses
    pub async fn run(&self, request: &HarvestRequest) -> Result<Outcome, RunError> {
        let harvest_type = request.harvest_type();
        let entry = self
            .registry
            .get(harvest_type)
            .ok_or_else(|| RunError::UnknownHarvestType(harvest_type.to_string()))?;

        let mut fetcher = entry.build(request)?;
        debug!(harvest_type, kind = entry.kind(), budget = ?self.budget, "Fetcher constructed");

        let started = Instant::now();
        let result = tokio::time::timeout(self.budget, fetcher.fetch()).await;
        let elapsed = started.elapsed();

        match result {
            Ok(Ok(())) => {
                info!(harvest_type, ?elapsed, "Fetcher completed within budget");
                Ok(Outcome::Completed)
            }
            Ok(Err(err)) => {
                warn!(harvest_type, ?elapsed, error = %err, "Fetcher failed");
                Err(err.into())
            }
            Err(_) => {
                let snapshot = fetcher.snapshot()?;
                info!(harvest_type, ?elapsed, "Budget exceeded, progress exported");
                Ok(Outcome::BudgetExceeded(snapshot))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetchers::{PROGRESS_FIELD, PageProgress, StaticFetcherFactory};
    use crate::invocation::SourceParams;
    use crate::sink::ObjectStoreSink;
    use serde_json::{Value, json};

    fn runner(budget: Duration) -> DeadlineRunner {
        let mut registry = FetcherRegistry::new();
        registry.register(
            "static",
            Arc::new(StaticFetcherFactory::new(Arc::new(ObjectStoreSink::in_memory()))),
            SourceParams::new(),
        );
        DeadlineRunner::new(Arc::new(registry), budget)
    }

    fn static_request(pages: usize, delay_ms: u64) -> HarvestRequest {
        let pages: Vec<Value> = (0..pages).map(|i| json!([{"id": i}])).collect();
        let params = json!({
            "collection_id": "fixture",
            "pages": pages,
            "page_delay_ms": delay_ms,
        });
        match params {
            Value::Object(map) => HarvestRequest::new("static", map),
            _ => unreachable!(),
        }
    }

    fn progress_of(snapshot: &ProgressSnapshot) -> PageProgress {
        serde_json::from_value(snapshot.get(PROGRESS_FIELD).unwrap().clone()).unwrap()
    }

    #[test]
    fn test_default_budget() {
        let registry = Arc::new(FetcherRegistry::new());
        assert_eq!(
            DeadlineRunner::with_default_budget(registry).budget(),
            Duration::from_secs(10)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_within_budget() {
        let outcome = runner(DEFAULT_BUDGET).run(&static_request(3, 1000)).await.unwrap();
        assert_eq!(outcome, Outcome::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exceeded_exports_progress() {
        let started = Instant::now();
        let outcome = runner(DEFAULT_BUDGET).run(&static_request(5, 4000)).await.unwrap();

        // Pages 0 and 1 land at 4s and 8s; page 2 is still in flight at 10s
        let elapsed = started.elapsed();
        assert!(elapsed >= DEFAULT_BUDGET);
        assert!(elapsed < DEFAULT_BUDGET + Duration::from_millis(50));

        match outcome {
            Outcome::BudgetExceeded(snapshot) => {
                let progress = progress_of(&snapshot);
                assert_eq!(progress.page, 2);
                assert_eq!(progress.emitted, 2);
                assert_eq!(progress.cursor.as_deref(), Some("2"));
                assert_eq!(snapshot.get("collection_id"), Some(&json!("fixture")));
            }
            other => panic!("expected BudgetExceeded, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_blocks_past_budget() {
        // A single page slower than the whole budget
        let started = Instant::now();
        let outcome = runner(Duration::from_secs(2))
            .run(&static_request(1, 3_600_000))
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(3));
        match outcome {
            Outcome::BudgetExceeded(snapshot) => assert_eq!(progress_of(&snapshot).page, 0),
            other => panic!("expected BudgetExceeded, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_harvest_type() {
        let request = HarvestRequest::new("bogus", SourceParams::new());
        let result = runner(DEFAULT_BUDGET).run(&request).await;
        assert!(matches!(result, Err(RunError::UnknownHarvestType(t)) if t == "bogus"));
    }

    #[tokio::test]
    async fn test_fetcher_failure_propagates() {
        let request = match json!({"collection_id": "fixture", "pages": [[], [], []], "fail_page": 1}) {
            Value::Object(map) => HarvestRequest::new("static", map),
            _ => unreachable!(),
        };

        let result = runner(DEFAULT_BUDGET).run(&request).await;
        assert!(matches!(result, Err(RunError::Fetcher(FetchError::Source(_)))));
    }

    #[tokio::test]
    async fn test_invalid_params_fail_before_fetching() {
        let request = HarvestRequest::new("json_feed", SourceParams::new());
        let result = runner(DEFAULT_BUDGET).run(&request).await;
        assert!(matches!(result, Err(RunError::Fetcher(FetchError::InvalidParams(_)))));
    }
}
