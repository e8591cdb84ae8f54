use async_trait::async_trait;
use thiserror::Error;

use crate::invocation::{HarvestRequest, ProgressSnapshot};
use crate::sink::SinkError;

/// Fetcher errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid source params: {0}")]
    InvalidParams(String),
    #[error("source request failed: {0}")]
    Source(String),
    #[error("malformed page: {0}")]
    MalformedPage(String),
    #[error("record sink failed: {0}")]
    Sink(#[from] SinkError),
    #[error("snapshot export failed: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Source-specific retrieval capability
///
/// `fetch` begins or resumes the harvest and yields at every request so the
/// deadline runner can preempt it. Dropping the `fetch` future at any
/// suspension point must leave `snapshot` describing only durably emitted
/// work.
#[async_trait]
pub trait Fetcher: Send {
    /// Drive the harvest to completion
    async fn fetch(&mut self) -> Result<(), FetchError>;

    /// Export progress as a resumable snapshot
    fn snapshot(&self) -> Result<ProgressSnapshot, FetchError>;
}

/// Builds fetchers of one kind from requests
pub trait FetcherFactory: Send + Sync {
    /// Kind name used in configuration
    fn kind(&self) -> &'static str;

    /// Construct a fetcher positioned at the request's progress, if any
    fn build(&self, request: &HarvestRequest) -> Result<Box<dyn Fetcher>, FetchError>;
}
