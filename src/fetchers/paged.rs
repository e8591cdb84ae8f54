//! Cursor-driven fetcher shared by every shipped source
//!
//! Snapshot contract: the exported snapshot is the request's own params with
//! a `progress` object (`PageProgress`) replacing any earlier one. Progress
//! advances only after the sink accepted a page, and pages are keyed by
//! index, so a run preempted mid-page repeats that page under the same key.
//! Nothing accumulates between pages, so no partial results are carried.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use super::traits::{FetchError, Fetcher};
use crate::invocation::{HarvestRequest, ProgressSnapshot, SourceParams};
use crate::sink::{PageKey, RecordSink};

/// Param holding exported progress
pub const PROGRESS_FIELD: &str = "progress";
/// Param naming the collection being harvested
pub const COLLECTION_FIELD: &str = "collection_id";

/// Position in a source's record stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageProgress {
    /// Cursor of the next page to request (`None` before the first page)
    pub cursor: Option<String>,
    /// Index of the next page to emit
    pub page: u64,
    /// Records durably emitted so far
    pub emitted: u64,
    /// Source reported no further pages
    #[serde(default)]
    pub exhausted: bool,
}

impl PageProgress {
    fn advance(&mut self, records: usize, next_cursor: Option<String>) {
        self.page += 1;
        self.emitted += records as u64;
        self.exhausted = next_cursor.is_none();
        self.cursor = next_cursor;
    }
}

/// One page returned by a source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub records: Vec<Value>,
    pub next_cursor: Option<String>,
}

/// Retrieval of a single page by cursor
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<Page, FetchError>;
}

/// Fetcher walking a `PageSource` and emitting each page to a sink
pub struct PagedFetcher<S> {
    harvest_type: String,
    collection_id: String,
    params: SourceParams,
    progress: PageProgress,
    source: S,
    sink: Arc<dyn RecordSink>,
}

impl<S: PageSource> PagedFetcher<S> {
    /// Position a fetcher at the request's progress, or at the start
    pub fn from_request(
        request: &HarvestRequest,
        source: S,
        sink: Arc<dyn RecordSink>,
    ) -> Result<Self, FetchError> {
        let collection_id = request
            .param_str(COLLECTION_FIELD)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| FetchError::InvalidParams(format!("missing '{}'", COLLECTION_FIELD)))?
            .to_string();

        let mut params = request.params().clone();
        let progress = match params.remove(PROGRESS_FIELD) {
            Some(value) => serde_json::from_value(value).map_err(|e| {
                FetchError::InvalidParams(format!("unreadable '{}': {}", PROGRESS_FIELD, e))
            })?,
            None => PageProgress::default(),
        };

        Ok(Self {
            harvest_type: request.harvest_type().to_string(),
            collection_id,
            params,
            progress,
            source,
            sink,
        })
    }

    pub fn progress(&self) -> &PageProgress {
        &self.progress
    }
}

#[async_trait]
impl<S: PageSource> Fetcher for PagedFetcher<S> {
    async fn fetch(&mut self) -> Result<(), FetchError> {
        while !self.progress.exhausted {
            let page = self.source.fetch_page(self.progress.cursor.as_deref()).await?;

            let key = PageKey::new(&self.harvest_type, &self.collection_id, self.progress.page);
            self.sink.emit(&key, &page.records).await?;

            let count = page.records.len();
            self.progress.advance(count, page.next_cursor);
            debug!(
                harvest_type = %self.harvest_type,
                collection_id = %self.collection_id,
                page = self.progress.page - 1,
                records = count,
                cursor = ?self.progress.cursor,
                "Page emitted"
            );
        }

        info!(
            harvest_type = %self.harvest_type,
            collection_id = %self.collection_id,
            pages = self.progress.page,
            records = self.progress.emitted,
            "Source exhausted"
        );
        Ok(())
    }

    fn snapshot(&self) -> Result<ProgressSnapshot, FetchError> {
        let mut params = self.params.clone();
        params.insert(PROGRESS_FIELD.to_string(), serde_json::to_value(&self.progress)?);
        Ok(ProgressSnapshot::new(params))
    }
}
