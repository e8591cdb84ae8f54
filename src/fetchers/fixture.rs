//! In-memory page source for local verification
//!
//! Params:
//! - `pages`: array of pages, each an array of records
//! - `page_delay_ms`: simulated latency per page request (default 0)
//! - `fail_page`: page index whose request fails

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::paged::{Page, PageSource, PagedFetcher};
use super::traits::{FetchError, Fetcher, FetcherFactory};
use crate::invocation::HarvestRequest;
use crate::sink::RecordSink;

pub const KIND: &str = "static";

/// Serves preloaded pages, using the page index as cursor
#[derive(Debug, Clone)]
pub struct StaticPageSource {
    pages: Vec<Vec<Value>>,
    delay: Duration,
    fail_page: Option<usize>,
}

impl StaticPageSource {
    pub fn new(pages: Vec<Vec<Value>>) -> Self {
        Self {
            pages,
            delay: Duration::ZERO,
            fail_page: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_at(mut self, page: usize) -> Self {
        self.fail_page = Some(page);
        self
    }

    /// Read `pages`, `page_delay_ms` and `fail_page` from request params
    pub fn from_request(request: &HarvestRequest) -> Result<Self, FetchError> {
        let pages = request
            .param("pages")
            .and_then(Value::as_array)
            .ok_or_else(|| FetchError::InvalidParams("missing 'pages' array".into()))?
            .iter()
            .enumerate()
            .map(|(i, page)| {
                page.as_array()
                    .cloned()
                    .ok_or_else(|| FetchError::InvalidParams(format!("page {} is not an array", i)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let delay = request
            .param("page_delay_ms")
            .and_then(Value::as_u64)
            .map(Duration::from_millis)
            .unwrap_or(Duration::ZERO);

        let fail_page = request
            .param("fail_page")
            .and_then(Value::as_u64)
            .map(|p| p as usize);

        Ok(Self {
            pages,
            delay,
            fail_page,
        })
    }
}

#[async_trait]
impl PageSource for StaticPageSource {
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<Page, FetchError> {
        let index = match cursor {
            Some(c) => c
                .parse::<usize>()
                .map_err(|_| FetchError::MalformedPage(format!("bad cursor '{}'", c)))?,
            None => 0,
        };

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.fail_page == Some(index) {
            return Err(FetchError::Source(format!("page {} unavailable", index)));
        }

        if self.pages.is_empty() && index == 0 {
            return Ok(Page::default());
        }

        let records = self
            .pages
            .get(index)
            .cloned()
            .ok_or_else(|| FetchError::MalformedPage(format!("cursor {} out of range", index)))?;
        let next = index + 1;

        Ok(Page {
            records,
            next_cursor: (next < self.pages.len()).then(|| next.to_string()),
        })
    }
}

/// Factory for the `static` fetcher kind
pub struct StaticFetcherFactory {
    sink: Arc<dyn RecordSink>,
}

impl StaticFetcherFactory {
    pub fn new(sink: Arc<dyn RecordSink>) -> Self {
        Self { sink }
    }
}

impl FetcherFactory for StaticFetcherFactory {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn build(&self, request: &HarvestRequest) -> Result<Box<dyn Fetcher>, FetchError> {
        let source = StaticPageSource::from_request(request)?;
        let fetcher = PagedFetcher::from_request(request, source, self.sink.clone())?;
        Ok(Box::new(fetcher))
    }
}
