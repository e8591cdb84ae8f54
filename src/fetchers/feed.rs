//! Generic paginated JSON feed over HTTP
//!
//! Requests `url` (adding `<cursor_param>=<cursor>` after the first page) and
//! reads the page's records and continuation cursor from the JSON body.
//!
//! Params: `url` and `collection_id` (required), `cursor_param` (default
//! `cursor`), `records_field` (default `records`), `next_field` (default
//! `next`). Field names may be dotted paths such as `data.items`.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::paged::{Page, PageSource, PagedFetcher};
use super::traits::{FetchError, Fetcher, FetcherFactory};
use crate::invocation::HarvestRequest;
use crate::sink::RecordSink;

pub const KIND: &str = "json_feed";

const DEFAULT_CURSOR_PARAM: &str = "cursor";
const DEFAULT_RECORDS_FIELD: &str = "records";
const DEFAULT_NEXT_FIELD: &str = "next";

/// HTTP page source for a JSON feed
#[derive(Debug, Clone)]
pub struct FeedSource {
    client: Client,
    url: String,
    cursor_param: String,
    records_field: String,
    next_field: String,
}

impl FeedSource {
    pub fn from_request(client: Client, request: &HarvestRequest) -> Result<Self, FetchError> {
        let url = request
            .param_str("url")
            .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
            .ok_or_else(|| FetchError::InvalidParams("missing or non-http 'url'".into()))?
            .to_string();

        let text = |key: &str, default: &str| {
            request.param_str(key).unwrap_or(default).to_string()
        };

        Ok(Self {
            client,
            url,
            cursor_param: text("cursor_param", DEFAULT_CURSOR_PARAM),
            records_field: text("records_field", DEFAULT_RECORDS_FIELD),
            next_field: text("next_field", DEFAULT_NEXT_FIELD),
        })
    }
}

#[async_trait]
impl PageSource for FeedSource {
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<Page, FetchError> {
        let mut request = self.client.get(&self.url);
        if let Some(cursor) = cursor {
            request = request.query(&[(self.cursor_param.as_str(), cursor)]);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Source(format!("timed out requesting {}", self.url))
            } else {
                FetchError::Source(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Source(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Source(format!("Failed to read body: {}", e)))?;

        debug!(url = %self.url, cursor = ?cursor, size = body.len(), "Feed page received");

        let body: Value = serde_json::from_slice(&body)
            .map_err(|e| FetchError::MalformedPage(format!("invalid JSON: {}", e)))?;
        parse_page(&body, &self.records_field, &self.next_field)
    }
}

/// Extract records and continuation cursor from a feed page body
pub fn parse_page(body: &Value, records_field: &str, next_field: &str) -> Result<Page, FetchError> {
    let records = lookup(body, records_field)
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| {
            FetchError::MalformedPage(format!("'{}' is missing or not an array", records_field))
        })?;

    let next_cursor = match lookup(body, next_field) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(false)) => None,
        Some(other) => {
            return Err(FetchError::MalformedPage(format!(
                "'{}' has unsupported cursor value {}",
                next_field, other
            )));
        }
    };

    Ok(Page {
        records,
        next_cursor,
    })
}

fn lookup<'a>(body: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(body, |value, key| value.get(key))
}

/// Factory for the `json_feed` fetcher kind
pub struct FeedFetcherFactory {
    client: Client,
    sink: Arc<dyn RecordSink>,
}

impl FeedFetcherFactory {
    pub fn new(client: Client, sink: Arc<dyn RecordSink>) -> Self {
        Self { client, sink }
    }

    /// Build the shared HTTP client used by every feed fetcher
    pub fn client(request_timeout: Duration) -> Result<Client, FetchError> {
        Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(request_timeout)
            .user_agent(concat!("harvestrelay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Source(e.to_string()))
    }
}

impl FetcherFactory for FeedFetcherFactory {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn build(&self, request: &HarvestRequest) -> Result<Box<dyn Fetcher>, FetchError> {
        let source = FeedSource::from_request(self.client.clone(), request)?;
        let fetcher = PagedFetcher::from_request(request, source, self.sink.clone())?;
        Ok(Box::new(fetcher))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_page_defaults() {
        let body = json!({"records": [{"id": 1}, {"id": 2}], "next": "abc"});
        let page = parse_page(&body, "records", "next").unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.next_cursor.as_deref(), Some("abc"));
    }

    #[test]
    fn test_parse_page_nested_fields_and_numeric_cursor() {
        let body = json!({
            "data": {"entries": [{"uid": "x"}]},
            "paging": {"nextPageIndex": 4}
        });
        let page = parse_page(&body, "data.entries", "paging.nextPageIndex").unwrap();
        assert_eq!(page.records, vec![json!({"uid": "x"})]);
        assert_eq!(page.next_cursor.as_deref(), Some("4"));
    }

    #[test]
    fn test_parse_page_end_markers() {
        for next in [json!(null), json!(""), json!(false)] {
            let body = json!({"records": [], "next": next});
            assert_eq!(parse_page(&body, "records", "next").unwrap().next_cursor, None);
        }

        let body = json!({"records": []});
        assert_eq!(parse_page(&body, "records", "next").unwrap().next_cursor, None);
    }

    #[test]
    fn test_parse_page_rejects_bad_shapes() {
        let body = json!({"records": {"id": 1}});
        assert!(matches!(
            parse_page(&body, "records", "next"),
            Err(FetchError::MalformedPage(_))
        ));

        let body = json!({"records": [], "next": ["a"]});
        assert!(parse_page(&body, "records", "next").is_err());
    }

    #[test]
    fn test_source_requires_http_url() {
        let client = Client::new();
        let params = |value: Value| match value {
            Value::Object(map) => HarvestRequest::new(KIND, map),
            _ => unreachable!(),
        };

        assert!(FeedSource::from_request(client.clone(), &params(json!({}))).is_err());
        assert!(
            FeedSource::from_request(client.clone(), &params(json!({"url": "ftp://x"}))).is_err()
        );

        let source = FeedSource::from_request(
            client,
            &params(json!({"url": "https://feed.example.org/records", "cursor_param": "page"})),
        )
        .unwrap();
        assert_eq!(source.cursor_param, "page");
        assert_eq!(source.records_field, "records");
    }
}
