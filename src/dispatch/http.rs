//! HTTP worker invoker

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use super::{DispatchError, WorkerInvoker};

/// Starts workers by POSTing payloads to `{endpoint}/invoke/{worker_name}`
///
/// Only `202 Accepted` counts as acceptance. The call returns as soon as the
/// remote side has queued the payload.
#[derive(Debug, Clone)]
pub struct HttpInvoker {
    client: Client,
    endpoint: String,
    auth_token: Option<String>,
}

impl HttpInvoker {
    pub fn new(
        endpoint: &str,
        request_timeout: Duration,
        auth_token: Option<String>,
    ) -> Result<Self, DispatchError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(request_timeout)
            .user_agent(concat!("harvestrelay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DispatchError::Unreachable(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            auth_token,
        })
    }

    fn invoke_url(&self, worker_name: &str) -> String {
        format!("{}/invoke/{}", self.endpoint, worker_name)
    }
}

#[async_trait]
impl WorkerInvoker for HttpInvoker {
    async fn submit(&self, worker_name: &str, payload: Vec<u8>) -> Result<(), DispatchError> {
        let url = self.invoke_url(worker_name);
        let size = payload.len();

        let mut request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DispatchError::Unreachable(format!("timed out posting to {}", url))
            } else {
                DispatchError::Unreachable(e.to_string())
            }
        })?;

        let status = response.status();
        if status != StatusCode::ACCEPTED {
            return Err(DispatchError::Rejected(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        debug!(url = %url, size, "Invocation accepted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::post;
    use std::sync::{Arc, Mutex};

    type Seen = Arc<Mutex<Vec<(String, Option<String>, Vec<u8>)>>>;

    async fn spawn_worker(seen: Seen) -> String {
        async fn invoke(
            State(seen): State<Seen>,
            Path(worker): Path<String>,
            headers: HeaderMap,
            body: axum::body::Bytes,
        ) -> AxumStatus {
            if worker != "async-fetch" {
                return AxumStatus::NOT_FOUND;
            }
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            seen.lock().unwrap().push((worker, auth, body.to_vec()));
            AxumStatus::ACCEPTED
        }

        let app = Router::new()
            .route("/invoke/{worker}", post(invoke))
            .with_state(seen);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_invoke_url_trims_trailing_slash() {
        let invoker =
            HttpInvoker::new("http://workers.local:8080/", Duration::from_secs(1), None).unwrap();
        assert_eq!(
            invoker.invoke_url("async-fetch"),
            "http://workers.local:8080/invoke/async-fetch"
        );
    }

    #[tokio::test]
    async fn test_submit_accepted() {
        let seen: Seen = Arc::default();
        let endpoint = spawn_worker(seen.clone()).await;
        let invoker =
            HttpInvoker::new(&endpoint, Duration::from_secs(5), Some("s3cret".into())).unwrap();

        invoker
            .submit("async-fetch", br#"{"harvest_type":"oai"}"#.to_vec())
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1.as_deref(), Some("Bearer s3cret"));
        assert_eq!(seen[0].2, br#"{"harvest_type":"oai"}"#.to_vec());
    }

    #[tokio::test]
    async fn test_submit_rejected_by_status() {
        let endpoint = spawn_worker(Arc::default()).await;
        let invoker = HttpInvoker::new(&endpoint, Duration::from_secs(5), None).unwrap();

        let result = invoker.submit("other-worker", b"{}".to_vec()).await;
        assert!(matches!(result, Err(DispatchError::Rejected(msg)) if msg.starts_with("HTTP 404")));
    }

    #[tokio::test]
    async fn test_submit_unreachable() {
        // Bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let invoker =
            HttpInvoker::new(&format!("http://{}", addr), Duration::from_secs(2), None).unwrap();
        let result = invoker.submit("async-fetch", b"{}".to_vec()).await;
        assert!(matches!(result, Err(DispatchError::Unreachable(_))));
    }
}
