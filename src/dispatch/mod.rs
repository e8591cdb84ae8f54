//! Continuation dispatcher
//!
//! Hands a resumption payload to the next bounded execution. In
//! [`DispatchMode::InProcess`] the payload is serialized, decoded again and
//! returned to the caller for synchronous re-entry; in
//! [`DispatchMode::Dispatch`] the bytes are submitted once to a
//! [`WorkerInvoker`] and the dispatcher forgets about them.
//!
//! Every attempt produces a [`DispatchReport`] that is passed to the
//! configured [`DispatchAck`] hook.

mod http;
mod invoker;
mod pool;

pub use http::HttpInvoker;
pub use invoker::{RecordingInvoker, Submission, WorkerInvoker};
pub use pool::{ChannelInvoker, PayloadHandler, PendingTracker, PoolJob, WorkerPool};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::invocation::{ChainInfo, InvocationPayload, ResumptionPayload};

/// How a continuation reaches the next execution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Re-enter the entry point inside the current call
    InProcess,
    /// Submit to a worker-invocation facility
    #[default]
    Dispatch,
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchMode::InProcess => write!(f, "in_process"),
            DispatchMode::Dispatch => write!(f, "dispatch"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to encode continuation: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invocation rejected: {0}")]
    Rejected(String),

    #[error("invocation facility unreachable: {0}")]
    Unreachable(String),

    #[error("worker pool closed: {0}")]
    Closed(String),
}

/// Result of one dispatch attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub harvest_type: String,
    /// Identity of the successor execution
    pub chain: ChainInfo,
    pub mode: DispatchMode,
    pub worker_name: Option<String>,
    pub size: usize,
    pub accepted: bool,
    pub error: Option<String>,
}

/// Observer notified after every dispatch attempt
#[async_trait]
pub trait DispatchAck: Send + Sync {
    async fn acknowledge(&self, report: &DispatchReport);
}

/// Default hook: writes the report to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAck;

#[async_trait]
impl DispatchAck for LogAck {
    async fn acknowledge(&self, report: &DispatchReport) {
        if report.accepted {
            debug!(
                harvest_type = %report.harvest_type,
                chain_id = %report.chain.id,
                link = report.chain.link,
                mode = %report.mode,
                "Continuation accepted"
            );
        } else {
            warn!(
                harvest_type = %report.harvest_type,
                chain_id = %report.chain.id,
                link = report.chain.link,
                mode = %report.mode,
                error = report.error.as_deref().unwrap_or("unknown"),
                "Continuation not accepted"
            );
        }
    }
}

/// What happened to a continuation
#[derive(Debug)]
pub enum Continuation {
    /// In-process: the decoded payload to run next, inside the current call
    Inline(InvocationPayload),
    /// Dispatch: accepted by the invocation facility
    Submitted,
    Failed(DispatchError),
}

enum Target {
    InProcess,
    Invoker {
        worker_name: String,
        invoker: Arc<dyn WorkerInvoker>,
    },
}

pub struct ContinuationDispatcher {
    target: Target,
    ack: Arc<dyn DispatchAck>,
}

impl ContinuationDispatcher {
    pub fn in_process() -> Self {
        Self {
            target: Target::InProcess,
            ack: Arc::new(LogAck),
        }
    }

    pub fn dispatching(worker_name: impl Into<String>, invoker: Arc<dyn WorkerInvoker>) -> Self {
        Self {
            target: Target::Invoker {
                worker_name: worker_name.into(),
                invoker,
            },
            ack: Arc::new(LogAck),
        }
    }

    pub fn with_ack(mut self, ack: Arc<dyn DispatchAck>) -> Self {
        self.ack = ack;
        self
    }

    pub fn mode(&self) -> DispatchMode {
        match self.target {
            Target::InProcess => DispatchMode::InProcess,
            Target::Invoker { .. } => DispatchMode::Dispatch,
        }
    }

    /// Make exactly one attempt to start the execution described by `payload`
    pub async fn dispatch(&self, payload: ResumptionPayload) -> Continuation {
        let mut report = DispatchReport {
            harvest_type: payload.harvest_type.clone(),
            chain: payload.chain,
            mode: self.mode(),
            worker_name: None,
            size: 0,
            accepted: false,
            error: None,
        };

        let continuation = match payload.encode() {
            Err(err) => Continuation::Failed(err.into()),
            Ok(bytes) => {
                report.size = bytes.len();
                self.deliver(bytes, &mut report).await
            }
        };

        match &continuation {
            Continuation::Failed(err) => report.error = Some(err.to_string()),
            _ => report.accepted = true,
        }
        self.ack.acknowledge(&report).await;

        continuation
    }

    async fn deliver(&self, bytes: Vec<u8>, report: &mut DispatchReport) -> Continuation {
        match &self.target {
            Target::InProcess => match InvocationPayload::decode(&bytes) {
                Ok(payload) => {
                    debug!(
                        chain_id = %report.chain.id,
                        link = report.chain.link,
                        size = bytes.len(),
                        "Continuing in process"
                    );
                    Continuation::Inline(payload)
                }
                Err(err) => Continuation::Failed(err.into()),
            },
            Target::Invoker {
                worker_name,
                invoker,
            } => {
                report.worker_name = Some(worker_name.clone());
                match invoker.submit(worker_name, bytes).await {
                    Ok(()) => {
                        info!(
                            worker_name = %worker_name,
                            chain_id = %report.chain.id,
                            link = report.chain.link,
                            "Continuation submitted"
                        );
                        Continuation::Submitted
                    }
                    Err(err) => Continuation::Failed(err),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::{PayloadKind, ProgressSnapshot, SourceParams};
    use serde_json::{Value, json};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CollectingAck {
        reports: Mutex<Vec<DispatchReport>>,
    }

    #[async_trait]
    impl DispatchAck for CollectingAck {
        async fn acknowledge(&self, report: &DispatchReport) {
            self.reports.lock().unwrap().push(report.clone());
        }
    }

    fn resumption() -> ResumptionPayload {
        let progress = match json!({
            "collection_id": "466",
            "progress": {"cursor": "2", "page": 2, "emitted": 4, "exhausted": false}
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        ResumptionPayload::new("nuxeo", ChainInfo::start(), ProgressSnapshot::new(progress))
    }

    #[test]
    fn test_mode_serialization() {
        assert_eq!(serde_json::to_value(DispatchMode::InProcess).unwrap(), json!("in_process"));
        assert_eq!(
            serde_json::from_value::<DispatchMode>(json!("dispatch")).unwrap(),
            DispatchMode::Dispatch
        );
        assert_eq!(DispatchMode::default(), DispatchMode::Dispatch);
    }

    #[tokio::test]
    async fn test_in_process_round_trips_payload() {
        let dispatcher = ContinuationDispatcher::in_process();
        assert_eq!(dispatcher.mode(), DispatchMode::InProcess);

        let payload = resumption();
        match dispatcher.dispatch(payload.clone()).await {
            Continuation::Inline(decoded) => {
                assert_eq!(decoded.kind(), PayloadKind::Resumption);
                assert_eq!(decoded.harvest_type(), Some("nuxeo"));
                assert_eq!(decoded.chain, Some(payload.chain));
                assert_eq!(decoded.params.get("progress"), payload.progress.get("progress"));
            }
            other => panic!("expected Inline, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dispatch_submits_once() {
        let invoker = Arc::new(RecordingInvoker::new());
        let ack = Arc::new(CollectingAck::default());
        let dispatcher = ContinuationDispatcher::dispatching("async-fetch", invoker.clone())
            .with_ack(ack.clone());

        let payload = resumption();
        let continuation = dispatcher.dispatch(payload.clone()).await;
        assert!(matches!(continuation, Continuation::Submitted));

        let submissions = invoker.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].worker_name, "async-fetch");

        let sent = InvocationPayload::decode(&submissions[0].payload).unwrap();
        assert_eq!(sent.harvest_type(), Some("nuxeo"));
        assert_eq!(sent.chain.unwrap().link, 1);
        assert_eq!(&sent.params, payload.progress.params());

        let reports = ack.reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].accepted);
        assert_eq!(reports[0].worker_name.as_deref(), Some("async-fetch"));
        assert_eq!(reports[0].size, submissions[0].payload.len());
    }

    #[tokio::test]
    async fn test_rejected_submission_is_reported() {
        let invoker = Arc::new(RecordingInvoker::rejecting());
        let ack = Arc::new(CollectingAck::default());
        let dispatcher =
            ContinuationDispatcher::dispatching("async-fetch", invoker.clone()).with_ack(ack.clone());

        let continuation = dispatcher.dispatch(resumption()).await;
        assert!(matches!(continuation, Continuation::Failed(DispatchError::Rejected(_))));
        assert_eq!(invoker.submissions().len(), 1);

        let reports = ack.reports.lock().unwrap();
        assert!(!reports[0].accepted);
        assert!(reports[0].error.as_deref().unwrap().contains("refused"));
    }

    #[tokio::test]
    async fn test_reserved_fields_do_not_leak_from_progress() {
        let mut params = SourceParams::new();
        params.insert("harvest_type".into(), json!("spoofed"));
        params.insert("collection_id".into(), json!("1"));
        let payload =
            ResumptionPayload::new("oai", ChainInfo::start(), ProgressSnapshot::new(params));

        match ContinuationDispatcher::in_process().dispatch(payload).await {
            Continuation::Inline(decoded) => {
                assert_eq!(decoded.harvest_type(), Some("oai"));
                assert!(!decoded.params.contains_key("harvest_type"));
            }
            other => panic!("expected Inline, got {:?}", other),
        }
    }
}
