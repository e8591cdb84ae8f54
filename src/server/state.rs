use std::sync::Arc;

use crate::bootstrap::Runtime;
use crate::entry::EntryPoint;
use crate::ledger::ChainLedger;
use crate::observability::ChainMetrics;

#[derive(Clone)]
pub struct AppState {
    pub entry: Arc<EntryPoint>,
    pub worker_name: Arc<str>,
    pub max_payload_bytes: usize,
    /// Bearer token required on `/invoke`, when set
    pub auth_token: Option<Arc<str>>,
    pub ledger: Option<ChainLedger>,
    pub metrics: Arc<ChainMetrics>,
}

impl AppState {
    pub fn new(runtime: &Runtime, max_payload_bytes: usize, auth_token: Option<String>) -> Self {
        Self {
            entry: runtime.entry.clone(),
            worker_name: Arc::from(runtime.worker_name.as_str()),
            max_payload_bytes,
            auth_token: auth_token.map(Arc::from),
            ledger: runtime.ledger.clone(),
            metrics: runtime.metrics.clone(),
        }
    }
}
