//! Entry point for one bounded execution
//!
//! Decodes an invocation payload (fresh request or resumption, same path),
//! runs the deadline runner and, when the budget runs out, hands the exported
//! progress to the continuation dispatcher. In in-process mode the successor
//! runs inside the same call, so the returned outcome is the chain's terminal
//! one.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::dispatch::{Continuation, ContinuationDispatcher, DispatchMode, PayloadHandler};
use crate::fetchers::FetchError;
use crate::invocation::{
    AbortReason, ChainInfo, ChainOutcome, HandlerResult, InvocationPayload, ResumptionPayload,
};
use crate::ledger::{ChainLedger, ChainState};
use crate::observability::ChainMetrics;
use crate::runner::{DeadlineRunner, Outcome, RunError};

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("undecodable invocation payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("fetcher '{harvest_type}' failed in execution {link} of chain {chain_id}: {source}")]
    Fetcher {
        harvest_type: String,
        chain_id: Uuid,
        link: u32,
        source: FetchError,
    },
}

/// Where one link leaves the chain
enum Step {
    Finished(ChainOutcome),
    /// In-process successor to run next
    Resume(InvocationPayload),
}

pub struct EntryPoint {
    runner: DeadlineRunner,
    dispatcher: ContinuationDispatcher,
    max_links: Option<u32>,
    ledger: Option<ChainLedger>,
    metrics: Arc<ChainMetrics>,
}

impl EntryPoint {
    pub fn new(runner: DeadlineRunner, dispatcher: ContinuationDispatcher) -> Self {
        Self {
            runner,
            dispatcher,
            max_links: None,
            ledger: None,
            metrics: Arc::new(ChainMetrics::new()),
        }
    }

    /// Abort chains before they execute more than `max_links` times
    pub fn with_max_links(mut self, max_links: Option<u32>) -> Self {
        self.max_links = max_links;
        self
    }

    pub fn with_ledger(mut self, ledger: ChainLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<ChainMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn mode(&self) -> DispatchMode {
        self.dispatcher.mode()
    }

    pub fn metrics(&self) -> &ChainMetrics {
        &self.metrics
    }

    pub async fn handle(&self, payload: InvocationPayload) -> Result<HandlerResult, HandlerError> {
        let outcome = self.execute(payload).await?;
        Ok(HandlerResult::success(outcome))
    }

    pub async fn handle_bytes(&self, bytes: &[u8]) -> Result<HandlerResult, HandlerError> {
        self.handle(InvocationPayload::decode(bytes)?).await
    }

    pub async fn handle_value(&self, value: Value) -> Result<HandlerResult, HandlerError> {
        self.handle(InvocationPayload::from_value(value)?).await
    }

    /// Run links until one ends the chain here or hands it off
    async fn execute(&self, mut payload: InvocationPayload) -> Result<ChainOutcome, HandlerError> {
        loop {
            match self.execute_link(payload).await? {
                Step::Finished(outcome) => return Ok(outcome),
                Step::Resume(next) => payload = next,
            }
        }
    }

    async fn execute_link(&self, payload: InvocationPayload) -> Result<Step, HandlerError> {
        self.metrics.execution_started();
        let chain_id = payload.chain.map(|c| c.id);

        let request = match payload.into_request() {
            Ok(request) => request,
            Err(reason) => {
                warn!(chain_id = ?chain_id, %reason, "Invocation payload has no usable harvest type");
                self.metrics.chain_aborted();
                return Ok(Step::Finished(ChainOutcome::Aborted { chain_id, reason }));
            }
        };

        let chain = request.chain();
        let harvest_type = request.harvest_type().to_string();

        // The last link index is reserved so the link count never overflows
        let max_links = self.max_links.unwrap_or(u32::MAX);
        if chain.link >= max_links {
            let reason = AbortReason::ChainLimitReached { max_links };
            warn!(%harvest_type, chain_id = %chain.id, link = chain.link, max_links, "Chain limit reached");
            return Ok(Step::Finished(self.abort(chain, &harvest_type, reason)));
        }

        info!(%harvest_type, chain_id = %chain.id, link = chain.link, "Execution started");
        self.record(chain, &harvest_type, ChainState::Running, None);

        let outcome = match self.runner.run(&request).await {
            Ok(Outcome::Completed) => {
                self.record(chain, &harvest_type, ChainState::Completed, None);
                self.metrics.chain_completed();
                info!(%harvest_type, chain_id = %chain.id, links = chain.link + 1, "Harvest completed");
                ChainOutcome::Completed {
                    chain_id: chain.id,
                    links: chain.link + 1,
                }
            }
            Ok(Outcome::BudgetExceeded(snapshot)) => {
                let resumption = ResumptionPayload::new(harvest_type.clone(), chain, snapshot);
                let next_link = resumption.chain.link;

                match self.dispatcher.dispatch(resumption).await {
                    Continuation::Inline(next) => {
                        self.continued(chain, &harvest_type, next_link);
                        return Ok(Step::Resume(next));
                    }
                    Continuation::Submitted => {
                        self.continued(chain, &harvest_type, next_link);
                        ChainOutcome::Continuing {
                            chain_id: chain.id,
                            next_link,
                        }
                    }
                    Continuation::Failed(err) => {
                        error!(%harvest_type, chain_id = %chain.id, link = chain.link, error = %err, "Continuation dispatch failed");
                        self.metrics.dispatch_failed();
                        let reason = AbortReason::DispatchFailed {
                            message: err.to_string(),
                        };
                        self.abort(chain, &harvest_type, reason)
                    }
                }
            }
            Err(RunError::UnknownHarvestType(_)) => {
                warn!(%harvest_type, chain_id = %chain.id, "bad harvest type: {}", harvest_type);
                let reason = AbortReason::UnknownHarvestType {
                    harvest_type: harvest_type.clone(),
                };
                self.abort(chain, &harvest_type, reason)
            }
            Err(RunError::Fetcher(source)) => {
                error!(%harvest_type, chain_id = %chain.id, link = chain.link, error = %source, "Fetcher failed");
                self.metrics.fetcher_failed();
                self.record(chain, &harvest_type, ChainState::Failed, Some(source.to_string()));
                return Err(HandlerError::Fetcher {
                    harvest_type,
                    chain_id: chain.id,
                    link: chain.link,
                    source,
                });
            }
        };

        Ok(Step::Finished(outcome))
    }

    fn continued(&self, chain: ChainInfo, harvest_type: &str, next_link: u32) {
        self.record(chain, harvest_type, ChainState::Continuing, None);
        self.metrics.chain_continued();
        info!(harvest_type, chain_id = %chain.id, next_link, "Harvest continuing");
    }

    fn abort(&self, chain: ChainInfo, harvest_type: &str, reason: AbortReason) -> ChainOutcome {
        self.record(chain, harvest_type, ChainState::Aborted, Some(reason.to_string()));
        self.metrics.chain_aborted();
        ChainOutcome::Aborted {
            chain_id: Some(chain.id),
            reason,
        }
    }

    /// Ledger failures are logged and never fail the execution
    fn record(&self, chain: ChainInfo, harvest_type: &str, state: ChainState, detail: Option<String>) {
        let Some(ledger) = &self.ledger else {
            return;
        };
        if let Err(err) = ledger.record_link(chain.id, harvest_type, chain.link, state, detail) {
            warn!(chain_id = %chain.id, link = chain.link, error = %err, "Failed to record chain link");
        }
    }
}

#[async_trait]
impl PayloadHandler for EntryPoint {
    async fn handle_payload(&self, worker_name: &str, payload: Vec<u8>) {
        match self.handle_bytes(&payload).await {
            Ok(result) => info!(worker_name, outcome = %result.body, "Invocation finished"),
            Err(err) => error!(worker_name, error = %err, "Invocation failed"),
        }
    }
}
