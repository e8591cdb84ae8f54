//! Assemble an [`EntryPoint`] and its collaborators from configuration

use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::config::{Config, DispatchTarget};
use crate::dispatch::{
    ChannelInvoker, ContinuationDispatcher, DispatchError, DispatchMode, HttpInvoker,
    PayloadHandler, WorkerPool,
};
use crate::entry::EntryPoint;
use crate::fetchers::{FeedFetcherFactory, FetchError, FetcherRegistry, RegistryError};
use crate::ledger::{ChainLedger, LedgerError};
use crate::observability::ChainMetrics;
use crate::runner::DeadlineRunner;
use crate::sink::{ObjectStoreSink, RecordSink, SinkError};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("sink: {0}")]
    Sink(#[from] SinkError),

    #[error("fetcher: {0}")]
    Fetcher(#[from] FetchError),

    #[error("registry: {0}")]
    Registry(#[from] RegistryError),

    #[error("dispatch: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),

    #[error("dispatch target 'http' requires an endpoint")]
    MissingEndpoint,
}

/// Everything one process needs to serve invocations
pub struct Runtime {
    pub entry: Arc<EntryPoint>,
    /// Present when continuations go to the local worker pool
    pub pool: Option<WorkerPool>,
    pub ledger: Option<ChainLedger>,
    pub metrics: Arc<ChainMetrics>,
    pub worker_name: String,
}

impl Runtime {
    /// Build from configuration; `mode` overrides `dispatch.mode` when set
    ///
    /// Spawns pool workers, so it must run inside a Tokio runtime.
    pub fn build(config: &Config, mode: Option<DispatchMode>) -> Result<Self, BootstrapError> {
        let sink: Arc<dyn RecordSink> = Arc::new(ObjectStoreSink::from_config(&config.sink)?);
        let budget = config.runner.budget.as_duration();
        let client = FeedFetcherFactory::client(budget)?;

        let registry = if config.fetchers.is_empty() {
            FetcherRegistry::with_defaults(client, sink)
        } else {
            FetcherRegistry::from_config(&config.fetchers, client, sink)?
        };
        let runner = DeadlineRunner::new(Arc::new(registry), budget);

        let ledger = if config.ledger.enabled {
            Some(ChainLedger::open(&config.ledger.path)?)
        } else {
            None
        };
        let metrics = Arc::new(ChainMetrics::new());

        let dispatch = &config.dispatch;
        let mode = mode.unwrap_or(dispatch.mode);
        let mut local = None;

        let dispatcher = match (mode, dispatch.target) {
            (DispatchMode::InProcess, _) => ContinuationDispatcher::in_process(),
            (DispatchMode::Dispatch, DispatchTarget::Http) => {
                let endpoint = dispatch
                    .endpoint
                    .as_deref()
                    .ok_or(BootstrapError::MissingEndpoint)?;
                let invoker = HttpInvoker::new(
                    endpoint,
                    dispatch.request_timeout.as_duration(),
                    dispatch.auth_token.clone(),
                )?;
                ContinuationDispatcher::dispatching(dispatch.worker_name.clone(), Arc::new(invoker))
            }
            (DispatchMode::Dispatch, DispatchTarget::Local) => {
                let (invoker, receivers) =
                    ChannelInvoker::new(dispatch.local_workers, dispatch.queue_depth);
                local = Some((receivers, invoker.tracker()));
                ContinuationDispatcher::dispatching(dispatch.worker_name.clone(), Arc::new(invoker))
            }
        };

        let mut entry = EntryPoint::new(runner, dispatcher)
            .with_max_links(config.runner.max_links)
            .with_metrics(metrics.clone());
        if let Some(ledger) = &ledger {
            entry = entry.with_ledger(ledger.clone());
        }
        let entry = Arc::new(entry);

        let pool = local.map(|(receivers, tracker)| {
            let handler: Arc<dyn PayloadHandler> = entry.clone();
            WorkerPool::spawn(receivers, tracker, handler)
        });

        info!(
            %mode,
            budget = %config.runner.budget,
            local_pool = pool.is_some(),
            ledger = ledger.is_some(),
            "Runtime assembled"
        );

        Ok(Self {
            entry,
            pool,
            ledger,
            metrics,
            worker_name: dispatch.worker_name.clone(),
        })
    }

    /// Wait for local continuations, then flush the ledger
    pub async fn shutdown(self) -> Result<(), BootstrapError> {
        if let Some(pool) = self.pool {
            pool.shutdown().await;
        }
        if let Some(ledger) = &self.ledger {
            ledger.persist()?;
        }
        Ok(())
    }
}
