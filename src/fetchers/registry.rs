use reqwest::Client;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::feed::{self, FeedFetcherFactory};
use super::fixture::{self, StaticFetcherFactory};
use super::traits::{FetchError, Fetcher, FetcherFactory};
use crate::config::FetcherConfig;
use crate::invocation::{HarvestRequest, SourceParams};
use crate::sink::RecordSink;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("harvest type '{harvest_type}' uses unknown fetcher kind '{kind}'")]
    UnknownKind { harvest_type: String, kind: String },
}

/// A registered harvest type: its factory plus params it starts from
#[derive(Clone)]
pub struct RegisteredFetcher {
    factory: Arc<dyn FetcherFactory>,
    defaults: SourceParams,
}

impl RegisteredFetcher {
    pub fn kind(&self) -> &'static str {
        self.factory.kind()
    }

    /// Construct a fetcher for `request`, filling in configured defaults
    pub fn build(&self, request: &HarvestRequest) -> Result<Box<dyn Fetcher>, FetchError> {
        if self.defaults.is_empty() {
            self.factory.build(request)
        } else {
            self.factory.build(&request.with_defaults(&self.defaults))
        }
    }
}

/// Registry mapping harvest types to fetcher factories
#[derive(Clone, Default)]
pub struct FetcherRegistry {
    fetchers: BTreeMap<String, RegisteredFetcher>,
}

impl FetcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        harvest_type: impl Into<String>,
        factory: Arc<dyn FetcherFactory>,
        defaults: SourceParams,
    ) {
        let harvest_type = harvest_type.into();
        debug!(%harvest_type, kind = factory.kind(), "Registered fetcher");
        self.fetchers
            .insert(harvest_type, RegisteredFetcher { factory, defaults });
    }

    pub fn get(&self, harvest_type: &str) -> Option<&RegisteredFetcher> {
        self.fetchers.get(harvest_type)
    }

    pub fn contains(&self, harvest_type: &str) -> bool {
        self.fetchers.contains_key(harvest_type)
    }

    pub fn harvest_types(&self) -> impl Iterator<Item = &str> {
        self.fetchers.keys().map(String::as_str)
    }

    /// Registry with the production kinds registered under their own names
    ///
    /// The `static` fixture kind is left out; it is only reachable through an
    /// explicit `kind = "static"` fetcher entry.
    pub fn with_defaults(client: Client, sink: Arc<dyn RecordSink>) -> Self {
        let mut registry = Self::new();
        let feed = Arc::new(FeedFetcherFactory::new(client, sink));
        registry.register(feed::KIND, feed, SourceParams::new());
        registry
    }

    /// Registry holding exactly the configured harvest types
    pub fn from_config(
        fetchers: &HashMap<String, FetcherConfig>,
        client: Client,
        sink: Arc<dyn RecordSink>,
    ) -> Result<Self, RegistryError> {
        let factories = builtin_factories(client, sink);
        let mut registry = Self::new();

        for (harvest_type, config) in fetchers {
            let factory = factories
                .iter()
                .find(|f| f.kind() == config.kind)
                .cloned()
                .ok_or_else(|| RegistryError::UnknownKind {
                    harvest_type: harvest_type.clone(),
                    kind: config.kind.clone(),
                })?;
            registry.register(harvest_type.clone(), factory, config.defaults.clone());
        }

        Ok(registry)
    }
}

fn builtin_factories(client: Client, sink: Arc<dyn RecordSink>) -> Vec<Arc<dyn FetcherFactory>> {
    vec![
        Arc::new(FeedFetcherFactory::new(client, sink.clone())) as Arc<dyn FetcherFactory>,
        Arc::new(StaticFetcherFactory::new(sink)) as Arc<dyn FetcherFactory>,
    ]
}

/// Fetcher kinds accepted in configuration
pub const KNOWN_KINDS: &[&str] = &[feed::KIND, fixture::KIND];
