//! Durable destination for harvested pages
//! Uses Apache Arrow object_store crate
//!
//! Pages are written under a deterministic key per
//! `(collection, harvest type, page index)`, so emitting the same page twice
//! overwrites the earlier object instead of duplicating its records.

use async_trait::async_trait;
use object_store::{ObjectStore, path::Path as StoragePath};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{SinkConfig, SinkProvider};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SinkError>;

/// Address of one emitted page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub harvest_type: String,
    pub collection_id: String,
    pub page: u64,
}

impl PageKey {
    pub fn new(harvest_type: impl Into<String>, collection_id: impl Into<String>, page: u64) -> Self {
        Self {
            harvest_type: harvest_type.into(),
            collection_id: collection_id.into(),
            page,
        }
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/page-{:08}.jsonl",
            self.collection_id, self.harvest_type, self.page
        )
    }
}

/// Consumer of harvested records
///
/// `emit` must be idempotent per key: a fetcher preempted mid-write repeats
/// the same page under the same key on resume.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn emit(&self, key: &PageKey, records: &[Value]) -> Result<()>;
}

/// Record sink wrapping object_store
#[derive(Clone)]
pub struct ObjectStoreSink {
    store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl ObjectStoreSink {
    /// Create a sink over any object_store backend
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    /// Create in-memory sink for testing/development
    pub fn in_memory() -> Self {
        Self::new(Arc::new(object_store::memory::InMemory::new()), "harvested")
    }

    /// Create a sink writing below a local directory
    pub fn local(root: &Path, prefix: impl Into<String>) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        let store = object_store::local::LocalFileSystem::new_with_prefix(root)?;
        Ok(Self::new(Arc::new(store), prefix))
    }

    /// Build the sink selected by configuration
    pub fn from_config(config: &SinkConfig) -> Result<Self> {
        match config.provider {
            SinkProvider::Memory => Ok(Self::new(
                Arc::new(object_store::memory::InMemory::new()),
                config.prefix.clone(),
            )),
            SinkProvider::Local => Self::local(&config.root, config.prefix.clone()),
        }
    }

    fn path_for(&self, key: &PageKey) -> StoragePath {
        if self.prefix.is_empty() {
            StoragePath::from(key.to_string())
        } else {
            StoragePath::from(format!("{}/{}", self.prefix, key))
        }
    }

    /// Read back an emitted page
    pub async fn load(&self, key: &PageKey) -> Result<Vec<Value>> {
        let path = self.path_for(key);

        let result = match self.store.get(&path).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(SinkError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let bytes = result.bytes().await?;

        bytes
            .split(|b| *b == b'\n')
            .filter(|line| !line.is_empty())
            .map(|line| serde_json::from_slice(line).map_err(SinkError::from))
            .collect()
    }

    /// Check if a page has been emitted
    pub async fn exists(&self, key: &PageKey) -> Result<bool> {
        match self.store.head(&self.path_for(key)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl RecordSink for ObjectStoreSink {
    async fn emit(&self, key: &PageKey, records: &[Value]) -> Result<()> {
        let mut data = Vec::new();
        for record in records {
            serde_json::to_writer(&mut data, record)?;
            data.push(b'\n');
        }

        let path = self.path_for(key);
        let size = data.len();
        self.store.put(&path, data.into()).await?;

        tracing::debug!(key = %path, records = records.len(), size, "Emitted page");
        Ok(())
    }
}
