use std::path::Path;

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info};
use uuid::Uuid;

use super::error::{LedgerError, Result};
use super::partitions::{decode_link_key, encode_chain_key, encode_link_key, encode_link_prefix};

/// Where a chain stands after its most recent execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainState {
    Running,
    Continuing,
    Completed,
    Aborted,
    Failed,
}

impl ChainState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChainState::Completed | ChainState::Aborted | ChainState::Failed
        )
    }
}

/// Latest view of one continuation chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainRecord {
    pub chain_id: Uuid,
    pub harvest_type: String,
    /// Executions recorded so far
    pub links: u32,
    pub state: ChainState,
    pub detail: Option<String>,
    pub started_at: String,
    pub updated_at: String,
}

/// One execution within a chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub link: u32,
    pub state: ChainState,
    pub detail: Option<String>,
    pub recorded_at: String,
}

/// Chain record together with its per-link history
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainHistory {
    #[serde(flatten)]
    pub record: ChainRecord,
    pub history: Vec<LinkRecord>,
}

/// Fjall-backed record of continuation chains
#[derive(Clone)]
pub struct ChainLedger {
    keyspace: Keyspace,
    chains: PartitionHandle,
    links: PartitionHandle,
}

impl ChainLedger {
    /// Open or create a ledger at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening chain ledger at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let chains = keyspace.open_partition("chains", PartitionCreateOptions::default())?;
        let links = keyspace.open_partition("links", PartitionCreateOptions::default())?;

        Ok(Self {
            keyspace,
            chains,
            links,
        })
    }

    /// Record the state of execution `link` and fold it into the chain record
    pub fn record_link(
        &self,
        chain_id: Uuid,
        harvest_type: &str,
        link: u32,
        state: ChainState,
        detail: Option<String>,
    ) -> Result<ChainRecord> {
        let now = now_rfc3339()?;
        let executed = link.saturating_add(1);

        let entry = LinkRecord {
            link,
            state,
            detail: detail.clone(),
            recorded_at: now.clone(),
        };
        self.links.insert(
            encode_link_key(&chain_id, link),
            serde_json::to_vec(&entry)?,
        )?;

        let record = match self.get(&chain_id)? {
            Some(existing) => ChainRecord {
                links: existing.links.max(executed),
                state,
                detail,
                updated_at: now,
                ..existing
            },
            None => ChainRecord {
                chain_id,
                harvest_type: harvest_type.to_string(),
                links: executed,
                state,
                detail,
                started_at: now.clone(),
                updated_at: now,
            },
        };
        self.chains
            .insert(encode_chain_key(&chain_id), serde_json::to_vec(&record)?)?;

        debug!(%chain_id, link, state = ?state, "Recorded chain link");
        Ok(record)
    }

    pub fn get(&self, chain_id: &Uuid) -> Result<Option<ChainRecord>> {
        match self.chains.get(encode_chain_key(chain_id))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// Every recorded execution of a chain, ordered by link
    pub fn links(&self, chain_id: &Uuid) -> Result<Vec<LinkRecord>> {
        let mut links = Vec::new();
        for item in self.links.prefix(encode_link_prefix(chain_id)) {
            let (key, value) = item?;
            if decode_link_key(&key).is_none() {
                continue;
            }
            links.push(serde_json::from_slice(&value)?);
        }
        Ok(links)
    }

    pub fn history(&self, chain_id: &Uuid) -> Result<Option<ChainHistory>> {
        let Some(record) = self.get(chain_id)? else {
            return Ok(None);
        };
        Ok(Some(ChainHistory {
            record,
            history: self.links(chain_id)?,
        }))
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|e| LedgerError::Timestamp(e.to_string()))
}
