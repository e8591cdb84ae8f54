use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::result::AbortReason;

/// Source-specific fields of an invocation
pub type SourceParams = Map<String, Value>;

/// Field naming the fetcher variant
pub const HARVEST_TYPE_FIELD: &str = "harvest_type";
/// Reserved field carrying chain identity
pub const CHAIN_FIELD: &str = "chain";

/// Identity of one bounded execution within its continuation chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainInfo {
    pub id: Uuid,
    /// Zero-based execution index
    pub link: u32,
}

impl ChainInfo {
    /// Identity for the first execution of a fresh harvest
    pub fn start() -> Self {
        Self {
            id: Uuid::now_v7(),
            link: 0,
        }
    }

    /// Identity for the successor execution; saturates at `u32::MAX`
    pub fn next(&self) -> Self {
        Self {
            id: self.id,
            link: self.link.saturating_add(1),
        }
    }
}

/// Whether a decoded payload starts a harvest or continues one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Request,
    Resumption,
}

/// Wire form accepted by the entry point
///
/// Initial requests and resumptions share this shape: a resumption is a
/// request whose params already carry exported progress and whose `chain`
/// link is past zero. The tag is kept as raw JSON so a non-string tag still
/// decodes and is rejected as an unknown harvest type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub harvest_type: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<ChainInfo>,
    #[serde(flatten)]
    pub params: SourceParams,
}

impl InvocationPayload {
    pub fn new(harvest_type: impl Into<String>, params: SourceParams) -> Self {
        Self {
            harvest_type: Some(Value::String(harvest_type.into())),
            chain: None,
            params,
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn kind(&self) -> PayloadKind {
        match self.chain {
            Some(chain) if chain.link > 0 => PayloadKind::Resumption,
            _ => PayloadKind::Request,
        }
    }

    /// Harvest type, treating an empty or non-string tag as absent
    pub fn harvest_type(&self) -> Option<&str> {
        self.harvest_type
            .as_ref()
            .and_then(Value::as_str)
            .filter(|t| !t.trim().is_empty())
    }

    /// Promote to a request
    ///
    /// Fails with the reason the chain must stop when the tag is absent,
    /// blank or not a string.
    pub fn into_request(self) -> Result<HarvestRequest, AbortReason> {
        let harvest_type = match self.harvest_type {
            None | Some(Value::Null) => return Err(AbortReason::MissingHarvestType),
            Some(Value::String(tag)) if tag.trim().is_empty() => {
                return Err(AbortReason::MissingHarvestType);
            }
            Some(Value::String(tag)) => tag,
            Some(other) => {
                return Err(AbortReason::UnknownHarvestType {
                    harvest_type: other.to_string(),
                });
            }
        };
        Ok(HarvestRequest {
            harvest_type,
            chain: self.chain.unwrap_or_else(ChainInfo::start),
            params: self.params,
        })
    }
}

/// Decoded harvest request, immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestRequest {
    harvest_type: String,
    chain: ChainInfo,
    params: SourceParams,
}

impl HarvestRequest {
    pub fn new(harvest_type: impl Into<String>, params: SourceParams) -> Self {
        Self {
            harvest_type: harvest_type.into(),
            chain: ChainInfo::start(),
            params,
        }
    }

    pub fn with_chain(mut self, chain: ChainInfo) -> Self {
        self.chain = chain;
        self
    }

    pub fn harvest_type(&self) -> &str {
        &self.harvest_type
    }

    pub fn chain(&self) -> ChainInfo {
        self.chain
    }

    pub fn params(&self) -> &SourceParams {
        &self.params
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    /// Copy of this request with `defaults` filled in under the existing params
    pub fn with_defaults(&self, defaults: &SourceParams) -> Self {
        let mut params = defaults.clone();
        params.extend(self.params.clone());
        Self {
            harvest_type: self.harvest_type.clone(),
            chain: self.chain,
            params,
        }
    }
}

/// Self-describing progress exported by a fetcher
///
/// Holds every field the matching fetcher variant needs to resume: its
/// original source params plus whatever cursor state it tracks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressSnapshot(SourceParams);

impl ProgressSnapshot {
    pub fn new(params: SourceParams) -> Self {
        Self(params)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn params(&self) -> &SourceParams {
        &self.0
    }

    pub fn into_params(self) -> SourceParams {
        self.0
    }
}

/// Payload handed from one bounded execution to its successor
#[derive(Debug, Clone, PartialEq)]
pub struct ResumptionPayload {
    pub harvest_type: String,
    pub chain: ChainInfo,
    pub progress: ProgressSnapshot,
}

impl ResumptionPayload {
    /// Build the successor payload for the execution identified by `current`
    pub fn new(harvest_type: impl Into<String>, current: ChainInfo, progress: ProgressSnapshot) -> Self {
        Self {
            harvest_type: harvest_type.into(),
            chain: current.next(),
            progress,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        InvocationPayload::from(self.clone()).encode()
    }
}

impl From<ResumptionPayload> for InvocationPayload {
    fn from(payload: ResumptionPayload) -> Self {
        let mut params = payload.progress.into_params();
        params.remove(HARVEST_TYPE_FIELD);
        params.remove(CHAIN_FIELD);

        Self {
            harvest_type: Some(Value::String(payload.harvest_type)),
            chain: Some(payload.chain),
            params,
        }
    }
}
