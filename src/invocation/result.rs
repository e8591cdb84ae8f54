use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Why a chain stopped without completing its harvest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbortReason {
    MissingHarvestType,
    UnknownHarvestType { harvest_type: String },
    ChainLimitReached { max_links: u32 },
    DispatchFailed { message: String },
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::MissingHarvestType => write!(f, "missing harvest type"),
            AbortReason::UnknownHarvestType { harvest_type } => {
                write!(f, "bad harvest type: {}", harvest_type)
            }
            AbortReason::ChainLimitReached { max_links } => {
                write!(f, "chain limit of {} executions reached", max_links)
            }
            AbortReason::DispatchFailed { message } => {
                write!(f, "continuation dispatch failed: {}", message)
            }
        }
    }
}

/// State of a logical harvest as seen by the invocation that returns it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChainOutcome {
    /// Harvest finished; `links` counts every execution in the chain
    Completed { chain_id: Uuid, links: u32 },
    /// A successor execution was handed off and runs elsewhere
    Continuing { chain_id: Uuid, next_link: u32 },
    Aborted {
        chain_id: Option<Uuid>,
        reason: AbortReason,
    },
}

impl ChainOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChainOutcome::Continuing { .. })
    }

    pub fn chain_id(&self) -> Option<Uuid> {
        match self {
            ChainOutcome::Completed { chain_id, .. } => Some(*chain_id),
            ChainOutcome::Continuing { chain_id, .. } => Some(*chain_id),
            ChainOutcome::Aborted { chain_id, .. } => *chain_id,
        }
    }
}

impl fmt::Display for ChainOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainOutcome::Completed { chain_id, links } => {
                write!(f, "harvest {} completed after {} execution(s)", chain_id, links)
            }
            ChainOutcome::Continuing { chain_id, next_link } => {
                write!(f, "harvest {} continuing in execution {}", chain_id, next_link)
            }
            ChainOutcome::Aborted { chain_id: Some(id), reason } => {
                write!(f, "harvest {} aborted: {}", id, reason)
            }
            ChainOutcome::Aborted { chain_id: None, reason } => {
                write!(f, "harvest aborted: {}", reason)
            }
        }
    }
}

/// Value returned to the invoking platform
///
/// Serializes as `{"statusCode": 200, "body": "..."}`. The outcome travels
/// alongside for in-process callers and is not part of the wire form.
#[derive(Debug, Clone, Serialize)]
pub struct HandlerResult {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
    #[serde(skip)]
    pub outcome: ChainOutcome,
}

impl HandlerResult {
    pub fn success(outcome: ChainOutcome) -> Self {
        Self {
            status_code: 200,
            body: outcome.to_string(),
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_handler_result_wire_shape() {
        let chain_id = Uuid::now_v7();
        let result = HandlerResult::success(ChainOutcome::Completed { chain_id, links: 3 });

        let wire: Value = serde_json::to_value(&result).unwrap();
        assert_eq!(wire["statusCode"], 200);
        assert!(wire["body"].as_str().unwrap().contains("3 execution(s)"));
        assert!(wire.get("outcome").is_none());
        assert_eq!(wire.as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = ChainOutcome::Aborted {
            chain_id: None,
            reason: AbortReason::UnknownHarvestType {
                harvest_type: "bogus".to_string(),
            },
        };

        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            value,
            json!({
                "state": "aborted",
                "chain_id": null,
                "reason": {"kind": "unknown_harvest_type", "harvest_type": "bogus"}
            })
        );
        assert!(outcome.is_terminal());
        assert_eq!(outcome.to_string(), "harvest aborted: bad harvest type: bogus");
    }

    #[test]
    fn test_continuing_is_not_terminal() {
        let outcome = ChainOutcome::Continuing {
            chain_id: Uuid::now_v7(),
            next_link: 1,
        };
        assert!(!outcome.is_terminal());
        assert!(outcome.chain_id().is_some());
    }
}
