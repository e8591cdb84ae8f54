/// Fjall-backed ledger of continuation chains
///
/// Each bounded execution reports how it ended; the ledger folds those
/// reports into one [`ChainRecord`] per chain and keeps the per-link history.
///
/// ## Partitions
///
/// - `chains`: latest record per chain id
/// - `links`: one entry per executed link, scanned by chain prefix
///
/// ## Usage
///
/// ```rust,ignore
/// use harvestrelay::ledger::{ChainLedger, ChainState};
///
/// let ledger = ChainLedger::open("data/ledger")?;
/// ledger.record_link(chain_id, "nuxeo", 0, ChainState::Continuing, None)?;
/// let record = ledger.get(&chain_id)?;
/// ```

pub mod error;
pub mod partitions;
pub mod store;

pub use error::{LedgerError, Result};
pub use store::{ChainHistory, ChainLedger, ChainRecord, ChainState, LinkRecord};
