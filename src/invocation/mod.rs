//! Invocation payloads and handler results
//!
//! Both shapes the entry point accepts (fresh harvest requests and
//! resumptions) decode through [`InvocationPayload`]. A resumption is the same
//! JSON object with the fetcher's exported progress merged into its fields and
//! a `chain` marker identifying the execution.
//!
//! ```json
//! { "harvest_type": "nuxeo", "collection_id": "466" }
//! { "harvest_type": "nuxeo", "collection_id": "466",
//!   "progress": { "cursor": "2", "page": 2, "emitted": 200, "exhausted": false },
//!   "chain": { "id": "0192...", "link": 1 } }
//! ```

mod result;
mod types;

pub use result::{AbortReason, ChainOutcome, HandlerResult};
pub use types::{
    CHAIN_FIELD, ChainInfo, HARVEST_TYPE_FIELD, HarvestRequest, InvocationPayload, PayloadKind,
    ProgressSnapshot, ResumptionPayload, SourceParams,
};
