//! Key layout for the ledger partitions
//!
//! - `chains`: chain:{chain_id} -> ChainRecord (JSON)
//! - `links`: link:{chain_id}:{link:010} -> LinkRecord (JSON)

use uuid::Uuid;

/// Encode a chain key: chain:{chain_id}
pub fn encode_chain_key(chain_id: &Uuid) -> Vec<u8> {
    format!("chain:{}", chain_id).into_bytes()
}

/// Encode a link key: link:{chain_id}:{link:010}
pub fn encode_link_key(chain_id: &Uuid, link: u32) -> Vec<u8> {
    format!("link:{}:{:010}", chain_id, link).into_bytes()
}

/// Encode a link prefix for range scan: link:{chain_id}:
pub fn encode_link_prefix(chain_id: &Uuid) -> Vec<u8> {
    format!("link:{}:", chain_id).into_bytes()
}

/// Decode a link key: link:{chain_id}:{link:010} -> (chain_id, link)
pub fn decode_link_key(key: &[u8]) -> Option<(Uuid, u32)> {
    let key_str = std::str::from_utf8(key).ok()?;
    let (chain_id, link) = key_str.strip_prefix("link:")?.split_once(':')?;
    Some((Uuid::parse_str(chain_id).ok()?, link.parse().ok()?))
}
