//! Hash-linked log entries.

use serde::{Deserialize, Serialize};

use crate::hashing::sha256_hex;
use crate::payload::Payload;

/// Sentinel previous-hash carried by the genesis block.
pub const GENESIS_PREV_HASH: &str = "0";

/// A single immutable entry in the replicated log.
///
/// The block hash is computed over `{index, prev_hash, timestamp, payload}`
/// with the hash field itself excluded, so recomputing the digest over a
/// stored block must reproduce `hash` exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain (0 for genesis).
    pub index: u64,
    /// Hex hash of the previous block, or `"0"` for genesis.
    pub prev_hash: String,
    /// Unix timestamp in milliseconds.
    pub timestamp: u64,
    /// The application event this block carries.
    pub payload: Payload,
    /// Hex SHA-256 digest of the other four fields.
    pub hash: String,
}

/// Compute the canonical content digest for a block's fields.
///
/// The digest feeds the little-endian index and timestamp bytes, the UTF-8
/// previous hash, and the canonical JSON serialization of the payload into
/// SHA-256. It is deterministic across processes for identical field values.
pub fn block_digest(index: u64, prev_hash: &str, timestamp: u64, payload: &Payload) -> String {
    let payload_bytes =
        serde_json::to_vec(payload).expect("payload serialization should not fail");
    sha256_hex(&[
        &index.to_le_bytes(),
        prev_hash.as_bytes(),
        &timestamp.to_le_bytes(),
        &payload_bytes,
    ])
}

impl Block {
    /// Assemble a block, computing its hash from the given fields.
    pub fn new(index: u64, prev_hash: String, timestamp: u64, payload: Payload) -> Self {
        let hash = block_digest(index, &prev_hash, timestamp, &payload);
        Self {
            index,
            prev_hash,
            timestamp,
            payload,
            hash,
        }
    }

    /// Recompute the digest over this block's fields (hash excluded).
    pub fn compute_hash(&self) -> String {
        block_digest(self.index, &self.prev_hash, self.timestamp, &self.payload)
    }

    /// Check whether the stored hash matches the recomputed digest.
    pub fn hash_is_valid(&self) -> bool {
        self.hash == self.compute_hash()
    }

    /// Check if this is a genesis block.
    #[inline]
    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.prev_hash == GENESIS_PREV_HASH
    }
}
