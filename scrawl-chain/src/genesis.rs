//! Genesis block synthesis.

use scrawl_core::block::{Block, GENESIS_PREV_HASH};
use scrawl_core::payload::{ChatMessage, Payload};

/// Create the genesis block for a chain initialized at `timestamp_ms`.
///
/// The payload is a fixed sentinel; two chains share a genesis hash only if
/// they were initialized at the same timestamp. Chains with different
/// genesis hashes never merge.
pub fn genesis_block(timestamp_ms: u64) -> Block {
    let payload = Payload::Chat {
        message: ChatMessage {
            id: "genesis".to_string(),
            author: "system".to_string(),
            content: "genesis".to_string(),
            timestamp: 0,
        },
    };
    Block::new(0, GENESIS_PREV_HASH.to_string(), timestamp_ms, payload)
}
