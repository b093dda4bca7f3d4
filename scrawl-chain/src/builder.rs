//! Successor block construction.

use scrawl_core::block::Block;
use scrawl_core::payload::Payload;

/// Build the block that extends `head` with `payload`.
///
/// The caller must hold exclusive access to the chain head for the duration
/// of build-and-append; in this system that is guaranteed by funneling all
/// mutation through the single node event loop.
pub fn next_block(head: &Block, payload: Payload, timestamp_ms: u64) -> Block {
    Block::new(head.index + 1, head.hash.clone(), timestamp_ms, payload)
}
