//! Block and chain linkage validation.

use scrawl_core::block::Block;

/// Check that `block` is a valid direct successor of `prev`.
///
/// Requires index continuity, prev-hash linkage, and a stored hash equal to
/// the recomputed digest over the block's fields.
pub fn is_valid_successor(block: &Block, prev: &Block) -> bool {
    block.index == prev.index + 1 && block.prev_hash == prev.hash && block.hash_is_valid()
}

/// Check whole-chain continuity.
///
/// True iff the chain is non-empty and every adjacent pair passes
/// [`is_valid_successor`]. The genesis block is not re-validated against a
/// predecessor; chains are only ever compared when their genesis hashes
/// already match.
pub fn is_valid_chain(chain: &[Block]) -> bool {
    !chain.is_empty() && chain.windows(2).all(|pair| is_valid_successor(&pair[1], &pair[0]))
}
