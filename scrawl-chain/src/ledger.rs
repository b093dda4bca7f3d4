//! The ledger: exclusive owner of the in-memory block sequence.

use scrawl_core::block::Block;
use scrawl_core::payload::Payload;
use scrawl_core::time::now_millis;

use crate::builder::next_block;
use crate::error::{ChainError, ChainResult};
use crate::genesis::genesis_block;
use crate::validation::{is_valid_chain, is_valid_successor};

/// Exclusive owner of the chain.
///
/// Every mutation is all-or-nothing: a rejected append or replacement
/// leaves the chain untouched. Callers read the chain by reference and
/// submit mutations through these methods; nothing else holds `&mut` access
/// to the block vector.
#[derive(Debug, Default)]
pub struct Ledger {
    blocks: Vec<Block>,
}

impl Ledger {
    /// Create an empty, uninitialized ledger.
    pub fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    /// Synthesize the genesis block at the current wall-clock time.
    ///
    /// Idempotent: a no-op when the chain is already non-empty.
    pub fn initialize(&mut self) {
        self.initialize_at(now_millis());
    }

    /// Synthesize the genesis block at a caller-chosen timestamp.
    ///
    /// Processes that should reconcile must share a genesis hash, so
    /// coordinated deployments and tests seed every ledger with the same
    /// timestamp. Idempotent like [`initialize`](Self::initialize).
    pub fn initialize_at(&mut self, timestamp_ms: u64) {
        if self.blocks.is_empty() {
            let genesis = genesis_block(timestamp_ms);
            tracing::info!(hash = %genesis.hash, "Ledger initialized with genesis block");
            self.blocks.push(genesis);
        }
    }

    /// The genesis block, if initialized.
    pub fn genesis(&self) -> Option<&Block> {
        self.blocks.first()
    }

    /// The last block, if initialized.
    pub fn head(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// Chain length.
    pub fn height(&self) -> u64 {
        self.blocks.len() as u64
    }

    /// The full chain, oldest first.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Append `candidate` if it is a valid successor of the current head.
    ///
    /// Returns whether the append happened; a rejected candidate causes no
    /// mutation.
    pub fn append_if_valid(&mut self, candidate: Block) -> bool {
        let Some(head) = self.blocks.last() else {
            return false;
        };
        if !is_valid_successor(&candidate, head) {
            return false;
        }
        self.blocks.push(candidate);
        true
    }

    /// Replace the chain wholesale if `candidate` wins the longest-chain rule.
    ///
    /// Accepts only a strictly longer chain that shares this ledger's
    /// genesis hash and passes the full sequential-linkage check. Chains
    /// with different origins never merge. Returns whether replacement
    /// occurred.
    pub fn replace_if_better(&mut self, candidate: Vec<Block>) -> bool {
        let Some(genesis) = self.blocks.first() else {
            return false;
        };
        if candidate.len() as u64 <= self.height() {
            return false;
        }
        match candidate.first() {
            Some(first) if first.hash == genesis.hash => {}
            _ => return false,
        }
        if !is_valid_chain(&candidate) {
            return false;
        }

        tracing::info!(
            old_height = self.height(),
            new_height = candidate.len(),
            "Replacing chain with longer fork"
        );
        self.blocks = candidate;
        true
    }

    /// Build and append the block extending the current head with `payload`.
    ///
    /// This is the local submission path; remote candidates go through
    /// [`append_if_valid`](Self::append_if_valid) instead.
    pub fn extend(&mut self, payload: Payload, timestamp_ms: u64) -> ChainResult<Block> {
        let head = self.blocks.last().ok_or(ChainError::NotInitialized)?;
        let block = next_block(head, payload, timestamp_ms);
        self.blocks.push(block.clone());
        Ok(block)
    }
}
