//! Chain state for the scrawl replicated log.
//!
//! This crate owns the in-memory block sequence and the rules that guard
//! it: genesis synthesis, successor building, linkage validation, and the
//! longest-chain replacement heuristic used to reconcile forks. All chain
//! mutation goes through [`Ledger`]; callers never edit the block vector
//! directly.

pub mod builder;
pub mod error;
pub mod genesis;
pub mod ledger;
pub mod validation;

// Re-export main types
pub use builder::next_block;
pub use error::{ChainError, ChainResult};
pub use genesis::genesis_block;
pub use ledger::Ledger;
pub use validation::{is_valid_chain, is_valid_successor};
