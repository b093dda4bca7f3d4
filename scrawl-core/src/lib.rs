//! Core types for the scrawl replicated log.
//!
//! This crate provides the leaf building blocks shared by every other
//! crate: the hash-linked [`Block`], the application [`Payload`] variants,
//! the canonical content digest, and wall-clock helpers. Everything here is
//! pure data and pure functions; networking and chain policy live in
//! `scrawl-p2p` and `scrawl-chain`.

pub mod block;
pub mod hashing;
pub mod payload;
pub mod time;

// Re-export main types
pub use block::Block;
pub use payload::{ChatMessage, NoteDocument, Payload};
pub use time::now_millis;
