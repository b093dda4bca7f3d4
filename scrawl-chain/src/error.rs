//! Chain error types.

use thiserror::Error;

/// Chain-specific errors.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The ledger has no genesis block yet.
    #[error("Ledger not initialized")]
    NotInitialized,
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;
