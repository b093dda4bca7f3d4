//! P2P error types.

use std::io;
use thiserror::Error;

/// P2P-specific errors.
#[derive(Debug, Error)]
pub enum P2pError {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Message exceeds maximum allowed size.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// Failed to serialize an outbound message.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Outbound connection attempt timed out.
    #[error("Connect timeout to {url}")]
    ConnectTimeout { url: String },

    /// A channel to a connection task or the event loop is closed.
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    /// No live connection with the given id.
    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),
}

/// Result type for P2P operations.
pub type P2pResult<T> = Result<T, P2pError>;
