//! Wire protocol: message envelopes and framing.

pub mod framing;
pub mod messages;

// Re-export main types
pub use framing::LineCodec;
pub use messages::{CmdAction, Message, Role};
