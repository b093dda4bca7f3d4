//! Replication protocol messages.
//!
//! One JSON envelope per message; the `type` field selects the variant.
//! The protocol is symmetric: apart from `hello` and `cmd`, every message
//! may flow in either direction on a connection.

use serde::{Deserialize, Serialize};

use scrawl_core::block::Block;

/// Role a connection announces in its `hello`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// An end-user-facing client; receives the chain but is not gossiped to.
    Observer,
    /// Another replicating server, identified by its advertised url.
    Peer,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Observer => write!(f, "observer"),
            Role::Peer => write!(f, "peer"),
        }
    }
}

/// Observer submission shortcut actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CmdAction {
    /// Append a chat message.
    SendMessage,
    /// Append a note snapshot.
    AddNote,
}

/// All replication protocol messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Connection identification; first message on a connection.
    Hello {
        role: Role,
        /// Advertised url; required when `role` is `peer`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },

    /// Propose a single block append.
    Block { block: Block },

    /// Full chain snapshot / replacement offer.
    Chain { chain: Vec<Block> },

    /// Ask the remote side for its full chain.
    RequestChain,

    /// Gossiped list of known peer urls.
    Peers { peers: Vec<String> },

    /// Observer-originated submission shortcut.
    Cmd {
        action: CmdAction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        author: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<String>,
    },
}

impl Message {
    /// Get a human-readable name for the message type.
    pub fn name(&self) -> &'static str {
        match self {
            Message::Hello { .. } => "hello",
            Message::Block { .. } => "block",
            Message::Chain { .. } => "chain",
            Message::RequestChain => "request_chain",
            Message::Peers { .. } => "peers",
            Message::Cmd { .. } => "cmd",
        }
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::Hello { role, url } => {
                write!(f, "Hello(role={}, url={:?})", role, url)
            }
            Message::Block { block } => write!(f, "Block(index={})", block.index),
            Message::Chain { chain } => write!(f, "Chain(len={})", chain.len()),
            Message::RequestChain => write!(f, "RequestChain"),
            Message::Peers { peers } => write!(f, "Peers(count={})", peers.len()),
            Message::Cmd { action, .. } => write!(f, "Cmd(action={:?})", action),
        }
    }
}
