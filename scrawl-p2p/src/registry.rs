//! Live connection registry.
//!
//! Tracks every open connection's command channel and role, plus the
//! reverse index from peer url to connection. The forward and reverse maps
//! are private to this type and updated together on identify/close, so they
//! cannot drift apart. Also tracks in-flight outbound dials so the gossip
//! scheduler does not stack duplicate attempts.

use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc;

use crate::connection::{ConnId, ConnectionCommand};
use crate::error::{P2pError, P2pResult};
use crate::protocol::Message;

/// Role state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionRole {
    /// No hello received yet.
    Unidentified,
    /// An end-user client.
    Observer,
    /// Another replicating server.
    Peer,
}

/// Per-connection bookkeeping.
#[derive(Debug)]
struct ConnectionHandle {
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    role: ConnectionRole,
    /// Advertised url; set only for peer-role connections.
    url: Option<String>,
}

/// Registry of live connections, owned by the node event loop.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnId, ConnectionHandle>,
    /// Reverse index: peer url -> connection carrying it.
    peer_urls: HashMap<String, ConnId>,
    /// Urls with an outbound dial in flight.
    connecting: HashSet<String>,
    next_conn_id: u64,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new connection ID.
    pub fn next_conn_id(&mut self) -> ConnId {
        self.next_conn_id += 1;
        ConnId(self.next_conn_id)
    }

    /// Register a freshly accepted connection as unidentified.
    pub fn register(&mut self, conn_id: ConnId, command_tx: mpsc::UnboundedSender<ConnectionCommand>) {
        self.connections.insert(
            conn_id,
            ConnectionHandle {
                command_tx,
                role: ConnectionRole::Unidentified,
                url: None,
            },
        );
    }

    /// Register an established outbound connection directly as a peer.
    pub fn register_peer(
        &mut self,
        conn_id: ConnId,
        command_tx: mpsc::UnboundedSender<ConnectionCommand>,
        url: String,
    ) {
        self.connections.insert(
            conn_id,
            ConnectionHandle {
                command_tx,
                role: ConnectionRole::Peer,
                url: Some(url.clone()),
            },
        );
        self.peer_urls.insert(url, conn_id);
    }

    /// Mark a connection as an observer.
    pub fn identify_observer(&mut self, conn_id: ConnId) {
        if let Some(handle) = self.connections.get_mut(&conn_id) {
            handle.role = ConnectionRole::Observer;
        }
    }

    /// Mark a connection as a peer advertising `url`.
    pub fn identify_peer(&mut self, conn_id: ConnId, url: String) {
        if let Some(handle) = self.connections.get_mut(&conn_id) {
            handle.role = ConnectionRole::Peer;
            handle.url = Some(url.clone());
            self.peer_urls.insert(url, conn_id);
        }
    }

    /// Remove a closed connection from every index.
    pub fn remove(&mut self, conn_id: ConnId) {
        if let Some(handle) = self.connections.remove(&conn_id) {
            if let Some(url) = handle.url {
                // only drop the mapping if it still points at this connection
                if self.peer_urls.get(&url) == Some(&conn_id) {
                    self.peer_urls.remove(&url);
                }
            }
        }
    }

    /// The role of a connection, if live.
    pub fn role_of(&self, conn_id: ConnId) -> Option<ConnectionRole> {
        self.connections.get(&conn_id).map(|h| h.role)
    }

    /// Whether a live peer connection advertises `url`.
    pub fn has_peer(&self, url: &str) -> bool {
        self.peer_urls.contains_key(url)
    }

    /// Whether an outbound dial to `url` is in flight.
    pub fn is_connecting(&self, url: &str) -> bool {
        self.connecting.contains(url)
    }

    /// Mark a dial as in flight.
    pub fn start_connecting(&mut self, url: String) {
        self.connecting.insert(url);
    }

    /// Clear a dial's in-flight mark.
    pub fn stop_connecting(&mut self, url: &str) {
        self.connecting.remove(url);
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether there are no live connections.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Urls of all live peer connections.
    pub fn peer_urls(&self) -> Vec<String> {
        self.peer_urls.keys().cloned().collect()
    }

    /// Send a message to one connection.
    ///
    /// Uses the unbounded command channel, so this never blocks the event
    /// loop.
    pub fn send_to(&self, conn_id: ConnId, message: Message) -> P2pResult<()> {
        let handle = self
            .connections
            .get(&conn_id)
            .ok_or_else(|| P2pError::ConnectionNotFound(conn_id.to_string()))?;

        handle
            .command_tx
            .send(ConnectionCommand::Send(message))
            .map_err(|_| P2pError::ChannelClosed("connection command channel".to_string()))
    }

    /// Send a message to every live connection.
    pub fn broadcast(&self, message: Message) {
        for (conn_id, handle) in &self.connections {
            if let Err(e) = handle.command_tx.send(ConnectionCommand::Send(message.clone())) {
                tracing::debug!(conn = %conn_id, error = %e, "Failed to broadcast to connection");
            }
        }
    }

    /// Send a message to every live connection except one.
    pub fn broadcast_except(&self, message: Message, exclude: ConnId) {
        for (conn_id, handle) in &self.connections {
            if *conn_id != exclude {
                if let Err(e) = handle.command_tx.send(ConnectionCommand::Send(message.clone())) {
                    tracing::debug!(conn = %conn_id, error = %e, "Failed to broadcast to connection");
                }
            }
        }
    }

    /// Send a message to every peer-role connection.
    pub fn broadcast_peers(&self, message: Message) {
        for (conn_id, handle) in &self.connections {
            if handle.role == ConnectionRole::Peer {
                if let Err(e) = handle.command_tx.send(ConnectionCommand::Send(message.clone())) {
                    tracing::debug!(conn = %conn_id, error = %e, "Failed to broadcast to peer");
                }
            }
        }
    }
}
