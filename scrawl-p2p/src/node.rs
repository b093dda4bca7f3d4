//! Replication node: event loop, protocol handler, gossip scheduler.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::time::interval;

use scrawl_chain::Ledger;
use scrawl_core::block::Block;
use scrawl_core::payload::{ChatMessage, NoteDocument, Payload};
use scrawl_core::time::now_millis;

use crate::config::P2pConfig;
use crate::connection::{self, ConnId, ConnectionEvent};
use crate::directory::PeerDirectory;
use crate::error::P2pResult;
use crate::protocol::{CmdAction, Message, Role};
use crate::registry::{ConnectionRegistry, ConnectionRole};

/// A locally submitted payload, with a channel for the resulting block.
///
/// Submissions from the RPC surface are funneled through this request so
/// block building happens on the event loop, never concurrently with other
/// chain mutation.
#[derive(Debug)]
pub struct SubmitRequest {
    pub payload: Payload,
    pub reply: oneshot::Sender<Block>,
}

/// Main replication node.
///
/// Owns the connection registry and peer directory outright, and is the
/// only writer of the shared ledger. [`P2pNode::run`] processes one event
/// (inbound message, timer tick, submission, accept, dial result, close)
/// at a time, so state transitions are atomic with respect to each other
/// without any locking discipline beyond the loop itself.
pub struct P2pNode {
    config: Arc<P2pConfig>,
    ledger: Arc<RwLock<Ledger>>,
    registry: ConnectionRegistry,
    directory: PeerDirectory,
    /// Submission channel receiver (taken by `run`).
    submit_rx: Option<mpsc::Receiver<SubmitRequest>>,
    /// Submission channel sender (for cloning out to the RPC surface).
    submit_tx: mpsc::Sender<SubmitRequest>,
    /// Shutdown signal receiver (taken by `run`).
    shutdown_rx: Option<mpsc::Receiver<()>>,
    /// Shutdown signal sender (for cloning).
    shutdown_tx: mpsc::Sender<()>,
    /// Channel to report the bound listen address once `run` starts.
    bound_addr_tx: Option<oneshot::Sender<SocketAddr>>,
}

impl P2pNode {
    /// Create a new replication node over a shared ledger.
    pub fn new(config: P2pConfig, ledger: Arc<RwLock<Ledger>>) -> Self {
        let (submit_tx, submit_rx) = mpsc::channel(32);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        Self {
            config: Arc::new(config),
            ledger,
            registry: ConnectionRegistry::new(),
            directory: PeerDirectory::new(),
            submit_rx: Some(submit_rx),
            submit_tx,
            shutdown_rx: Some(shutdown_rx),
            shutdown_tx,
            bound_addr_tx: None,
        }
    }

    /// Get a sender for local payload submissions.
    pub fn submit_sender(&self) -> mpsc::Sender<SubmitRequest> {
        self.submit_tx.clone()
    }

    /// Get the shutdown sender for external shutdown signals.
    pub fn shutdown_handle(&self) -> mpsc::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Get a oneshot receiver that will receive the bound address when the
    /// node starts. Useful for tests that bind port 0.
    pub fn bound_addr_receiver(&mut self) -> oneshot::Receiver<SocketAddr> {
        let (tx, rx) = oneshot::channel();
        self.bound_addr_tx = Some(tx);
        rx
    }

    /// Run the replication node.
    pub async fn run(mut self) -> P2pResult<()> {
        // The ledger must have a genesis before anything can append.
        self.ledger.write().await.initialize();

        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, self_url = %self.config.self_url, "Replication node listening");

        if let Some(tx) = self.bound_addr_tx.take() {
            let _ = tx.send(local_addr);
        }

        let (event_tx, mut event_rx) = mpsc::channel::<ConnectionEvent>(256);
        let mut submit_rx = self.submit_rx.take().expect("run called twice");
        let mut shutdown_rx = self.shutdown_rx.take().expect("run called twice");

        let mut gossip_timer = interval(self.config.gossip_interval);

        // Seed outbound connections from the bootstrap list.
        for url in self.config.bootstrap_peers.clone() {
            self.connect(url, &event_tx);
        }

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Replication node shutting down");
                    break;
                }

                Some(request) = submit_rx.recv() => {
                    self.handle_submission(request).await;
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if let Err(e) = stream.set_nodelay(true) {
                                tracing::warn!(error = %e, "Failed to set TCP_NODELAY");
                            }
                            let conn_id = self.registry.next_conn_id();
                            let command_tx = connection::spawn_connection(conn_id, stream, event_tx.clone());
                            self.registry.register(conn_id, command_tx);
                            tracing::debug!(conn = %conn_id, addr = %addr, "Accepted inbound connection");
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Accept error");
                        }
                    }
                }

                Some(event) = event_rx.recv() => {
                    self.handle_event(event, &event_tx).await;
                }

                _ = gossip_timer.tick() => {
                    self.gossip_tick(&event_tx);
                }
            }
        }

        Ok(())
    }

    /// Snapshot the current chain for a `chain` message.
    async fn chain_snapshot(&self) -> Vec<Block> {
        self.ledger.read().await.blocks().to_vec()
    }

    /// Handle an event from a connection task.
    async fn handle_event(&mut self, event: ConnectionEvent, event_tx: &mpsc::Sender<ConnectionEvent>) {
        match event {
            ConnectionEvent::Established { conn_id, url, command_tx } => {
                tracing::info!(conn = %conn_id, %url, "Outbound peer connected");
                self.registry.stop_connecting(&url);
                self.registry.register_peer(conn_id, command_tx, url.clone());
                self.directory.upsert(&url, now_millis());

                // Identify ourselves, then pull a full resync.
                let hello = Message::Hello {
                    role: Role::Peer,
                    url: Some(self.config.self_url.clone()),
                };
                let _ = self.registry.send_to(conn_id, hello);
                let _ = self.registry.send_to(conn_id, Message::RequestChain);
            }

            ConnectionEvent::ConnectFailed { url, error } => {
                // left to the next gossip tick's retry
                tracing::debug!(%url, error, "Outbound connection failed");
                self.registry.stop_connecting(&url);
            }

            ConnectionEvent::Inbound { conn_id, message } => {
                self.handle_message(conn_id, *message, event_tx).await;
            }

            ConnectionEvent::Closed { conn_id, reason } => {
                tracing::info!(conn = %conn_id, reason, "Connection closed");
                self.registry.remove(conn_id);
            }
        }
    }

    /// Interpret one inbound protocol message.
    async fn handle_message(
        &mut self,
        conn_id: ConnId,
        message: Message,
        event_tx: &mpsc::Sender<ConnectionEvent>,
    ) {
        tracing::trace!(conn = %conn_id, msg = %message, "Received message");

        match message {
            Message::Hello { role: Role::Observer, .. } => {
                self.registry.identify_observer(conn_id);
                let chain = self.chain_snapshot().await;
                let _ = self.registry.send_to(conn_id, Message::Chain { chain });
            }

            Message::Hello { role: Role::Peer, url } => {
                let Some(url) = url else {
                    tracing::warn!(conn = %conn_id, "Discarding peer hello without url");
                    return;
                };
                tracing::info!(conn = %conn_id, %url, "Peer identified");
                self.registry.identify_peer(conn_id, url.clone());
                self.directory.upsert(&url, now_millis());

                let chain = self.chain_snapshot().await;
                let _ = self.registry.send_to(conn_id, Message::Chain { chain });

                // Announce the newcomer network-wide.
                let peers = self.directory.known_urls();
                self.registry.broadcast_peers(Message::Peers { peers });
            }

            Message::Block { block } => {
                let appended = self.ledger.write().await.append_if_valid(block.clone());
                if appended {
                    tracing::debug!(index = block.index, hash = %block.hash, "Appended block");
                    self.registry.broadcast_except(Message::Block { block }, conn_id);
                } else {
                    // Sender is ahead of or diverged from us; pull a resync
                    // instead of silently dropping the block.
                    tracing::debug!(conn = %conn_id, index = block.index, "Block did not extend head, requesting chain");
                    let _ = self.registry.send_to(conn_id, Message::RequestChain);
                }
            }

            Message::Chain { chain } => {
                let replaced = self.ledger.write().await.replace_if_better(chain);
                if replaced {
                    // Converge stale peers on the new head.
                    let chain = self.chain_snapshot().await;
                    self.registry.broadcast(Message::Chain { chain });
                }
            }

            Message::RequestChain => {
                let chain = self.chain_snapshot().await;
                let _ = self.registry.send_to(conn_id, Message::Chain { chain });
            }

            Message::Peers { peers } => {
                if self.registry.role_of(conn_id) != Some(ConnectionRole::Peer) {
                    tracing::warn!(conn = %conn_id, "Discarding peers message from non-peer connection");
                    return;
                }
                for url in peers {
                    self.connect(url, event_tx);
                }
            }

            Message::Cmd { action, author, content, title, body } => {
                self.handle_cmd(conn_id, action, author, content, title, body).await;
            }
        }
    }

    /// Handle the observer submission shortcut.
    async fn handle_cmd(
        &mut self,
        conn_id: ConnId,
        action: CmdAction,
        author: Option<String>,
        content: Option<String>,
        title: Option<String>,
        body: Option<String>,
    ) {
        let now = now_millis();
        let payload = match action {
            CmdAction::SendMessage => {
                let Some(content) = content.filter(|c| !c.trim().is_empty()) else {
                    tracing::warn!(conn = %conn_id, "Discarding sendMessage cmd without content");
                    return;
                };
                let author = author
                    .filter(|a| !a.trim().is_empty())
                    .unwrap_or_else(|| "anonymous".to_string());
                Payload::Chat {
                    message: ChatMessage::new(author, content, now),
                }
            }
            CmdAction::AddNote => {
                let Some(title) = title.filter(|t| !t.trim().is_empty()) else {
                    tracing::warn!(conn = %conn_id, "Discarding addNote cmd without title");
                    return;
                };
                let Some(body) = body.filter(|b| !b.trim().is_empty()) else {
                    tracing::warn!(conn = %conn_id, "Discarding addNote cmd without body");
                    return;
                };
                Payload::Note {
                    note: NoteDocument::new(title, body, now),
                }
            }
        };

        self.append_and_flood(payload).await;
    }

    /// Handle a local submission from the RPC surface.
    async fn handle_submission(&mut self, request: SubmitRequest) {
        if let Some(block) = self.append_and_flood(request.payload).await {
            let _ = request.reply.send(block);
        }
        // on failure the dropped reply channel surfaces as an RPC error
    }

    /// Extend the ledger with `payload` and flood the block to all
    /// connections.
    async fn append_and_flood(&mut self, payload: Payload) -> Option<Block> {
        let result = self.ledger.write().await.extend(payload, now_millis());
        match result {
            Ok(block) => {
                tracing::info!(index = block.index, kind = block.payload.kind(), "Appended local block");
                self.registry.broadcast(Message::Block { block: block.clone() });
                Some(block)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to extend ledger");
                None
            }
        }
    }

    /// Open an outbound peer connection unless it would be redundant.
    ///
    /// Idempotent: self urls, urls with a live peer connection, and urls
    /// with a dial already in flight are all skipped.
    fn connect(&mut self, url: String, event_tx: &mpsc::Sender<ConnectionEvent>) {
        if url == self.config.self_url {
            return;
        }
        if self.registry.has_peer(&url) || self.registry.is_connecting(&url) {
            return;
        }

        let conn_id = self.registry.next_conn_id();
        self.registry.start_connecting(url.clone());
        tracing::debug!(conn = %conn_id, %url, "Dialing peer");
        connection::spawn_outbound(conn_id, url, self.config.connect_timeout, event_tx.clone());
    }

    /// One gossip tick: broadcast the known peer list and retry
    /// disconnected peers.
    ///
    /// Every known url without a live connection is retried each tick, with
    /// no backoff and no cap; the directory is never pruned.
    fn gossip_tick(&mut self, event_tx: &mpsc::Sender<ConnectionEvent>) {
        let urls = self.directory.known_urls();
        if urls.is_empty() {
            return;
        }

        self.registry.broadcast_peers(Message::Peers { peers: urls.clone() });

        for url in urls {
            if !self.registry.has_peer(&url) {
                self.connect(url, event_tx);
            }
        }
    }
}
