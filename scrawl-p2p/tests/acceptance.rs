//! Acceptance tests for the replication layer.
//!
//! These exercise real TCP connections against running nodes:
//! observer/peer identification, block flooding, chain resync and
//! longest-chain replacement, peer gossip, self-connection suppression,
//! and gossip-driven reconnection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::time::{sleep, timeout};
use tokio_util::codec::Framed;

use scrawl_chain::Ledger;
use scrawl_core::payload::{ChatMessage, Payload};
use scrawl_p2p::{LineCodec, Message, P2pConfig, P2pNode, Role, SubmitRequest};

/// Shared genesis timestamp so every test ledger agrees on genesis.
const GENESIS_TS: u64 = 1_700_000_000_000;

/// Timeout for reading one message from a test connection.
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

type TestConn = Framed<TcpStream, LineCodec>;

fn chat(content: &str) -> Payload {
    Payload::Chat {
        message: ChatMessage::new("alice", content, GENESIS_TS),
    }
}

/// Create a ledger seeded with the shared genesis and `extra` extra blocks.
fn seeded_ledger(extra: usize) -> Arc<RwLock<Ledger>> {
    let mut ledger = Ledger::new();
    ledger.initialize_at(GENESIS_TS);
    for i in 0..extra {
        ledger
            .extend(chat(&format!("seed-{i}")), GENESIS_TS + 1 + i as u64)
            .unwrap();
    }
    Arc::new(RwLock::new(ledger))
}

struct TestNode {
    addr: SocketAddr,
    ledger: Arc<RwLock<Ledger>>,
    submit_tx: mpsc::Sender<SubmitRequest>,
    shutdown_tx: mpsc::Sender<()>,
}

/// Start a node on port 0 and wait for its bound address.
async fn start_node(
    ledger: Arc<RwLock<Ledger>>,
    self_url: impl Into<String>,
    bootstrap: Vec<String>,
    gossip_interval: Duration,
) -> TestNode {
    let config = P2pConfig::new("127.0.0.1:0".parse().unwrap(), self_url)
        .with_bootstrap_peers(bootstrap)
        .with_gossip_interval(gossip_interval)
        .with_connect_timeout(Duration::from_secs(2));

    let mut node = P2pNode::new(config, ledger.clone());
    let addr_rx = node.bound_addr_receiver();
    let submit_tx = node.submit_sender();
    let shutdown_tx = node.shutdown_handle();

    tokio::spawn(async move {
        let _ = node.run().await;
    });

    let addr = addr_rx.await.expect("failed to get bound address");
    TestNode {
        addr,
        ledger,
        submit_tx,
        shutdown_tx,
    }
}

async fn connect(addr: SocketAddr) -> TestConn {
    let stream = TcpStream::connect(addr).await.expect("connect");
    Framed::new(stream, LineCodec::new())
}

async fn send(conn: &mut TestConn, message: Message) {
    conn.send(message).await.expect("send");
}

async fn recv(conn: &mut TestConn) -> Message {
    let line = timeout(RECV_TIMEOUT, conn.next())
        .await
        .expect("timed out waiting for message")
        .expect("connection closed")
        .expect("framing error");
    serde_json::from_slice(&line).expect("malformed message from node")
}

/// Try to read a message, returning `None` if nothing arrives in time.
async fn try_recv(conn: &mut TestConn, wait: Duration) -> Option<Message> {
    match timeout(wait, conn.next()).await {
        Ok(Some(Ok(line))) => Some(serde_json::from_slice(&line).expect("malformed message")),
        _ => None,
    }
}

/// Poll until the ledger reaches `target` height or the timeout elapses.
async fn wait_for_height(ledger: &Arc<RwLock<Ledger>>, target: u64, timeout_ms: u64) -> bool {
    let start = std::time::Instant::now();
    loop {
        if ledger.read().await.height() >= target {
            return true;
        }
        if start.elapsed() > Duration::from_millis(timeout_ms) {
            return false;
        }
        sleep(Duration::from_millis(25)).await;
    }
}

async fn submit(node: &TestNode, payload: Payload) -> scrawl_core::Block {
    let (reply, rx) = oneshot::channel();
    node.submit_tx
        .send(SubmitRequest { payload, reply })
        .await
        .expect("submit channel");
    timeout(RECV_TIMEOUT, rx)
        .await
        .expect("timed out waiting for submission")
        .expect("submission dropped")
}

// ============================================================================
// Observer handshake
// ============================================================================

#[tokio::test]
async fn test_observer_hello_receives_full_chain() {
    let node = start_node(seeded_ledger(2), "127.0.0.1:1", vec![], Duration::from_secs(30)).await;

    let mut conn = connect(node.addr).await;
    send(&mut conn, Message::Hello { role: Role::Observer, url: None }).await;

    match recv(&mut conn).await {
        Message::Chain { chain } => {
            assert_eq!(chain.len(), 3);
            assert!(chain[0].is_genesis());
        }
        other => panic!("expected chain, got {other}"),
    }

    let _ = node.shutdown_tx.send(()).await;
}

// ============================================================================
// Peer handshake and announcement
// ============================================================================

#[tokio::test]
async fn test_peer_hello_receives_chain_and_peer_list() {
    let node = start_node(seeded_ledger(0), "127.0.0.1:1", vec![], Duration::from_secs(30)).await;

    let mut conn = connect(node.addr).await;
    send(
        &mut conn,
        Message::Hello { role: Role::Peer, url: Some("10.0.0.9:7401".into()) },
    )
    .await;

    match recv(&mut conn).await {
        Message::Chain { chain } => assert_eq!(chain.len(), 1),
        other => panic!("expected chain, got {other}"),
    }

    // the newcomer is announced to all peer connections, including itself
    match recv(&mut conn).await {
        Message::Peers { peers } => assert!(peers.contains(&"10.0.0.9:7401".to_string())),
        other => panic!("expected peers, got {other}"),
    }

    let _ = node.shutdown_tx.send(()).await;
}

// ============================================================================
// Block flooding
// ============================================================================

#[tokio::test]
async fn test_submitted_block_floods_to_connections() {
    let node = start_node(seeded_ledger(0), "127.0.0.1:1", vec![], Duration::from_secs(30)).await;

    let mut first = connect(node.addr).await;
    let mut second = connect(node.addr).await;
    send(&mut first, Message::Hello { role: Role::Observer, url: None }).await;
    send(&mut second, Message::Hello { role: Role::Observer, url: None }).await;
    assert!(matches!(recv(&mut first).await, Message::Chain { .. }));
    assert!(matches!(recv(&mut second).await, Message::Chain { .. }));

    let block = submit(&node, chat("flood me")).await;
    assert_eq!(block.index, 1);

    for conn in [&mut first, &mut second] {
        match recv(conn).await {
            Message::Block { block: received } => assert_eq!(received, block),
            other => panic!("expected block, got {other}"),
        }
    }

    assert_eq!(node.ledger.read().await.height(), 2);
    let _ = node.shutdown_tx.send(()).await;
}

#[tokio::test]
async fn test_valid_remote_block_is_rebroadcast_to_others() {
    let node = start_node(seeded_ledger(0), "127.0.0.1:1", vec![], Duration::from_secs(30)).await;

    let mut observer = connect(node.addr).await;
    send(&mut observer, Message::Hello { role: Role::Observer, url: None }).await;
    let genesis = match recv(&mut observer).await {
        Message::Chain { chain } => chain[0].clone(),
        other => panic!("expected chain, got {other}"),
    };

    let mut sender = connect(node.addr).await;
    send(&mut sender, Message::Hello { role: Role::Observer, url: None }).await;
    assert!(matches!(recv(&mut sender).await, Message::Chain { .. }));

    let block = scrawl_chain::next_block(&genesis, chat("from afar"), GENESIS_TS + 5);
    send(&mut sender, Message::Block { block: block.clone() }).await;

    // flood reaches the other connection, not the sender
    match recv(&mut observer).await {
        Message::Block { block: received } => assert_eq!(received, block),
        other => panic!("expected block, got {other}"),
    }
    assert!(try_recv(&mut sender, Duration::from_millis(300)).await.is_none());

    assert_eq!(node.ledger.read().await.height(), 2);
    let _ = node.shutdown_tx.send(()).await;
}

// ============================================================================
// Resync on divergence
// ============================================================================

#[tokio::test]
async fn test_stale_block_elicits_request_chain_without_mutation() {
    let node = start_node(seeded_ledger(0), "127.0.0.1:1", vec![], Duration::from_secs(30)).await;

    let mut conn = connect(node.addr).await;
    send(
        &mut conn,
        Message::Hello { role: Role::Peer, url: Some("10.0.0.9:7401".into()) },
    )
    .await;
    assert!(matches!(recv(&mut conn).await, Message::Chain { .. }));
    assert!(matches!(recv(&mut conn).await, Message::Peers { .. }));

    // a block that does not extend the node's head
    let orphan = scrawl_core::Block::new(41, "bogus".into(), GENESIS_TS + 9, chat("orphan"));
    send(&mut conn, Message::Block { block: orphan }).await;

    match recv(&mut conn).await {
        Message::RequestChain => {}
        other => panic!("expected request_chain, got {other}"),
    }
    // exactly one reply, and no mutation
    assert!(try_recv(&mut conn, Duration::from_millis(300)).await.is_none());
    assert_eq!(node.ledger.read().await.height(), 1);

    let _ = node.shutdown_tx.send(()).await;
}

// ============================================================================
// Longest-chain replacement
// ============================================================================

#[tokio::test]
async fn test_longer_chain_offer_replaces_and_rebroadcasts() {
    let node = start_node(seeded_ledger(0), "127.0.0.1:1", vec![], Duration::from_secs(30)).await;

    let mut conn = connect(node.addr).await;
    send(
        &mut conn,
        Message::Hello { role: Role::Peer, url: Some("10.0.0.9:7401".into()) },
    )
    .await;
    assert!(matches!(recv(&mut conn).await, Message::Chain { .. }));
    assert!(matches!(recv(&mut conn).await, Message::Peers { .. }));

    // a longer fork built from the same genesis
    let longer = {
        let mut ledger = Ledger::new();
        ledger.initialize_at(GENESIS_TS);
        ledger.extend(chat("fork-1"), GENESIS_TS + 1).unwrap();
        ledger.extend(chat("fork-2"), GENESIS_TS + 2).unwrap();
        ledger.blocks().to_vec()
    };
    send(&mut conn, Message::Chain { chain: longer.clone() }).await;

    // acceptance triggers a convergence broadcast to all connections
    match recv(&mut conn).await {
        Message::Chain { chain } => assert_eq!(chain, longer),
        other => panic!("expected chain, got {other}"),
    }
    assert_eq!(node.ledger.read().await.height(), 3);

    let _ = node.shutdown_tx.send(()).await;
}

#[tokio::test]
async fn test_foreign_genesis_chain_is_ignored() {
    let node = start_node(seeded_ledger(0), "127.0.0.1:1", vec![], Duration::from_secs(30)).await;

    let mut conn = connect(node.addr).await;
    send(
        &mut conn,
        Message::Hello { role: Role::Peer, url: Some("10.0.0.9:7401".into()) },
    )
    .await;
    assert!(matches!(recv(&mut conn).await, Message::Chain { .. }));
    assert!(matches!(recv(&mut conn).await, Message::Peers { .. }));

    // longer, internally valid, but rooted in a different genesis
    let foreign = {
        let mut ledger = Ledger::new();
        ledger.initialize_at(GENESIS_TS + 1);
        ledger.extend(chat("foreign-1"), GENESIS_TS + 2).unwrap();
        ledger.extend(chat("foreign-2"), GENESIS_TS + 3).unwrap();
        ledger.blocks().to_vec()
    };
    send(&mut conn, Message::Chain { chain: foreign }).await;

    // a losing proposal: silently ignored
    assert!(try_recv(&mut conn, Duration::from_millis(300)).await.is_none());
    assert_eq!(node.ledger.read().await.height(), 1);

    let _ = node.shutdown_tx.send(()).await;
}

// ============================================================================
// Outbound sync and flood between real nodes
// ============================================================================

#[tokio::test]
async fn test_bootstrap_sync_then_block_propagation() {
    // A starts ahead by two blocks
    let node_a = start_node(seeded_ledger(2), "127.0.0.1:1", vec![], Duration::from_secs(30)).await;
    let node_b = start_node(
        seeded_ledger(0),
        "127.0.0.1:2",
        vec![node_a.addr.to_string()],
        Duration::from_secs(30),
    )
    .await;

    // B pulls A's longer chain on connect
    assert!(wait_for_height(&node_b.ledger, 3, 5_000).await);
    assert_eq!(
        node_a.ledger.read().await.head().unwrap().hash,
        node_b.ledger.read().await.head().unwrap().hash,
    );

    // a block submitted on A floods to B
    let block = submit(&node_a, chat("and one more")).await;
    assert_eq!(block.index, 3);
    assert!(wait_for_height(&node_b.ledger, 4, 5_000).await);
    assert_eq!(node_b.ledger.read().await.head().unwrap().hash, block.hash);

    let _ = node_a.shutdown_tx.send(()).await;
    let _ = node_b.shutdown_tx.send(()).await;
}

// ============================================================================
// Gossip: discovery, self-suppression, reconnection
// ============================================================================

#[tokio::test]
async fn test_gossiped_url_triggers_outbound_connect() {
    let node = start_node(seeded_ledger(0), "127.0.0.1:1", vec![], Duration::from_secs(30)).await;

    // a listener standing in for a gossiped peer
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let gossiped = listener.local_addr().unwrap();

    let mut conn = connect(node.addr).await;
    send(
        &mut conn,
        Message::Hello { role: Role::Peer, url: Some("10.0.0.9:7401".into()) },
    )
    .await;
    assert!(matches!(recv(&mut conn).await, Message::Chain { .. }));
    assert!(matches!(recv(&mut conn).await, Message::Peers { .. }));

    send(&mut conn, Message::Peers { peers: vec![gossiped.to_string()] }).await;

    // the node dials the unknown url and identifies itself
    let (stream, _) = timeout(RECV_TIMEOUT, listener.accept())
        .await
        .expect("node never dialed gossiped peer")
        .unwrap();
    let mut accepted = Framed::new(stream, LineCodec::new());

    match recv(&mut accepted).await {
        Message::Hello { role: Role::Peer, url } => assert_eq!(url.as_deref(), Some("127.0.0.1:1")),
        other => panic!("expected peer hello, got {other}"),
    }
    assert!(matches!(recv(&mut accepted).await, Message::RequestChain));

    // gossiping the same url again is idempotent while the connection lives
    send(&mut conn, Message::Peers { peers: vec![gossiped.to_string()] }).await;
    let second_dial = timeout(Duration::from_millis(400), listener.accept()).await;
    assert!(second_dial.is_err(), "node dialed an already-connected url");

    let _ = node.shutdown_tx.send(()).await;
}

#[tokio::test]
async fn test_gossiped_self_url_never_triggers_self_connection() {
    // the node's own advertised url points at a listener we control
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let self_url = listener.local_addr().unwrap().to_string();

    let node = start_node(
        seeded_ledger(0),
        self_url.clone(),
        vec![],
        Duration::from_millis(100),
    )
    .await;

    let mut conn = connect(node.addr).await;
    send(
        &mut conn,
        Message::Hello { role: Role::Peer, url: Some("10.0.0.9:7401".into()) },
    )
    .await;
    assert!(matches!(recv(&mut conn).await, Message::Chain { .. }));
    assert!(matches!(recv(&mut conn).await, Message::Peers { .. }));

    send(&mut conn, Message::Peers { peers: vec![self_url] }).await;

    // several gossip ticks pass and nothing ever dials us
    let dialed = timeout(Duration::from_millis(600), listener.accept()).await;
    assert!(dialed.is_err(), "node attempted a self-connection");

    let _ = node.shutdown_tx.send(()).await;
}

#[tokio::test]
async fn test_gossip_retries_known_but_disconnected_peer() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let peer_url = listener.local_addr().unwrap().to_string();

    let node = start_node(
        seeded_ledger(0),
        "127.0.0.1:1",
        vec![],
        Duration::from_millis(100),
    )
    .await;

    // teach the node about the peer via a hello, then drop the connection
    {
        let mut conn = connect(node.addr).await;
        send(
            &mut conn,
            Message::Hello { role: Role::Peer, url: Some(peer_url.clone()) },
        )
        .await;
        assert!(matches!(recv(&mut conn).await, Message::Chain { .. }));
    }

    // the directory still knows the url, so a gossip tick re-dials it
    let (stream, _) = timeout(RECV_TIMEOUT, listener.accept())
        .await
        .expect("node never retried known peer")
        .unwrap();
    let mut accepted = Framed::new(stream, LineCodec::new());
    assert!(matches!(
        recv(&mut accepted).await,
        Message::Hello { role: Role::Peer, .. }
    ));

    let _ = node.shutdown_tx.send(()).await;
}

// ============================================================================
// Observer cmd shortcut
// ============================================================================

#[tokio::test]
async fn test_observer_cmd_appends_and_floods() {
    let node = start_node(seeded_ledger(0), "127.0.0.1:1", vec![], Duration::from_secs(30)).await;

    let mut conn = connect(node.addr).await;
    send(&mut conn, Message::Hello { role: Role::Observer, url: None }).await;
    assert!(matches!(recv(&mut conn).await, Message::Chain { .. }));

    send(
        &mut conn,
        Message::Cmd {
            action: scrawl_p2p::CmdAction::SendMessage,
            author: Some("carol".into()),
            content: Some("via cmd".into()),
            title: None,
            body: None,
        },
    )
    .await;

    // the flood includes the submitting observer
    match recv(&mut conn).await {
        Message::Block { block } => {
            assert_eq!(block.index, 1);
            match &block.payload {
                Payload::Chat { message } => {
                    assert_eq!(message.author, "carol");
                    assert_eq!(message.content, "via cmd");
                }
                other => panic!("expected chat payload, got {other:?}"),
            }
        }
        other => panic!("expected block, got {other}"),
    }
    assert_eq!(node.ledger.read().await.height(), 2);

    let _ = node.shutdown_tx.send(()).await;
}

#[tokio::test]
async fn test_cmd_without_required_fields_is_discarded() {
    let node = start_node(seeded_ledger(0), "127.0.0.1:1", vec![], Duration::from_secs(30)).await;

    let mut conn = connect(node.addr).await;
    send(&mut conn, Message::Hello { role: Role::Observer, url: None }).await;
    assert!(matches!(recv(&mut conn).await, Message::Chain { .. }));

    send(
        &mut conn,
        Message::Cmd {
            action: scrawl_p2p::CmdAction::AddNote,
            author: None,
            content: None,
            title: Some("no body".into()),
            body: None,
        },
    )
    .await;

    assert!(try_recv(&mut conn, Duration::from_millis(300)).await.is_none());
    assert_eq!(node.ledger.read().await.height(), 1);

    let _ = node.shutdown_tx.send(()).await;
}
