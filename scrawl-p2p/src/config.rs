//! P2P configuration.

use std::net::SocketAddr;
use std::time::Duration;

/// Maximum wire message size in bytes (1 MB).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Default interval between gossip ticks.
pub const DEFAULT_GOSSIP_INTERVAL: Duration = Duration::from_secs(5);

/// Default timeout for establishing outbound connections.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for the replication node.
#[derive(Debug, Clone)]
pub struct P2pConfig {
    /// Address to bind the listener to.
    pub bind_addr: SocketAddr,

    /// Self-advertised url, sent in peer hellos and used to suppress
    /// self-connection attempts.
    pub self_url: String,

    /// Peer urls dialed once at startup.
    pub bootstrap_peers: Vec<String>,

    /// Interval between peer-list broadcasts and reconnect sweeps.
    pub gossip_interval: Duration,

    /// Timeout for establishing outbound connections.
    pub connect_timeout: Duration,
}

impl Default for P2pConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:7401".parse().unwrap(),
            self_url: "127.0.0.1:7401".to_string(),
            bootstrap_peers: Vec::new(),
            gossip_interval: DEFAULT_GOSSIP_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl P2pConfig {
    /// Create a configuration with the given bind address and self url.
    pub fn new(bind_addr: SocketAddr, self_url: impl Into<String>) -> Self {
        Self {
            bind_addr,
            self_url: self_url.into(),
            ..Default::default()
        }
    }

    /// Add bootstrap peers to dial on startup.
    pub fn with_bootstrap_peers(mut self, peers: Vec<String>) -> Self {
        self.bootstrap_peers = peers;
        self
    }

    /// Set the gossip interval.
    pub fn with_gossip_interval(mut self, interval: Duration) -> Self {
        self.gossip_interval = interval;
        self
    }

    /// Set the connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}
