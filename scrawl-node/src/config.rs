//! Node configuration.

use std::net::SocketAddr;

use scrawl_p2p::P2pConfig;

use crate::cli::Cli;

/// Complete node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Replication listen address.
    pub listen_addr: SocketAddr,

    /// Self-advertised url.
    pub self_url: String,

    /// Bootstrap peer urls dialed once at startup.
    pub bootstrap_peers: Vec<String>,

    /// RPC listen address.
    pub rpc_addr: SocketAddr,

    /// Log level.
    pub log_level: String,
}

impl NodeConfig {
    /// Create a node configuration from CLI arguments.
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            listen_addr: cli.listen,
            self_url: cli.self_url(),
            bootstrap_peers: cli.peers.clone().unwrap_or_default(),
            rpc_addr: cli.rpc_listen,
            log_level: cli.log_level.clone(),
        }
    }

    /// Build the replication configuration from node config.
    pub fn p2p_config(&self) -> P2pConfig {
        P2pConfig::new(self.listen_addr, self.self_url.clone())
            .with_bootstrap_peers(self.bootstrap_peers.clone())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:7401".parse().unwrap(),
            self_url: "127.0.0.1:7401".to_string(),
            bootstrap_peers: Vec::new(),
            rpc_addr: "127.0.0.1:7402".parse().unwrap(),
            log_level: "info".to_string(),
        }
    }
}
