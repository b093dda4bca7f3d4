//! Node orchestrator.
//!
//! Coordinates all node components: ledger, replication, and RPC.

use std::sync::Arc;

use tokio::sync::RwLock;

use scrawl_chain::Ledger;
use scrawl_p2p::P2pNode;

use crate::config::NodeConfig;
use crate::rpc::{self, RpcState};
use crate::shutdown::wait_for_shutdown_signal;

/// The main node structure.
pub struct Node {
    /// Node configuration.
    config: NodeConfig,

    /// The replicated log.
    ledger: Arc<RwLock<Ledger>>,
}

impl Node {
    /// Create a new node with the given configuration.
    pub async fn new(config: NodeConfig) -> anyhow::Result<Self> {
        let mut ledger = Ledger::new();
        ledger.initialize();

        tracing::info!(
            height = ledger.height(),
            head = %ledger.head().map(|b| b.hash.clone()).unwrap_or_default(),
            "Ledger ready"
        );

        Ok(Self {
            config,
            ledger: Arc::new(RwLock::new(ledger)),
        })
    }

    /// Run the node until a shutdown signal arrives.
    pub async fn run(&self) -> anyhow::Result<()> {
        tracing::info!("Starting scrawl node...");
        tracing::info!("  Replication address: {}", self.config.listen_addr);
        tracing::info!("  Self url: {}", self.config.self_url);
        tracing::info!("  RPC address: {}", self.config.rpc_addr);
        tracing::info!("  Bootstrap peers: {}", self.config.bootstrap_peers.len());

        // Start the replication node
        let p2p = P2pNode::new(self.config.p2p_config(), self.ledger.clone());
        let submit_tx = p2p.submit_sender();
        let p2p_shutdown = p2p.shutdown_handle();

        // Start the RPC server
        let rpc_state = Arc::new(RpcState::new(self.ledger.clone(), submit_tx));
        let rpc_handle = rpc::start_rpc_server(self.config.rpc_addr, rpc_state).await?;

        let p2p_task = tokio::spawn(async move {
            if let Err(e) = p2p.run().await {
                tracing::error!(error = %e, "Replication node failed");
            }
        });

        wait_for_shutdown_signal().await;

        // Stop replication first so no new blocks arrive mid-teardown
        let _ = p2p_shutdown.send(()).await;
        let _ = p2p_task.await;
        rpc_handle.stop()?;

        tracing::info!("Shutdown complete");
        Ok(())
    }
}
