//! JSON-RPC submission and query surface.
//!
//! This is the thin request/response layer over the core: one method per
//! submission kind, plus read-only health and chain queries. Submissions
//! are forwarded to the replication event loop over a channel so block
//! construction stays on the single mutation path.

pub mod chain;
pub mod submit;

use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::server::{ServerBuilder, ServerHandle};
use jsonrpsee::RpcModule;
use tokio::sync::{mpsc, RwLock};

use scrawl_chain::Ledger;
use scrawl_p2p::SubmitRequest;

/// Shared state for RPC handlers.
pub struct RpcState {
    /// Read access to the chain; all writes happen in the event loop.
    pub ledger: Arc<RwLock<Ledger>>,

    /// Channel into the replication event loop for submissions.
    pub submit_tx: mpsc::Sender<SubmitRequest>,
}

impl RpcState {
    /// Create new RPC state.
    pub fn new(ledger: Arc<RwLock<Ledger>>, submit_tx: mpsc::Sender<SubmitRequest>) -> Self {
        Self { ledger, submit_tx }
    }
}

/// Build the complete RPC module with all methods.
pub fn build_rpc_module(state: Arc<RpcState>) -> RpcModule<Arc<RpcState>> {
    let mut module = RpcModule::new(state.clone());

    // Register chain query methods
    chain::register_methods(&mut module);

    // Register submission methods
    submit::register_methods(&mut module);

    module
}

/// RPC server handle with local address.
pub struct RpcServerHandle {
    /// The server handle for shutdown.
    handle: ServerHandle,
    /// The local address the server is bound to.
    local_addr: SocketAddr,
}

impl RpcServerHandle {
    /// Get the local address the server is bound to.
    #[allow(dead_code)]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop the server.
    pub fn stop(&self) -> Result<(), anyhow::Error> {
        self.handle
            .stop()
            .map_err(|e| anyhow::anyhow!("Failed to stop server: {:?}", e))
    }
}

/// Start the JSON-RPC server.
pub async fn start_rpc_server(
    addr: SocketAddr,
    state: Arc<RpcState>,
) -> anyhow::Result<RpcServerHandle> {
    let server = ServerBuilder::default().build(addr).await?;
    let local_addr = server.local_addr()?;

    let module = build_rpc_module(state);

    tracing::info!("Starting JSON-RPC server on {}", local_addr);

    let handle = server.start(module);

    Ok(RpcServerHandle { handle, local_addr })
}
