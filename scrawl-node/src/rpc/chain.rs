//! Read-only chain RPC methods.

use std::sync::Arc;

use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::RpcModule;
use serde::{Deserialize, Serialize};

use scrawl_core::block::Block;

use super::RpcState;

/// Process health summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthInfo {
    pub ok: bool,
    pub height: u64,
    pub head_hash: String,
}

/// Register chain query RPC methods.
pub fn register_methods(module: &mut RpcModule<Arc<RpcState>>) {
    module
        .register_async_method("getHealth", |_params, state, _| async move {
            let ledger = state.ledger.read().await;
            Ok::<_, ErrorObjectOwned>(HealthInfo {
                ok: true,
                height: ledger.height(),
                head_hash: ledger.head().map(|b| b.hash.clone()).unwrap_or_default(),
            })
        })
        .unwrap();

    module
        .register_async_method("getChain", |_params, state, _| async move {
            let ledger = state.ledger.read().await;
            Ok::<Vec<Block>, ErrorObjectOwned>(ledger.blocks().to_vec())
        })
        .unwrap();
}
