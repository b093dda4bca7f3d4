//! Submission RPC methods.

use std::sync::Arc;

use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::RpcModule;
use serde::Deserialize;
use tokio::sync::oneshot;

use scrawl_core::block::Block;
use scrawl_core::payload::{ChatMessage, NoteDocument, Payload};
use scrawl_core::time::now_millis;
use scrawl_p2p::SubmitRequest;

use super::RpcState;

/// Parameters for `sendMessage`.
#[derive(Debug, Deserialize)]
pub struct SendMessageParams {
    #[serde(default)]
    pub author: Option<String>,
    pub content: String,
}

/// Parameters for `addNote`.
#[derive(Debug, Deserialize)]
pub struct AddNoteParams {
    pub title: String,
    pub body: String,
}

fn invalid_params(message: &str) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(-32602, message.to_string(), None::<()>)
}

fn internal_error(message: &str) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(-32603, message.to_string(), None::<()>)
}

/// Forward a payload to the replication event loop and wait for the block.
async fn submit(state: &RpcState, payload: Payload) -> Result<Block, ErrorObjectOwned> {
    let (reply, rx) = oneshot::channel();
    state
        .submit_tx
        .send(SubmitRequest { payload, reply })
        .await
        .map_err(|_| internal_error("replication loop unavailable"))?;

    rx.await
        .map_err(|_| internal_error("submission was not applied"))
}

/// Register submission RPC methods.
pub fn register_methods(module: &mut RpcModule<Arc<RpcState>>) {
    module
        .register_async_method("sendMessage", |params, state, _| async move {
            let request: SendMessageParams = params.parse()?;
            if request.content.trim().is_empty() {
                return Err(invalid_params("content must not be empty"));
            }

            let author = request
                .author
                .filter(|a| !a.trim().is_empty())
                .unwrap_or_else(|| "anonymous".to_string());
            let payload = Payload::Chat {
                message: ChatMessage::new(author, request.content, now_millis()),
            };

            submit(&state, payload).await
        })
        .unwrap();

    module
        .register_async_method("addNote", |params, state, _| async move {
            let request: AddNoteParams = params.parse()?;
            if request.title.trim().is_empty() {
                return Err(invalid_params("title must not be empty"));
            }
            if request.body.trim().is_empty() {
                return Err(invalid_params("body must not be empty"));
            }

            let payload = Payload::Note {
                note: NoteDocument::new(request.title, request.body, now_millis()),
            };

            submit(&state, payload).await
        })
        .unwrap();
}
