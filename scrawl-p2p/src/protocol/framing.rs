//! Newline-delimited JSON framing codec.
//!
//! Each frame is one JSON envelope terminated by `\n`. The decoder yields
//! raw frame bytes and leaves JSON parsing to the connection task, so a
//! malformed envelope can be logged and discarded without tearing down the
//! framed stream; only an oversized frame is a codec error.

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::config::MAX_MESSAGE_SIZE;
use crate::error::{P2pError, P2pResult};
use crate::protocol::Message;

/// Codec for newline-delimited JSON framing.
#[derive(Debug, Default)]
pub struct LineCodec;

impl LineCodec {
    /// Create a new codec.
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for LineCodec {
    type Item = Bytes;
    type Error = P2pError;

    fn decode(&mut self, src: &mut BytesMut) -> P2pResult<Option<Self::Item>> {
        match src.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                if pos > MAX_MESSAGE_SIZE {
                    return Err(P2pError::MessageTooLarge {
                        size: pos,
                        max: MAX_MESSAGE_SIZE,
                    });
                }
                let mut line = src.split_to(pos);
                src.advance(1); // consume the newline
                if line.last() == Some(&b'\r') {
                    line.truncate(line.len() - 1);
                }
                Ok(Some(line.freeze()))
            }
            None => {
                if src.len() > MAX_MESSAGE_SIZE {
                    return Err(P2pError::MessageTooLarge {
                        size: src.len(),
                        max: MAX_MESSAGE_SIZE,
                    });
                }
                Ok(None)
            }
        }
    }
}

impl Encoder<Message> for LineCodec {
    type Error = P2pError;

    fn encode(&mut self, message: Message, dst: &mut BytesMut) -> P2pResult<()> {
        let bytes =
            serde_json::to_vec(&message).map_err(|e| P2pError::Serialization(e.to_string()))?;

        if bytes.len() > MAX_MESSAGE_SIZE {
            return Err(P2pError::MessageTooLarge {
                size: bytes.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }

        dst.reserve(bytes.len() + 1);
        dst.extend_from_slice(&bytes);
        dst.extend_from_slice(b"\n");
        Ok(())
    }
}
