//! Per-connection I/O tasks.
//!
//! Each live connection is owned by a tokio task that splits its time
//! between draining the command channel (outbound sends) and decoding
//! inbound frames. Tasks never touch shared state; everything observable
//! flows to the main event loop as a [`ConnectionEvent`].

use std::fmt;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::codec::Framed;

use crate::protocol::{LineCodec, Message};

/// Unique identifier for a connection, allocated by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(pub u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Commands sent from the event loop to a connection task.
#[derive(Debug)]
pub enum ConnectionCommand {
    /// Serialize and send a message.
    Send(Message),
    /// Close the connection.
    Close,
}

/// Events sent from connection tasks to the event loop.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// An outbound dial succeeded; the connection task is running.
    Established {
        conn_id: ConnId,
        url: String,
        command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    },
    /// An outbound dial failed.
    ConnectFailed { url: String, error: String },
    /// A well-formed protocol message arrived.
    Inbound {
        conn_id: ConnId,
        message: Box<Message>,
    },
    /// The connection terminated; it must be dropped from every index.
    Closed { conn_id: ConnId, reason: String },
}

/// Spawn the I/O task for an accepted inbound connection.
///
/// Returns the command channel the event loop uses to talk to this
/// connection.
pub fn spawn_connection(
    conn_id: ConnId,
    stream: TcpStream,
    event_tx: mpsc::Sender<ConnectionEvent>,
) -> mpsc::UnboundedSender<ConnectionCommand> {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    tokio::spawn(run_connection(conn_id, stream, command_rx, event_tx));
    command_tx
}

/// Spawn a dial task for an outbound peer connection.
///
/// On success the task emits [`ConnectionEvent::Established`] and then runs
/// the normal connection loop; on failure it emits
/// [`ConnectionEvent::ConnectFailed`] and exits. Failures are not retried
/// here; the gossip scheduler re-dials on its next tick.
pub fn spawn_outbound(
    conn_id: ConnId,
    url: String,
    connect_timeout: Duration,
    event_tx: mpsc::Sender<ConnectionEvent>,
) {
    tokio::spawn(async move {
        let target = dial_target(&url).to_string();
        match timeout(connect_timeout, TcpStream::connect(target.as_str())).await {
            Ok(Ok(stream)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    tracing::warn!(error = %e, "Failed to set TCP_NODELAY");
                }
                let (command_tx, command_rx) = mpsc::unbounded_channel();
                let established = ConnectionEvent::Established {
                    conn_id,
                    url,
                    command_tx,
                };
                if event_tx.send(established).await.is_err() {
                    return; // event loop is gone
                }
                run_connection(conn_id, stream, command_rx, event_tx).await;
            }
            Ok(Err(e)) => {
                let _ = event_tx
                    .send(ConnectionEvent::ConnectFailed {
                        url,
                        error: e.to_string(),
                    })
                    .await;
            }
            Err(_) => {
                let _ = event_tx
                    .send(ConnectionEvent::ConnectFailed {
                        url,
                        error: "connect timeout".to_string(),
                    })
                    .await;
            }
        }
    });
}

/// Strip an optional scheme prefix from a peer url before dialing.
fn dial_target(url: &str) -> &str {
    url.strip_prefix("tcp://").unwrap_or(url)
}

/// Read/write loop shared by inbound and outbound connections.
async fn run_connection(
    conn_id: ConnId,
    stream: TcpStream,
    mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
    event_tx: mpsc::Sender<ConnectionEvent>,
) {
    let mut framed = Framed::new(stream, LineCodec::new());

    let reason = loop {
        tokio::select! {
            command = command_rx.recv() => match command {
                Some(ConnectionCommand::Send(message)) => {
                    if let Err(e) = framed.send(message).await {
                        break format!("send failed: {e}");
                    }
                }
                Some(ConnectionCommand::Close) | None => {
                    break "closed locally".to_string();
                }
            },

            frame = framed.next() => match frame {
                Some(Ok(line)) => match serde_json::from_slice::<Message>(&line) {
                    Ok(message) => {
                        let event = ConnectionEvent::Inbound {
                            conn_id,
                            message: Box::new(message),
                        };
                        if event_tx.send(event).await.is_err() {
                            break "event loop gone".to_string();
                        }
                    }
                    Err(e) => {
                        // malformed envelope: discard, connection stays open
                        tracing::warn!(conn = %conn_id, error = %e, "Discarding malformed message");
                    }
                },
                Some(Err(e)) => break format!("read failed: {e}"),
                None => break "closed by remote".to_string(),
            },
        }
    };

    let _ = event_tx
        .send(ConnectionEvent::Closed { conn_id, reason })
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[test]
    fn test_conn_id_display() {
        assert_eq!(format!("{}", ConnId(7)), "conn-7");
    }

    #[test]
    fn test_dial_target_strips_scheme() {
        assert_eq!(dial_target("tcp://127.0.0.1:7401"), "127.0.0.1:7401");
        assert_eq!(dial_target("127.0.0.1:7401"), "127.0.0.1:7401");
    }

    #[tokio::test]
    async fn test_inbound_message_and_close_events() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (event_tx, mut event_rx) = mpsc::channel(16);

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream
                .write_all(b"{\"type\":\"request_chain\"}\nnot json\n")
                .await
                .unwrap();
            stream.shutdown().await.unwrap();
        });

        let (stream, _) = listener.accept().await.unwrap();
        let _command_tx = spawn_connection(ConnId(1), stream, event_tx);

        // the well-formed frame arrives; the malformed one is discarded
        match event_rx.recv().await.unwrap() {
            ConnectionEvent::Inbound { conn_id, message } => {
                assert_eq!(conn_id, ConnId(1));
                assert_eq!(*message, Message::RequestChain);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        match event_rx.recv().await.unwrap() {
            ConnectionEvent::Closed { conn_id, .. } => assert_eq!(conn_id, ConnId(1)),
            other => panic!("unexpected event: {other:?}"),
        }

        client.await.unwrap();
    }

    #[tokio::test]
    async fn test_outbound_dial_failure_reports_event() {
        let (event_tx, mut event_rx) = mpsc::channel(16);

        // bind-then-drop to get a port with nothing listening
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        spawn_outbound(
            ConnId(2),
            addr.to_string(),
            Duration::from_secs(2),
            event_tx,
        );

        match event_rx.recv().await.unwrap() {
            ConnectionEvent::ConnectFailed { url, .. } => assert_eq!(url, addr.to_string()),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
