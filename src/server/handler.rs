//! WebSocket connection handler
//!
//! Runs one client session: a writer task drains the connection's outbound
//! queue into the socket, while the handler reads frames and reports them to
//! the broadcast engine.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info};

use super::protocol::InboundFrame;
use crate::relay::{
    BroadcastEngine, Connection, Payload, StateHandle, Transport, TransportError, TransportResult,
};

/// Errors that end a client session
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Transport backed by a connection's outbound frame queue
///
/// Sending never waits for the socket: frames are queued and written in
/// order by the connection's writer task.
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<Message>,
}

impl ChannelTransport {
    /// Create a transport and the receiver its writer task drains
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    fn send(&self, payload: Payload) -> TransportResult<()> {
        self.tx
            .send(payload.into())
            .map_err(|_| TransportError::Closed)
    }

    fn close(&self) -> TransportResult<()> {
        self.tx
            .send(Message::Close(None))
            .map_err(|_| TransportError::Closed)
    }
}

/// Handles a single upgraded WebSocket connection
pub struct ConnectionHandler {
    engine: Arc<BroadcastEngine>,
    peer_addr: SocketAddr,
}

impl ConnectionHandler {
    /// Create a new connection handler
    pub fn new(engine: Arc<BroadcastEngine>, peer_addr: SocketAddr) -> Self {
        Self { engine, peer_addr }
    }

    /// Run the session until the client leaves, the socket fails, or the
    /// server shuts down
    pub async fn run<S>(
        self,
        ws_stream: WebSocketStream<S>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (ws_sender, mut ws_receiver) = ws_stream.split();
        let (transport, outbound_rx) = ChannelTransport::new();
        let connection = Arc::new(Connection::new(Some(self.peer_addr), transport));

        let writer = tokio::spawn(write_frames(
            ws_sender,
            outbound_rx,
            connection.state_handle(),
            self.peer_addr,
        ));

        connection.mark_open();
        self.engine.on_connect(&connection).await;

        loop {
            tokio::select! {
                msg = ws_receiver.next() => {
                    match msg {
                        Some(Ok(message)) => match InboundFrame::from(message) {
                            InboundFrame::Payload(payload) => {
                                self.engine.on_message(&connection, payload).await;
                            }
                            InboundFrame::Close => {
                                info!("Client {} requested close", self.peer_addr);
                                self.engine.on_disconnect(&connection).await;
                                break;
                            }
                            InboundFrame::Control(kind) => {
                                debug!("Received {} from {}", kind, self.peer_addr);
                            }
                        },
                        Some(Err(e)) => {
                            self.engine
                                .on_error(&connection, ConnectionError::from(e))
                                .await;
                            break;
                        }
                        None => {
                            debug!("Stream from {} ended", self.peer_addr);
                            self.engine.on_disconnect(&connection).await;
                            break;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, closing connection to {}", self.peer_addr);
                    if let Err(e) = connection.close() {
                        debug!("Could not queue close for {}: {}", self.peer_addr, e);
                    }
                    break;
                }
            }
        }

        // Idempotent: a close or error above may already have removed it
        self.engine.on_disconnect(&connection).await;

        // Dropping the last handle closes the queue; the writer flushes what
        // is left and exits.
        drop(connection);
        if let Err(e) = writer.await {
            debug!("Writer task for {} ended abnormally: {}", self.peer_addr, e);
        }

        info!("Connection from {} closed", self.peer_addr);
    }
}

/// Write queued frames to the socket in order
async fn write_frames<S>(
    mut ws_sender: SplitSink<WebSocketStream<S>, Message>,
    mut outbound_rx: mpsc::UnboundedReceiver<Message>,
    state: StateHandle,
    peer_addr: SocketAddr,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    while let Some(message) = outbound_rx.recv().await {
        if let Err(e) = ws_sender.send(message).await {
            debug!("Write to {} failed: {}", peer_addr, e);
            // Stop further broadcasts from targeting this socket
            state.close();
            break;
        }
    }
    let _ = ws_sender.close().await;
}
