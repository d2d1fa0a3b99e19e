//! Relay client
//!
//! Connects to a relay server, sends text or binary payloads and reads what
//! other clients broadcast. Tracks the same lifecycle states as the server
//! side of a connection.

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use crate::relay::{ConnectionState, Payload};

/// Errors that can occur on the client side
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tungstenite::Error,
    },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("Client is not open (state: {0})")]
    NotOpen(ConnectionState),
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Something the server sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A text or binary payload
    Message(Payload),
    /// The server closed the connection
    Close,
    /// The connection failed
    Error(String),
}

/// A connection to a relay server
pub struct RelayClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    state: ConnectionState,
}

impl RelayClient {
    /// Connect to a relay, e.g. `ws://127.0.0.1:8080`
    pub async fn connect(url: &str) -> ClientResult<Self> {
        debug!("Connecting to relay at {}", url);
        let (ws, response) = connect_async(url)
            .await
            .map_err(|source| ClientError::Connect {
                url: url.to_string(),
                source,
            })?;
        info!("Connected to {} (HTTP {})", url, response.status());

        Ok(Self {
            ws,
            state: ConnectionState::Open,
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Send a payload, keeping its classification
    pub async fn send(&mut self, payload: Payload) -> ClientResult<()> {
        if !self.is_open() {
            return Err(ClientError::NotOpen(self.state));
        }
        if let Err(e) = self.ws.send(Message::from(payload)).await {
            self.state = ConnectionState::Closed;
            return Err(e.into());
        }
        Ok(())
    }

    /// Send a text payload
    pub async fn send_text(&mut self, text: impl Into<String>) -> ClientResult<()> {
        self.send(Payload::text(text)).await
    }

    /// Send a binary payload
    pub async fn send_binary(&mut self, data: impl Into<Vec<u8>>) -> ClientResult<()> {
        self.send(Payload::binary(data)).await
    }

    /// Wait for the next event from the server
    ///
    /// Returns `None` once the connection is closed.
    pub async fn next_event(&mut self) -> Option<ClientEvent> {
        if self.state == ConnectionState::Closed {
            return None;
        }

        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Some(ClientEvent::Message(Payload::Text(text)));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Some(ClientEvent::Message(Payload::Binary(data)));
                }
                Some(Ok(Message::Close(_))) => {
                    self.state = ConnectionState::Closed;
                    return Some(ClientEvent::Close);
                }
                Some(Ok(_)) => {
                    // Ping/pong are answered by tungstenite
                }
                Some(Err(e)) => {
                    self.state = ConnectionState::Closed;
                    return Some(ClientEvent::Error(e.to_string()));
                }
                None => {
                    self.state = ConnectionState::Closed;
                    return None;
                }
            }
        }
    }

    /// Close the connection
    pub async fn close(&mut self) -> ClientResult<()> {
        if self.state == ConnectionState::Closed {
            return Ok(());
        }
        self.state = ConnectionState::Closing;
        let result = self.ws.close(None).await;
        self.state = ConnectionState::Closed;
        match result {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
