//! WebSocket server implementation
//!
//! Listens on a configurable port, upgrades each accepted TCP connection to
//! a WebSocket and hands it to a [`ConnectionHandler`] running on its own
//! task. The server owns the connection registry and broadcast engine.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::accept_async;
use tracing::{debug, error, info, warn};

use super::handler::ConnectionHandler;
use crate::relay::{BroadcastEngine, ConnectionRegistry};

/// Default port to listen on
pub const DEFAULT_PORT: u16 = 8080;

/// Default bind address (all interfaces)
pub const DEFAULT_BIND: &str = "0.0.0.0";

/// Configuration for the relay server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind: String,
    /// Port to listen on
    pub port: u16,
}

impl ServerConfig {
    /// Create a new server configuration
    pub fn new(bind: impl Into<String>, port: u16) -> Self {
        Self {
            bind: bind.into(),
            port,
        }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BIND, DEFAULT_PORT)
    }
}

/// WebSocket relay server
pub struct RelayServer {
    config: ServerConfig,
    engine: Arc<BroadcastEngine>,
    shutdown_tx: broadcast::Sender<()>,
}

impl RelayServer {
    /// Create a new relay server with an empty registry
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let registry = Arc::new(ConnectionRegistry::new());
        Self {
            config,
            engine: Arc::new(BroadcastEngine::new(registry)),
            shutdown_tx,
        }
    }

    /// The engine relaying messages between this server's connections
    pub fn engine(&self) -> &Arc<BroadcastEngine> {
        &self.engine
    }

    /// Trigger server shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Bind the listening socket
    pub async fn bind(&self) -> anyhow::Result<TcpListener> {
        let addr = self.config.socket_addr();
        TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind relay listener on {}", addr))
    }

    /// Bind and serve until shutdown
    pub async fn run(&self) -> anyhow::Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Accept connections on `listener` until shutdown
    ///
    /// Each connection is handled on its own task, so a slow or failing
    /// client never delays the accept loop or other clients.
    pub async fn serve(&self, listener: TcpListener) -> anyhow::Result<()> {
        let local_addr = listener.local_addr()?;
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        info!("Server started on port {}", local_addr.port());

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let engine = Arc::clone(&self.engine);
                            let shutdown_rx = self.shutdown_tx.subscribe();

                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, peer_addr, engine, shutdown_rx).await {
                                    warn!("Connection error from {}: {:#}", peer_addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping server");
                    break;
                }
            }
        }

        let remaining = self.engine.connection_count().await;
        if remaining > 0 {
            info!("Closing {} active connections...", remaining);
        }

        Ok(())
    }
}

/// Upgrade a TCP stream and run the relay session on it
async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    engine: Arc<BroadcastEngine>,
    shutdown_rx: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    debug!("New TCP connection from {}", peer_addr);

    let ws_stream = accept_async(stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {}", peer_addr))?;

    ConnectionHandler::new(engine, peer_addr)
        .run(ws_stream, shutdown_rx)
        .await;
    Ok(())
}
