//! Client connection handles
//!
//! A [`Connection`] pairs a transport (anything that can queue payloads for a
//! single client) with the connection's lifecycle state. The per-connection
//! handler owns the `Arc<Connection>`; everything else only borrows it.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use super::Payload;

/// Identifier assigned to each accepted connection (diagnostics and registry key)
pub type ConnectionId = Uuid;

/// Errors reported by a transport when queueing outbound data
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection closed")]
    Closed,

    #[error("Transport failure: {0}")]
    Failed(String),
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Outbound half of a client connection
///
/// Implementations must not block: `send` queues the payload and returns,
/// and payloads queued by one caller are delivered in the order queued.
pub trait Transport: Send + Sync {
    /// Queue a payload for delivery to the client
    fn send(&self, payload: Payload) -> TransportResult<()>;

    /// Ask the transport to close the connection
    fn close(&self) -> TransportResult<()>;
}

/// Lifecycle state of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Open,
            2 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Shared lifecycle state of a connection
///
/// Cloned into tasks that need to observe or end the connection (such as the
/// socket writer) without holding the connection itself.
#[derive(Debug, Clone)]
pub struct StateHandle(Arc<AtomicU8>);

impl StateHandle {
    pub fn new(state: ConnectionState) -> Self {
        Self(Arc::new(AtomicU8::new(state as u8)))
    }

    /// Current state
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move from `from` to `to`; returns false if the state was not `from`
    pub fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Move to `Closed`, returning the previous state
    pub fn close(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.swap(ConnectionState::Closed as u8, Ordering::AcqRel))
    }
}

/// One accepted client session
pub struct Connection {
    id: ConnectionId,
    peer_addr: Option<SocketAddr>,
    state: StateHandle,
    transport: Box<dyn Transport>,
}

impl Connection {
    /// Create a connection in the `Connecting` state
    pub fn new(peer_addr: Option<SocketAddr>, transport: impl Transport + 'static) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer_addr,
            state: StateHandle::new(ConnectionState::Connecting),
            transport: Box::new(transport),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Remote address, if the transport knows it
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Handle to this connection's state, for tasks that outlive a borrow
    pub fn state_handle(&self) -> StateHandle {
        self.state.clone()
    }

    /// Handshake completed: `Connecting` -> `Open`
    pub fn mark_open(&self) -> bool {
        self.state
            .transition(ConnectionState::Connecting, ConnectionState::Open)
    }

    /// Mark the connection `Closed`, returning the previous state
    pub fn mark_closed(&self) -> ConnectionState {
        self.state.close()
    }

    /// Queue a payload for this client
    pub fn send(&self, payload: Payload) -> TransportResult<()> {
        self.transport.send(payload)
    }

    /// Start a server-initiated close: `Open` -> `Closing`
    pub fn close(&self) -> TransportResult<()> {
        self.state
            .transition(ConnectionState::Open, ConnectionState::Closing);
        self.transport.close()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.peer_addr {
            Some(addr) => write!(f, "{} ({})", addr, self.id),
            None => write!(f, "{}", self.id),
        }
    }
}
