//! Relay core
//!
//! The connection registry and the broadcast engine that fans each inbound
//! payload out to every other open connection. Nothing here knows about
//! sockets; the server plugs WebSocket connections in through [`Transport`].

mod connection;
mod engine;
mod payload;
mod registry;

#[cfg(test)]
pub(crate) mod testutil;

pub use connection::*;
pub use engine::*;
pub use payload::*;
pub use registry::*;
