//! WebSocket message relay
//!
//! Every message a client sends is rebroadcast, unchanged and with its
//! text/binary classification, to every other connected client.
//!
//! - [`relay`]: connection registry and broadcast engine
//! - [`server`]: WebSocket accept loop and per-connection handler
//! - [`client`]: client used by the peer demo binary and tests

pub mod client;
pub mod relay;
pub mod server;
