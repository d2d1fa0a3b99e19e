//! Relay client module
//!
//! Client side of the relay, used by the `ws-relay-peer` binary and the
//! integration tests.

mod message;
mod relay_client;

pub use message::*;
pub use relay_client::*;
