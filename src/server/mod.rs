//! WebSocket server module
//!
//! Accepts WebSocket connections and plugs each one into the relay engine.

mod handler;
mod protocol;
mod websocket;

pub use handler::*;
pub use protocol::*;
pub use websocket::*;
