//! Frame mapping
//!
//! The relay defines no message schema. Data frames map one-to-one onto
//! [`Payload`]s; control frames are handled by tungstenite and only surface
//! here so the connection loop can log them.

use tokio_tungstenite::tungstenite::Message;

use crate::relay::Payload;

/// What an inbound WebSocket frame means to the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// Data to fan out
    Payload(Payload),
    /// Client started the closing handshake
    Close,
    /// Ping, pong or raw frame
    Control(&'static str),
}

impl From<Message> for InboundFrame {
    fn from(message: Message) -> Self {
        match message {
            Message::Text(text) => InboundFrame::Payload(Payload::Text(text)),
            Message::Binary(data) => InboundFrame::Payload(Payload::Binary(data)),
            Message::Close(_) => InboundFrame::Close,
            Message::Ping(_) => InboundFrame::Control("ping"),
            Message::Pong(_) => InboundFrame::Control("pong"),
            Message::Frame(_) => InboundFrame::Control("raw frame"),
        }
    }
}

impl From<Payload> for Message {
    fn from(payload: Payload) -> Self {
        match payload {
            Payload::Text(text) => Message::Text(text),
            Payload::Binary(data) => Message::Binary(data),
        }
    }
}
