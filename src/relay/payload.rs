//! Relayed message units
//!
//! A payload is opaque to the relay. It is forwarded byte-for-byte and keeps
//! the text/binary classification it arrived with.

use std::fmt;

/// A unit of data relayed between clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Text frame (UTF-8, as guaranteed by the WebSocket layer)
    Text(String),
    /// Binary frame
    Binary(Vec<u8>),
}

impl Payload {
    /// Create a text-classified payload
    pub fn text(text: impl Into<String>) -> Self {
        Payload::Text(text.into())
    }

    /// Create a binary-classified payload
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Payload::Binary(data.into())
    }

    /// Whether the payload is binary-classified
    pub fn is_binary(&self) -> bool {
        matches!(self, Payload::Binary(_))
    }

    /// Raw bytes of the payload
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Text(text) => text.as_bytes(),
            Payload::Binary(data) => data,
        }
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short name of the classification, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Text(_) => "text",
            Payload::Binary(_) => "binary",
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} payload ({} bytes)", self.kind(), self.len())
    }
}
