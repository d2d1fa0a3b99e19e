//! Peer demo messages
//!
//! The relay never looks inside payloads; this JSON envelope is only a
//! convention between `ws-relay-peer` instances so they can tell who said what.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::relay::Payload;

/// A chat line tagged with the sending peer's id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeerMessage {
    /// Random id chosen by each peer at startup
    pub peer_id: Uuid,
    /// Message text
    pub body: String,
}

impl PeerMessage {
    pub fn new(peer_id: Uuid, body: impl Into<String>) -> Self {
        Self {
            peer_id,
            body: body.into(),
        }
    }

    /// Encode as a text payload
    pub fn to_payload(&self) -> serde_json::Result<Payload> {
        Ok(Payload::Text(serde_json::to_string(self)?))
    }

    /// Decode a text payload sent by another peer
    ///
    /// Returns `None` for binary payloads and for text that is not a peer
    /// message (such as the server greeting).
    pub fn from_payload(payload: &Payload) -> Option<Self> {
        match payload {
            Payload::Text(text) => serde_json::from_str(text).ok(),
            Payload::Binary(_) => None,
        }
    }
}
