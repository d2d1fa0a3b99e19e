//! Transport doubles for relay tests

use std::sync::{Arc, Mutex};

use super::{Payload, Transport, TransportError, TransportResult};

/// Payloads captured by a [`RecordingTransport`]
#[derive(Debug, Clone, Default)]
pub struct Sent {
    payloads: Arc<Mutex<Vec<Payload>>>,
    closes: Arc<Mutex<usize>>,
}

impl Sent {
    pub fn payloads(&self) -> Vec<Payload> {
        self.payloads.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.payloads.lock().unwrap().len()
    }

    pub fn closes(&self) -> usize {
        *self.closes.lock().unwrap()
    }
}

/// Transport that records every payload it is asked to send
pub struct RecordingTransport {
    sent: Sent,
}

impl RecordingTransport {
    pub fn new() -> (Self, Sent) {
        let sent = Sent::default();
        (Self { sent: sent.clone() }, sent)
    }
}

impl Transport for RecordingTransport {
    fn send(&self, payload: Payload) -> TransportResult<()> {
        self.sent.payloads.lock().unwrap().push(payload);
        Ok(())
    }

    fn close(&self) -> TransportResult<()> {
        *self.sent.closes.lock().unwrap() += 1;
        Ok(())
    }
}

/// Transport whose socket is already broken
pub struct FailingTransport;

impl Transport for FailingTransport {
    fn send(&self, _payload: Payload) -> TransportResult<()> {
        Err(TransportError::Failed("broken pipe".to_string()))
    }

    fn close(&self) -> TransportResult<()> {
        Err(TransportError::Closed)
    }
}
