//! Broadcast engine
//!
//! Reacts to connection lifecycle events: registers new connections and
//! greets them, fans every inbound payload out to all other open connections,
//! and unregisters connections when they close or fail.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{Connection, ConnectionRegistry, Payload};

/// Text sent to every client right after it connects
pub const GREETING: &str = "hello from server";

/// Outcome of relaying one payload
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FanoutReport {
    /// Peers the payload was queued for
    pub delivered: usize,
    /// Peers skipped because they were not open
    pub skipped: usize,
    /// Peers whose transport rejected the payload
    pub failed: usize,
}

/// Relays payloads between the connections of one registry
pub struct BroadcastEngine {
    registry: Arc<ConnectionRegistry>,
}

impl BroadcastEngine {
    /// Create an engine over the given registry
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Number of connections currently eligible for broadcast
    pub async fn connection_count(&self) -> usize {
        self.registry.len().await
    }

    /// A client connected: register it and send it the greeting
    ///
    /// A failed greeting leaves the connection registered; the transport
    /// reports the underlying failure through the connection's own error path.
    pub async fn on_connect(&self, connection: &Arc<Connection>) {
        if self.registry.add(connection).await {
            info!("Client connected: {}", connection);
        } else {
            debug!("Client {} already registered", connection);
        }

        match connection.send(Payload::text(GREETING)) {
            Ok(()) => debug!("Sent greeting to {}", connection),
            Err(e) => warn!("Failed to send greeting to {}: {}", connection, e),
        }
    }

    /// A client sent a payload: relay it to every other open connection
    ///
    /// Never fails. Closed peers are skipped and a peer whose send fails is
    /// counted and logged without affecting delivery to the others.
    pub async fn on_message(&self, sender: &Connection, payload: Payload) -> FanoutReport {
        if let Payload::Text(text) = &payload {
            debug!("[client] {}", text);
        }

        let mut report = FanoutReport::default();
        self.registry
            .for_each_except(sender, |peer| {
                if !peer.is_open() {
                    report.skipped += 1;
                    return;
                }
                match peer.send(payload.clone()) {
                    Ok(()) => report.delivered += 1,
                    Err(e) => {
                        report.failed += 1;
                        warn!("Failed to relay {} from {} to {}: {}", payload, sender, peer, e);
                    }
                }
            })
            .await;

        debug!(
            "Relayed {} from {}: delivered={}, skipped={}, failed={}",
            payload, sender, report.delivered, report.skipped, report.failed
        );
        report
    }

    /// A client disconnected: mark it closed and unregister it
    ///
    /// Returns false if it had already been unregistered.
    pub async fn on_disconnect(&self, connection: &Connection) -> bool {
        connection.mark_closed();
        let removed = self.registry.remove(connection).await;
        if removed {
            info!("Client disconnected: {}", connection);
        }
        removed
    }

    /// A client's transport failed: report it, then unregister the client
    pub async fn on_error(&self, connection: &Connection, err: impl fmt::Display) -> bool {
        warn!("Connection error from {}: {}", connection, err);
        self.on_disconnect(connection).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::testutil::{FailingTransport, RecordingTransport, Sent};
    use crate::relay::{ConnectionState, Transport};

    fn engine() -> BroadcastEngine {
        BroadcastEngine::new(Arc::new(ConnectionRegistry::new()))
    }

    fn open_connection(transport: impl Transport + 'static) -> Arc<Connection> {
        let connection = Arc::new(Connection::new(None, transport));
        connection.mark_open();
        connection
    }

    fn recording() -> (Arc<Connection>, Sent) {
        let (transport, sent) = RecordingTransport::new();
        (open_connection(transport), sent)
    }

    fn greeting() -> Payload {
        Payload::text(GREETING)
    }

    #[tokio::test]
    async fn test_on_connect_registers_and_greets() {
        let engine = engine();
        let (a, sent) = recording();

        engine.on_connect(&a).await;

        assert!(engine.registry().contains(a.id()).await);
        assert_eq!(sent.payloads(), vec![greeting()]);
    }

    #[tokio::test]
    async fn test_failed_greeting_keeps_registration() {
        let engine = engine();
        let a = open_connection(FailingTransport);

        engine.on_connect(&a).await;

        assert!(engine.registry().contains(a.id()).await);
        assert_eq!(engine.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_sender_is_excluded() {
        let engine = engine();
        let (a, sent_a) = recording();
        let (b, sent_b) = recording();
        let (c, sent_c) = recording();
        for conn in [&a, &b, &c] {
            engine.on_connect(conn).await;
        }

        let report = engine.on_message(&a, Payload::text("ping")).await;

        assert_eq!(report.delivered, 2);
        assert_eq!(sent_a.payloads(), vec![greeting()]);
        assert_eq!(sent_b.payloads(), vec![greeting(), Payload::text("ping")]);
        assert_eq!(sent_c.payloads(), vec![greeting(), Payload::text("ping")]);
    }

    #[tokio::test]
    async fn test_classification_is_preserved() {
        let engine = engine();
        let (a, _sent_a) = recording();
        let (b, sent_b) = recording();
        engine.on_connect(&a).await;
        engine.on_connect(&b).await;

        let payloads = [
            Payload::binary(vec![0x01, 0x02]),
            Payload::binary(Vec::new()),
            Payload::text(""),
            Payload::text("{\"not\": \"parsed\"}"),
        ];
        for payload in payloads.iter().cloned() {
            engine.on_message(&a, payload).await;
        }

        let all = sent_b.payloads();
        let received = &all[1..];
        assert_eq!(received, payloads.as_slice());
        assert!(received[0].is_binary());
        assert!(received[1].is_binary());
        assert!(!received[2].is_binary());
    }

    #[tokio::test]
    async fn test_non_open_peers_are_skipped() {
        let engine = engine();
        let (a, _sent_a) = recording();
        let (b, sent_b) = recording();
        let (c, sent_c) = recording();
        for conn in [&a, &b, &c] {
            engine.on_connect(conn).await;
        }

        // Still registered, but already closing
        b.close().unwrap();
        assert_eq!(b.state(), ConnectionState::Closing);

        let report = engine.on_message(&a, Payload::text("ping")).await;

        assert_eq!(
            report,
            FanoutReport {
                delivered: 1,
                skipped: 1,
                failed: 0
            }
        );
        assert_eq!(sent_b.count(), 1);
        assert_eq!(sent_c.count(), 2);
    }

    #[tokio::test]
    async fn test_send_failure_is_isolated() {
        let engine = engine();
        let (a, sent_a) = recording();
        let broken = open_connection(FailingTransport);
        let (c, sent_c) = recording();
        let (d, sent_d) = recording();
        for conn in [&a, &broken, &c, &d] {
            engine.on_connect(conn).await;
        }

        let report = engine.on_message(&a, Payload::text("ping")).await;

        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(sent_c.payloads().last(), Some(&Payload::text("ping")));
        assert_eq!(sent_d.payloads().last(), Some(&Payload::text("ping")));
        assert_eq!(sent_a.count(), 1);
        // The sender and the broken peer both stay registered
        assert!(a.is_open());
        assert_eq!(engine.connection_count().await, 4);
    }

    #[tokio::test]
    async fn test_disconnected_peer_receives_nothing() {
        let engine = engine();
        let (a, sent_a) = recording();
        let (b, sent_b) = recording();
        engine.on_connect(&a).await;
        engine.on_connect(&b).await;

        assert!(engine.on_disconnect(&b).await);
        assert_eq!(b.state(), ConnectionState::Closed);

        for _ in 0..3 {
            engine.on_message(&a, Payload::text("again")).await;
        }
        assert_eq!(sent_b.count(), 1);

        engine.on_message(&b, Payload::text("late")).await;
        assert_eq!(sent_a.payloads().last(), Some(&Payload::text("late")));
    }

    #[tokio::test]
    async fn test_late_joiner_receives_later_messages() {
        let engine = engine();
        let (a, _sent_a) = recording();
        engine.on_connect(&a).await;
        engine.on_message(&a, Payload::text("before")).await;

        let (b, sent_b) = recording();
        engine.on_connect(&b).await;
        engine.on_message(&a, Payload::text("after")).await;

        assert_eq!(sent_b.payloads(), vec![greeting(), Payload::text("after")]);
    }

    #[tokio::test]
    async fn test_double_teardown_is_idempotent() {
        let engine = engine();
        let (a, _sent_a) = recording();
        let (b, _sent_b) = recording();
        engine.on_connect(&a).await;
        engine.on_connect(&b).await;

        assert!(engine.on_disconnect(&b).await);
        assert!(!engine.on_error(&b, "connection reset").await);
        assert_eq!(engine.connection_count().await, 1);

        assert!(engine.on_error(&a, "protocol violation").await);
        assert!(!engine.on_disconnect(&a).await);
        assert_eq!(engine.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_single_connection_broadcasts_to_nobody() {
        let engine = engine();
        let (a, sent_a) = recording();
        engine.on_connect(&a).await;

        let report = engine.on_message(&a, Payload::text("alone")).await;

        assert_eq!(report, FanoutReport::default());
        assert_eq!(sent_a.count(), 1);
    }

    #[tokio::test]
    async fn test_per_sender_order_is_preserved() {
        let engine = engine();
        let (a, _sent_a) = recording();
        let (b, sent_b) = recording();
        engine.on_connect(&a).await;
        engine.on_connect(&b).await;

        let expected: Vec<Payload> = (0..50).map(|i| Payload::text(i.to_string())).collect();
        for payload in expected.iter().cloned() {
            engine.on_message(&a, payload).await;
        }

        assert_eq!(&sent_b.payloads()[1..], expected.as_slice());
    }
}
