//! Connection registry
//!
//! Tracks every connection eligible for broadcast. The registry only holds
//! `Weak` references: each connection is owned by its handler task, and an
//! entry whose connection has been dropped counts as absent.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use tokio::sync::RwLock;

use super::{Connection, ConnectionId};

/// Set of live connections, safe to mutate while a broadcast iterates it
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Weak<Connection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection
    ///
    /// Returns false if it was already registered.
    pub async fn add(&self, connection: &Arc<Connection>) -> bool {
        let mut connections = self.connections.write().await;
        connections.retain(|_, weak| weak.strong_count() > 0);

        if connections.contains_key(&connection.id()) {
            return false;
        }
        connections.insert(connection.id(), Arc::downgrade(connection));
        true
    }

    /// Unregister a connection
    ///
    /// Returns false if it was not registered, so a close and an error
    /// reported for the same connection remove it only once.
    pub async fn remove(&self, connection: &Connection) -> bool {
        self.connections
            .write()
            .await
            .remove(&connection.id())
            .is_some()
    }

    /// Call `f` for every registered connection other than `sender`
    ///
    /// Iterates a snapshot taken under a short read lock, so `add` and
    /// `remove` can proceed while `f` runs. Connections passed to `f` may
    /// have left the `Open` state since the snapshot; checking is up to `f`.
    pub async fn for_each_except<F>(&self, sender: &Connection, mut f: F)
    where
        F: FnMut(&Arc<Connection>),
    {
        let peers = self.snapshot_except(sender.id()).await;
        for peer in &peers {
            f(peer);
        }
    }

    async fn snapshot_except(&self, sender: ConnectionId) -> Vec<Arc<Connection>> {
        let connections = self.connections.read().await;
        connections
            .iter()
            .filter(|(id, _)| **id != sender)
            .filter_map(|(_, weak)| weak.upgrade())
            .collect()
    }

    /// Whether a connection with this id is registered and still alive
    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.connections
            .read()
            .await
            .get(&id)
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Number of registered, live connections
    pub async fn len(&self) -> usize {
        self.connections
            .read()
            .await
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
