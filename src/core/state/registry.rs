// src/core/state/registry.rs

//! The process-wide map from connection id to connection entity.

use super::client::{Connection, TransportKind};
use crate::core::id::ConnectionId;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

/// The single source of truth for "who is connected".
///
/// Backed by a sharded `DashMap`, so operations on one connection never wait
/// on room calls made for another. Presence in this map, not memory
/// reclamation, is what makes a connection alive.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Arc<Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Inserts or overwrites the entry for `conn.id()`, returning the entry it
    /// replaced, if any.
    pub fn insert(&self, conn: Arc<Connection>) -> Option<Arc<Connection>> {
        self.connections.insert(conn.id().clone(), conn)
    }

    /// Removes and returns the entry for `id`. Removing an absent id is a no-op.
    pub fn remove(&self, id: &ConnectionId) -> Option<Arc<Connection>> {
        self.connections.remove(id).map(|(_, conn)| conn)
    }

    /// Removes the entry for `conn.id()` only if it still points at `conn`.
    pub fn remove_entity(&self, conn: &Arc<Connection>) -> bool {
        self.connections
            .remove_if(conn.id(), |_, current| Arc::ptr_eq(current, conn))
            .is_some()
    }

    pub fn get(&self, id: &ConnectionId) -> Option<Arc<Connection>> {
        self.connections.get(id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    /// True if the registry holds exactly this entity under its id.
    pub fn holds(&self, conn: &Arc<Connection>) -> bool {
        self.connections
            .get(conn.id())
            .is_some_and(|entry| Arc::ptr_eq(entry.value(), conn))
    }

    pub fn size(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        self.connections.iter().map(|e| e.key().clone()).collect()
    }

    /// Clones out every registered connection. No shard lock is held once this
    /// returns.
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections.iter().map(|e| e.value().clone()).collect()
    }

    pub fn count_by_kind(&self) -> HashMap<TransportKind, usize> {
        let mut counts = HashMap::new();
        for entry in self.connections.iter() {
            *counts.entry(entry.value().kind().clone()).or_insert(0) += 1;
        }
        counts
    }
}
