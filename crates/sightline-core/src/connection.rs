//! Connection records as exposed by the transport

use crate::{ConnectionId, EntityId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A remote peer endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub id: ConnectionId,
    /// Only authenticated connections may observe entities
    pub authenticated: bool,
    /// The entity this connection controls (its "player"), if any
    pub controlled: Option<EntityId>,
}

impl ConnectionRecord {
    /// Create an authenticated connection without a controlled entity
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            authenticated: true,
            controlled: None,
        }
    }

    /// Set the controlled entity
    pub fn controlling(mut self, entity: EntityId) -> Self {
        self.controlled = Some(entity);
        self
    }

    /// The controlled entity if this connection can observe anything at all
    pub fn observer_entity(&self) -> Option<EntityId> {
        if self.authenticated {
            self.controlled
        } else {
            None
        }
    }
}

/// Registry of live connections
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    connections: IndexMap<ConnectionId, ConnectionRecord>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection, replacing any previous record with the same ID
    pub fn insert(&mut self, record: ConnectionRecord) -> Option<ConnectionRecord> {
        self.connections.insert(record.id, record)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&ConnectionRecord> {
        self.connections.get(&id)
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut ConnectionRecord> {
        self.connections.get_mut(&id)
    }

    /// Drop a connection
    pub fn remove(&mut self, id: ConnectionId) -> Option<ConnectionRecord> {
        self.connections.shift_remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConnectionRecord> {
        self.connections.values()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
