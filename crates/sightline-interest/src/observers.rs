//! Observer bookkeeping and visibility diffs
//!
//! [`ObserverSets`] is the standard [`RebuildSink`]: it stores who observes
//! what and turns each rebuild into a [`VisibilityChange`] listing the
//! connections that gained or lost the entity. The transport layer drains
//! these to send spawns and despawns.

use crate::strategy::RebuildSink;
use sightline_core::{ConnectionId, EntityId};
use std::collections::{HashMap, HashSet};

/// Connections that started or stopped observing an entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityChange {
    pub entity: EntityId,
    /// Sorted
    pub added: Vec<ConnectionId>,
    /// Sorted
    pub removed: Vec<ConnectionId>,
}

/// Current observer sets in both directions
#[derive(Debug, Clone, Default)]
pub struct ObserverSets {
    observers: HashMap<EntityId, HashSet<ConnectionId>>,
    observing: HashMap<ConnectionId, HashSet<EntityId>>,
    changes: Vec<VisibilityChange>,
}

impl ObserverSets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connections observing `entity`
    pub fn observers_of(&self, entity: EntityId) -> impl Iterator<Item = ConnectionId> + '_ {
        self.observers.get(&entity).into_iter().flatten().copied()
    }

    /// Entities observed by `connection`
    pub fn observed_by(&self, connection: ConnectionId) -> impl Iterator<Item = EntityId> + '_ {
        self.observing.get(&connection).into_iter().flatten().copied()
    }

    pub fn is_observing(&self, connection: ConnectionId, entity: EntityId) -> bool {
        self.observers
            .get(&entity)
            .is_some_and(|set| set.contains(&connection))
    }

    pub fn observer_count(&self, entity: EntityId) -> usize {
        self.observers.get(&entity).map_or(0, HashSet::len)
    }

    /// Pending changes, oldest first
    pub fn changes(&self) -> &[VisibilityChange] {
        &self.changes
    }

    /// Take the pending changes
    pub fn drain_changes(&mut self) -> Vec<VisibilityChange> {
        std::mem::take(&mut self.changes)
    }

    /// Forget a despawned entity, recording the loss for its observers
    pub fn remove_entity(&mut self, entity: EntityId) {
        let Some(previous) = self.observers.remove(&entity) else {
            return;
        };
        for connection in &previous {
            if let Some(set) = self.observing.get_mut(connection) {
                set.remove(&entity);
            }
        }
        if !previous.is_empty() {
            self.changes.push(VisibilityChange {
                entity,
                added: Vec::new(),
                removed: sorted(previous),
            });
        }
    }

    /// Forget a disconnected connection
    ///
    /// No change is recorded: there is nobody left to tell.
    pub fn remove_connection(&mut self, connection: ConnectionId) {
        let Some(observed) = self.observing.remove(&connection) else {
            return;
        };
        for entity in observed {
            if let Some(set) = self.observers.get_mut(&entity) {
                set.remove(&connection);
            }
        }
    }
}

impl RebuildSink for ObserverSets {
    fn rebuild_observers(&mut self, entity: EntityId, observers: &HashSet<ConnectionId>) {
        let current = self.observers.entry(entity).or_default();
        let added: Vec<ConnectionId> = observers.difference(current).copied().collect();
        let removed: Vec<ConnectionId> = current.difference(observers).copied().collect();
        if added.is_empty() && removed.is_empty() {
            return;
        }

        current.clone_from(observers);
        for connection in &added {
            self.observing.entry(*connection).or_default().insert(entity);
        }
        for connection in &removed {
            if let Some(set) = self.observing.get_mut(connection) {
                set.remove(&entity);
            }
        }
        self.changes.push(VisibilityChange {
            entity,
            added: sorted(added),
            removed: sorted(removed),
        });
    }
}

fn sorted(ids: impl IntoIterator<Item = ConnectionId>) -> Vec<ConnectionId> {
    let mut ids: Vec<_> = ids.into_iter().collect();
    ids.sort();
    ids
}
