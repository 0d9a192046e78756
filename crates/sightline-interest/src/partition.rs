//! Partition membership tables with dirty tracking
//!
//! Partitioned strategies group entities by a key (scene, team, match). The
//! table keeps both directions of the mapping and remembers which partitions
//! changed since the last rebuild:
//!
//! ```text
//!   members:     key ──▶ {entities}
//!   last_known:  entity ──▶ key
//!   dirty:       {keys touched since take_dirty()}
//! ```
//!
//! Every membership change is an atomic move: out of the old partition, into
//! the new one, both marked dirty.

use sightline_core::EntityId;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Bidirectional entity/partition mapping
#[derive(Debug, Clone)]
pub struct PartitionTable<K> {
    members: HashMap<K, HashSet<EntityId>>,
    last_known: HashMap<EntityId, K>,
    dirty: HashSet<K>,
}

impl<K: Clone + Eq + Hash> PartitionTable<K> {
    pub fn new() -> Self {
        Self {
            members: HashMap::new(),
            last_known: HashMap::new(),
            dirty: HashSet::new(),
        }
    }

    /// Move `entity` into partition `key`, or out of every partition when
    /// `key` is `None`
    ///
    /// Returns `true` if membership changed.
    pub fn assign(&mut self, entity: EntityId, key: Option<K>) -> bool {
        if self.last_known.get(&entity) == key.as_ref() {
            return false;
        }

        self.remove(entity);
        if let Some(key) = key {
            self.members.entry(key.clone()).or_default().insert(entity);
            self.dirty.insert(key.clone());
            self.last_known.insert(entity, key);
        }
        true
    }

    /// Take `entity` out of its partition, marking it dirty
    ///
    /// Returns the partition it was in, if any.
    pub fn remove(&mut self, entity: EntityId) -> Option<K> {
        let key = self.last_known.remove(&entity)?;
        if let Some(members) = self.members.get_mut(&key) {
            members.remove(&entity);
            if members.is_empty() {
                self.members.remove(&key);
            }
        }
        self.dirty.insert(key.clone());
        Some(key)
    }

    /// Mark a partition for rebuild without changing membership
    pub fn mark_dirty(&mut self, key: K) {
        self.dirty.insert(key);
    }

    /// Current partition of `entity`
    pub fn partition_of(&self, entity: EntityId) -> Option<&K> {
        self.last_known.get(&entity)
    }

    /// Members of a partition
    pub fn members(&self, key: &K) -> impl Iterator<Item = EntityId> + '_ {
        self.members.get(key).into_iter().flatten().copied()
    }

    /// Entities currently in some partition
    pub fn tracked(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.last_known.keys().copied()
    }

    pub fn is_dirty(&self, key: &K) -> bool {
        self.dirty.contains(key)
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// Drain the dirty set
    pub fn take_dirty(&mut self) -> Vec<K> {
        self.dirty.drain().collect()
    }

    /// Number of non-empty partitions
    pub fn partition_count(&self) -> usize {
        self.members.len()
    }

    /// Number of tracked entities
    pub fn len(&self) -> usize {
        self.last_known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_known.is_empty()
    }
}

impl<K: Clone + Eq + Hash> Default for PartitionTable<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_marks_new_partition_dirty() {
        let mut table = PartitionTable::new();
        assert!(table.assign(EntityId(1), Some("red")));
        assert!(table.is_dirty(&"red"));
        assert_eq!(table.partition_of(EntityId(1)), Some(&"red"));

        // Same key again is not a change
        table.take_dirty();
        assert!(!table.assign(EntityId(1), Some("red")));
        assert_eq!(table.dirty_count(), 0);
    }

    #[test]
    fn test_transition_marks_both_dirty() {
        let mut table = PartitionTable::new();
        table.assign(EntityId(1), Some(1u32));
        table.assign(EntityId(2), Some(1u32));
        table.take_dirty();

        assert!(table.assign(EntityId(1), Some(2)));
        let mut dirty = table.take_dirty();
        dirty.sort();
        assert_eq!(dirty, vec![1, 2]);

        assert_eq!(table.members(&1).collect::<Vec<_>>(), vec![EntityId(2)]);
        assert_eq!(table.members(&2).collect::<Vec<_>>(), vec![EntityId(1)]);
    }

    #[test]
    fn test_assign_none_leaves_partition() {
        let mut table = PartitionTable::new();
        table.assign(EntityId(1), Some(5u32));
        table.take_dirty();

        assert!(table.assign(EntityId(1), None));
        assert_eq!(table.take_dirty(), vec![5]);
        assert!(table.partition_of(EntityId(1)).is_none());
        assert_eq!(table.partition_count(), 0);

        // Untracked and staying untracked
        assert!(!table.assign(EntityId(1), None));
    }

    #[test]
    fn test_remove_untracked_is_noop() {
        let mut table: PartitionTable<u32> = PartitionTable::new();
        assert_eq!(table.remove(EntityId(42)), None);
        assert_eq!(table.dirty_count(), 0);
        assert!(table.is_empty());
    }
}
