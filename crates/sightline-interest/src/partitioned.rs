//! Generic key-partitioned interest management
//!
//! Scene, team and match interest all follow one rule: an entity is visible
//! to a connection iff both sit in the same partition. They differ only in
//! how a partition key is read off an entity, which a [`Partitioner`]
//! supplies.
//!
//! Each tick:
//! 1. Every spawned entity's current key is compared with its last known one;
//!    moves mark the old and new partition dirty
//! 2. Observers whose controlled entity changed partition do the same
//! 3. Every member of every dirty partition is rebuilt through the sink
//! 4. The dirty set is cleared
//!
//! A world where nothing moves between partitions costs one scan and no
//! rebuilds.

use crate::partition::PartitionTable;
use crate::strategy::{observers, InterestManagement, RebuildSink, TickReport};
use log::debug;
use sightline_core::{ConnectionId, EntityId, EntityRecord, IntervalTimer, Registry};
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

/// Reads the partition key of an entity
pub trait Partitioner: Send {
    type Key: Clone + Eq + Hash + Debug + Send;

    /// Strategy name for logs
    const NAME: &'static str;

    /// The entity's partition, `None` for "in no partition"
    fn key(&self, record: &EntityRecord) -> Option<Self::Key>;

    /// Entities visible to every observer regardless of partition
    fn force_shown(&self, _record: &EntityRecord) -> bool {
        false
    }
}

/// Interest management over a [`Partitioner`]'s keys
#[derive(Debug)]
pub struct PartitionedInterest<P: Partitioner> {
    partitioner: P,
    table: PartitionTable<P::Key>,
    timer: IntervalTimer,
    /// Force-shown entities
    forced: HashSet<EntityId>,
    /// Force-shown entities need a rebuild
    forced_dirty: bool,
    /// Entities whose own membership changed since the last tick
    pending: HashSet<EntityId>,
    /// Partition of each observer's controlled entity at the last tick
    observer_keys: HashMap<ConnectionId, P::Key>,
    /// Every eligible observer at the last tick
    all_observers: HashSet<ConnectionId>,
}

impl<P: Partitioner + Default> PartitionedInterest<P> {
    /// Create a strategy that rebuilds at most every `rebuild_interval` seconds
    pub fn new(rebuild_interval: f64) -> Self {
        Self::with_partitioner(P::default(), rebuild_interval)
    }
}

impl<P: Partitioner> PartitionedInterest<P> {
    pub fn with_partitioner(partitioner: P, rebuild_interval: f64) -> Self {
        Self {
            partitioner,
            table: PartitionTable::new(),
            timer: IntervalTimer::new(rebuild_interval),
            forced: HashSet::new(),
            forced_dirty: false,
            pending: HashSet::new(),
            observer_keys: HashMap::new(),
            all_observers: HashSet::new(),
        }
    }

    pub fn rebuild_interval(&self) -> f64 {
        self.timer.interval()
    }

    /// The partition membership table
    pub fn table(&self) -> &PartitionTable<P::Key> {
        &self.table
    }

    /// Last known partition of `entity`
    pub fn partition_of(&self, entity: EntityId) -> Option<&P::Key> {
        self.table.partition_of(entity)
    }

    fn track(&mut self, record: &EntityRecord) {
        let key = self.partitioner.key(record);
        if self.table.assign(record.id, key.clone()) {
            debug!("{} interest: {} -> {:?}", P::NAME, record.id, key);
            self.pending.insert(record.id);
        }

        let forced = self.partitioner.force_shown(record);
        if forced != self.forced.contains(&record.id) {
            if forced {
                self.forced.insert(record.id);
            } else {
                self.forced.remove(&record.id);
            }
            self.forced_dirty = true;
            self.pending.insert(record.id);
        }
    }

    fn forget(&mut self, entity: EntityId) {
        self.table.remove(entity);
        self.forced.remove(&entity);
        self.pending.remove(&entity);
    }

    /// Refresh the observer snapshot, marking partitions whose observers changed
    fn refresh_observers(&mut self, registry: &dyn Registry) {
        let mut keys = HashMap::new();
        let mut all = HashSet::new();
        for (connection, entity) in observers(registry) {
            all.insert(connection);
            if let Some(key) = self.partitioner.key(entity) {
                keys.insert(connection, key);
            }
        }

        for (connection, key) in &keys {
            let previous = self.observer_keys.get(connection);
            if previous != Some(key) {
                self.table.mark_dirty(key.clone());
                if let Some(previous) = previous {
                    self.table.mark_dirty(previous.clone());
                }
            }
        }
        for (connection, previous) in &self.observer_keys {
            if !keys.contains_key(connection) {
                self.table.mark_dirty(previous.clone());
            }
        }

        if all != self.all_observers {
            self.forced_dirty = true;
        }
        self.observer_keys = keys;
        self.all_observers = all;
    }
}

impl<P: Partitioner> InterestManagement for PartitionedInterest<P> {
    fn name(&self) -> &'static str {
        P::NAME
    }

    fn on_spawned(&mut self, entity: EntityId, registry: &dyn Registry) {
        if let Some(record) = registry.entity(entity) {
            self.track(record);
        }
    }

    fn on_destroyed(&mut self, entity: EntityId) {
        self.forget(entity);
    }

    fn check_observer(
        &self,
        entity: EntityId,
        connection: ConnectionId,
        registry: &dyn Registry,
    ) -> bool {
        let (Some(record), Some(observer)) =
            (registry.entity(entity), registry.observer_entity(connection))
        else {
            return false;
        };
        if self.partitioner.force_shown(record) {
            return true;
        }
        match (self.partitioner.key(record), self.partitioner.key(observer)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    fn rebuild_observers(
        &self,
        entity: EntityId,
        registry: &dyn Registry,
        out: &mut HashSet<ConnectionId>,
    ) {
        out.clear();
        let Some(record) = registry.entity(entity) else {
            return;
        };
        if self.partitioner.force_shown(record) {
            out.extend(observers(registry).map(|(connection, _)| connection));
            return;
        }
        let Some(key) = self.partitioner.key(record) else {
            return;
        };
        for (connection, observer) in observers(registry) {
            if self.partitioner.key(observer).as_ref() == Some(&key) {
                out.insert(connection);
            }
        }
    }

    fn tick(
        &mut self,
        now: f64,
        registry: &dyn Registry,
        sink: &mut dyn RebuildSink,
    ) -> TickReport {
        if !self.timer.ready(now) {
            return TickReport::default();
        }

        let mut seen = HashSet::new();
        for record in registry.entities() {
            seen.insert(record.id);
            self.track(record);
        }
        let stale: Vec<EntityId> = self.table.tracked().filter(|id| !seen.contains(id)).collect();
        for entity in stale {
            self.forget(entity);
        }
        self.forced.retain(|id| seen.contains(id));

        self.refresh_observers(registry);

        let dirty = self.table.take_dirty();
        let mut targets: HashSet<EntityId> = std::mem::take(&mut self.pending);
        for key in &dirty {
            targets.extend(self.table.members(key));
        }
        if self.forced_dirty {
            targets.extend(self.forced.iter().copied());
            self.forced_dirty = false;
        }
        let mut targets: Vec<EntityId> = targets.into_iter().filter(|id| seen.contains(id)).collect();
        targets.sort();

        let mut by_key: HashMap<&P::Key, HashSet<ConnectionId>> = HashMap::new();
        for (connection, key) in &self.observer_keys {
            by_key.entry(key).or_default().insert(*connection);
        }
        let nobody = HashSet::new();

        for &entity in &targets {
            let forced = self.forced.contains(&entity);
            let set = if forced {
                &self.all_observers
            } else {
                self.table
                    .partition_of(entity)
                    .and_then(|key| by_key.get(key))
                    .unwrap_or(&nobody)
            };
            sink.rebuild_observers(entity, set);
        }

        if !dirty.is_empty() || !targets.is_empty() {
            debug!(
                "{} interest: {} dirty partition(s), rebuilt {} entities",
                P::NAME,
                dirty.len(),
                targets.len()
            );
        }
        TickReport {
            rebuilt: targets.len(),
            dirty_partitions: dirty.len(),
        }
    }
}
