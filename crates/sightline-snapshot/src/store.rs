//! Snapshot buffers keyed by entity and direction

use crate::buffer::SnapshotBuffer;
use crate::SnapshotSettings;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sightline_core::EntityId;

/// Which side's state a buffer holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    /// Held on the server, fed by a client-authoritative entity's owner
    ServerHeld,
    /// Held on a client, fed by server broadcasts
    ClientHeld,
}

/// Identifies one snapshot buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BufferKey {
    pub entity: EntityId,
    pub direction: Direction,
}

impl BufferKey {
    pub fn new(entity: EntityId, direction: Direction) -> Self {
        Self { entity, direction }
    }
}

/// All snapshot buffers of one peer
///
/// Buffers are created lazily on first write and share the store's limit
/// and extrapolation cap.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    buffers: IndexMap<BufferKey, SnapshotBuffer>,
    limit: usize,
    extrapolation_limit: Option<f64>,
}

impl SnapshotStore {
    pub fn new(settings: &SnapshotSettings) -> Self {
        Self {
            buffers: IndexMap::new(),
            limit: settings.buffer_limit,
            extrapolation_limit: settings.extrapolation_limit,
        }
    }

    pub fn get(&self, key: BufferKey) -> Option<&SnapshotBuffer> {
        self.buffers.get(&key)
    }

    /// Get a buffer, creating it if absent
    pub fn buffer_mut(&mut self, key: BufferKey) -> &mut SnapshotBuffer {
        let (limit, extrapolation) = (self.limit, self.extrapolation_limit);
        self.buffers
            .entry(key)
            .or_insert_with(|| SnapshotBuffer::new(limit).with_extrapolation_limit(extrapolation))
    }

    /// Clear one buffer, keeping its allocation
    pub fn reset(&mut self, key: BufferKey) {
        if let Some(buffer) = self.buffers.get_mut(&key) {
            buffer.reset();
        }
    }

    pub fn remove(&mut self, key: BufferKey) -> Option<SnapshotBuffer> {
        self.buffers.shift_remove(&key)
    }

    /// Drop every buffer belonging to `entity`
    pub fn remove_entity(&mut self, entity: EntityId) {
        self.buffers.retain(|key, _| key.entity != entity);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BufferKey, &SnapshotBuffer)> {
        self.buffers.iter()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Total snapshots buffered across all keys
    pub fn snapshot_count(&self) -> usize {
        self.buffers.values().map(SnapshotBuffer::len).sum()
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(&SnapshotSettings::default())
    }
}
