//! Entity records for network-visible objects

use crate::{ConnectionId, EntityId, MatchId, Pose, SceneId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Which side is the source of truth for an entity's transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Authority {
    /// The server simulates the entity and broadcasts it
    #[default]
    Server,
    /// The owning client simulates the entity and sends it to the server
    Client,
}

/// Optional per-entity interest configuration
///
/// Every field falls back to the active strategy's default when absent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InterestTags {
    /// Visibility radius override for distance-based strategies
    pub vis_range: Option<f32>,
    /// Team membership
    pub team: Option<String>,
    /// Visible to every observer regardless of team
    pub force_shown: bool,
    /// Match/session membership
    pub match_id: MatchId,
    /// Scene membership
    pub scene: Option<SceneId>,
}

impl InterestTags {
    /// Team string if present and non-empty
    pub fn team(&self) -> Option<&str> {
        self.team.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// A replicated entity as the registry sees it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Unique identifier for this entity
    pub id: EntityId,
    /// Live transform
    pub pose: Pose,
    /// Which side drives the transform
    pub authority: Authority,
    /// Connection that owns this entity, if any
    pub owner: Option<ConnectionId>,
    /// Interest tags
    pub tags: InterestTags,
}

impl EntityRecord {
    /// Create a server-authoritative entity at `pose`
    pub fn new(id: EntityId, pose: Pose) -> Self {
        Self {
            id,
            pose,
            authority: Authority::Server,
            owner: None,
            tags: InterestTags::default(),
        }
    }

    /// Assign an owning connection
    pub fn with_owner(mut self, owner: ConnectionId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Set the authority side
    pub fn with_authority(mut self, authority: Authority) -> Self {
        self.authority = authority;
        self
    }

    /// Replace the interest tags
    pub fn with_tags(mut self, tags: InterestTags) -> Self {
        self.tags = tags;
        self
    }

    /// Whether the owning client drives this entity
    pub fn is_client_authoritative(&self) -> bool {
        self.authority == Authority::Client && self.owner.is_some()
    }
}

/// Storage for all spawned entities
///
/// Iteration order is spawn order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityStore {
    entities: IndexMap<EntityId, EntityRecord>,
    next_id: u64,
}

impl EntityStore {
    /// Create a new empty entity store
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a new server-authoritative entity at `pose`
    pub fn spawn(&mut self, pose: Pose) -> &mut EntityRecord {
        let id = EntityId::new(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.entities
            .entry(id)
            .or_insert_with(|| EntityRecord::new(id, pose))
    }

    /// Insert a record with a caller-chosen ID, replacing any previous one
    pub fn insert(&mut self, record: EntityRecord) -> Option<EntityRecord> {
        self.next_id = self.next_id.max(record.id.raw().saturating_add(1));
        self.entities.insert(record.id, record)
    }

    /// Get an entity by ID
    pub fn get(&self, id: EntityId) -> Option<&EntityRecord> {
        self.entities.get(&id)
    }

    /// Get a mutable reference to an entity
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut EntityRecord> {
        self.entities.get_mut(&id)
    }

    /// Despawn an entity
    pub fn remove(&mut self, id: EntityId) -> Option<EntityRecord> {
        self.entities.shift_remove(&id)
    }

    /// Get all entity IDs
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    /// Get all entities
    pub fn iter(&self) -> impl Iterator<Item = &EntityRecord> {
        self.entities.values()
    }

    /// Get all entities mutably
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut EntityRecord> {
        self.entities.values_mut()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_spawn_assigns_sequential_ids() {
        let mut store = EntityStore::new();
        let a = store.spawn(Pose::IDENTITY).id;
        let b = store.spawn(Pose::IDENTITY).id;

        assert_eq!(a, EntityId(0));
        assert_eq!(b, EntityId(1));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_insert_bumps_next_id() {
        let mut store = EntityStore::new();
        store.insert(EntityRecord::new(EntityId(10), Pose::IDENTITY));
        let next = store.spawn(Pose::at(Vec3::X)).id;
        assert_eq!(next, EntityId(11));
    }

    #[test]
    fn test_insert_max_id_does_not_overflow() {
        let mut store = EntityStore::new();
        store.insert(EntityRecord::new(EntityId(u64::MAX), Pose::IDENTITY));
        assert_eq!(store.len(), 1);
        assert!(store.get(EntityId(u64::MAX)).is_some());
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut store = EntityStore::new();
        for _ in 0..4 {
            store.spawn(Pose::IDENTITY);
        }
        store.remove(EntityId(1));

        let ids: Vec<_> = store.ids().collect();
        assert_eq!(ids, vec![EntityId(0), EntityId(2), EntityId(3)]);
        assert!(store.remove(EntityId(1)).is_none());
    }

    #[test]
    fn test_blank_team_is_no_team() {
        let tags = InterestTags {
            team: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(tags.team(), None);

        let tags = InterestTags {
            team: Some("red".into()),
            ..Default::default()
        };
        assert_eq!(tags.team(), Some("red"));
    }

    #[test]
    fn test_tags_from_ron() {
        let tags: InterestTags = ron::from_str(r#"(team: Some("blue"), vis_range: Some(12.5))"#)
            .expect("tags should parse");
        assert_eq!(tags.team(), Some("blue"));
        assert_eq!(tags.vis_range, Some(12.5));
        assert!(tags.match_id.is_empty());
    }

    #[test]
    fn test_client_authority_requires_owner() {
        let record = EntityRecord::new(EntityId(1), Pose::IDENTITY).with_authority(Authority::Client);
        assert!(!record.is_client_authoritative());
        assert!(record.with_owner(ConnectionId(3)).is_client_authoritative());
    }
}
