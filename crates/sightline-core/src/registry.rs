//! Read access to spawned entities and live connections
//!
//! Interest strategies and the replication driver never own the world; they
//! read it through [`Registry`]. [`World`] is the in-process implementation
//! used by hosts that keep entities and connections in memory.

use crate::{
    Authority, ConnectionId, ConnectionRecord, ConnectionRegistry, EntityId, EntityRecord,
    EntityStore, Error, Pose, Result,
};

/// Entity/connection registry consumed by interest management and replication
pub trait Registry {
    /// Look up a spawned entity
    fn entity(&self, id: EntityId) -> Option<&EntityRecord>;

    /// All spawned entities, in a stable order
    fn entities(&self) -> Box<dyn Iterator<Item = &EntityRecord> + '_>;

    /// Look up a live connection
    fn connection(&self, id: ConnectionId) -> Option<&ConnectionRecord>;

    /// All live connections, in a stable order
    fn connections(&self) -> Box<dyn Iterator<Item = &ConnectionRecord> + '_>;

    /// The entity a connection observes from
    ///
    /// `None` when the connection is unknown, unauthenticated, has no
    /// controlled entity, or that entity has been despawned.
    fn observer_entity(&self, conn: ConnectionId) -> Option<&EntityRecord> {
        let id = self.connection(conn)?.observer_entity()?;
        self.entity(id)
    }

    /// Whether `conn` exists and is authenticated
    fn is_authenticated(&self, conn: ConnectionId) -> bool {
        self.connection(conn).is_some_and(|c| c.authenticated)
    }
}

/// Registry that also lets replication write live poses back
pub trait RegistryMut: Registry {
    /// Overwrite the live pose of a spawned entity
    fn set_pose(&mut self, id: EntityId, pose: Pose) -> Result<()>;

    /// Change who drives an entity's transform
    fn set_authority(
        &mut self,
        id: EntityId,
        authority: Authority,
        owner: Option<ConnectionId>,
    ) -> Result<()>;
}

/// In-memory world: entity store plus connection registry
#[derive(Debug, Clone, Default)]
pub struct World {
    pub entities: EntityStore,
    pub connections: ConnectionRegistry,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Registry for World {
    fn entity(&self, id: EntityId) -> Option<&EntityRecord> {
        self.entities.get(id)
    }

    fn entities(&self) -> Box<dyn Iterator<Item = &EntityRecord> + '_> {
        Box::new(self.entities.iter())
    }

    fn connection(&self, id: ConnectionId) -> Option<&ConnectionRecord> {
        self.connections.get(id)
    }

    fn connections(&self) -> Box<dyn Iterator<Item = &ConnectionRecord> + '_> {
        Box::new(self.connections.iter())
    }
}

impl RegistryMut for World {
    fn set_pose(&mut self, id: EntityId, pose: Pose) -> Result<()> {
        let entity = self.entities.get_mut(id).ok_or(Error::EntityNotFound(id))?;
        entity.pose = pose;
        Ok(())
    }

    fn set_authority(
        &mut self,
        id: EntityId,
        authority: Authority,
        owner: Option<ConnectionId>,
    ) -> Result<()> {
        let entity = self.entities.get_mut(id).ok_or(Error::EntityNotFound(id))?;
        entity.authority = authority;
        entity.owner = owner;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_observer_entity_resolution() {
        let mut world = World::new();
        let player = world.entities.spawn(Pose::at(Vec3::new(1.0, 0.0, 0.0))).id;
        world
            .connections
            .insert(ConnectionRecord::new(ConnectionId(1)).controlling(player));
        world.connections.insert(ConnectionRecord::new(ConnectionId(2)));

        assert_eq!(
            world.observer_entity(ConnectionId(1)).map(|e| e.id),
            Some(player)
        );
        assert!(world.observer_entity(ConnectionId(2)).is_none());
        assert!(world.observer_entity(ConnectionId(3)).is_none());

        world.entities.remove(player);
        assert!(world.observer_entity(ConnectionId(1)).is_none());
    }

    #[test]
    fn test_is_authenticated() {
        let mut world = World::new();
        let mut record = ConnectionRecord::new(ConnectionId(5));
        record.authenticated = false;
        world.connections.insert(record);

        assert!(!world.is_authenticated(ConnectionId(5)));
        assert!(!world.is_authenticated(ConnectionId(6)));
    }

    #[test]
    fn test_set_pose() {
        let mut world = World::new();
        let id = world.entities.spawn(Pose::IDENTITY).id;

        world.set_pose(id, Pose::at(Vec3::Y)).unwrap();
        assert_eq!(world.entity(id).map(|e| e.pose.position), Some(Vec3::Y));

        let missing = world.set_pose(EntityId(99), Pose::IDENTITY);
        assert!(matches!(missing, Err(Error::EntityNotFound(EntityId(99)))));
    }

    #[test]
    fn test_set_authority() {
        let mut world = World::new();
        let id = world.entities.spawn(Pose::IDENTITY).id;

        world
            .set_authority(id, Authority::Client, Some(ConnectionId(4)))
            .unwrap();
        let record = world.entity(id).unwrap();
        assert!(record.is_client_authoritative());
        assert_eq!(record.owner, Some(ConnectionId(4)));

        world.set_authority(id, Authority::Server, None).unwrap();
        assert!(!world.entity(id).unwrap().is_client_authoritative());
        assert!(world
            .set_authority(EntityId(99), Authority::Server, None)
            .is_err());
    }
}
