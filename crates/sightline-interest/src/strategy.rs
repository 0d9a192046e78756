//! The interest management contract
//!
//! A strategy decides, per entity, which connections observe it. The host
//! drives it with lifecycle hooks and a periodic [`tick`], and receives
//! freshly computed observer sets through a [`RebuildSink`].
//!
//! [`tick`]: InterestManagement::tick

use sightline_core::{ConnectionId, EntityId, EntityRecord, Registry};
use std::collections::HashSet;

/// Receives observer sets computed during a tick
pub trait RebuildSink {
    /// Replace the observer set of `entity`
    fn rebuild_observers(&mut self, entity: EntityId, observers: &HashSet<ConnectionId>);
}

/// What a tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    /// Entities whose observer sets were pushed to the sink
    pub rebuilt: usize,
    /// Partitions (or cells) that changed membership
    pub dirty_partitions: usize,
}

impl TickReport {
    /// True when the tick pushed nothing
    pub fn is_idle(&self) -> bool {
        self.rebuilt == 0
    }
}

/// Pluggable interest management strategy
///
/// Only authenticated connections with a controlled entity can observe.
/// Missing tags and unknown ids never error: they simply mean "not visible".
pub trait InterestManagement: Send {
    /// Short strategy name for logs
    fn name(&self) -> &'static str;

    /// An entity was spawned
    fn on_spawned(&mut self, entity: EntityId, registry: &dyn Registry);

    /// An entity was despawned
    ///
    /// Unknown entities are ignored.
    fn on_destroyed(&mut self, entity: EntityId);

    /// Whether `connection` should observe `entity` right now
    fn check_observer(
        &self,
        entity: EntityId,
        connection: ConnectionId,
        registry: &dyn Registry,
    ) -> bool;

    /// Compute the full observer set of `entity` into `out`
    ///
    /// `out` is cleared first.
    fn rebuild_observers(
        &self,
        entity: EntityId,
        registry: &dyn Registry,
        out: &mut HashSet<ConnectionId>,
    );

    /// Periodic update at local time `now`
    ///
    /// Does nothing until the strategy's rebuild interval has elapsed.
    fn tick(&mut self, now: f64, registry: &dyn Registry, sink: &mut dyn RebuildSink)
        -> TickReport;
}

/// Connections allowed to observe, paired with the entity they observe from
pub(crate) fn observers<'a>(
    registry: &'a dyn Registry,
) -> impl Iterator<Item = (ConnectionId, &'a EntityRecord)> + 'a {
    registry.connections().filter_map(move |connection| {
        let entity = registry.entity(connection.observer_entity()?)?;
        Some((connection.id, entity))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sightline_core::{ConnectionRecord, Pose, World};

    #[test]
    fn test_observers_require_authenticated_controller() {
        let mut world = World::new();
        let a = world.entities.spawn(Pose::IDENTITY).id;
        let b = world.entities.spawn(Pose::IDENTITY).id;

        world
            .connections
            .insert(ConnectionRecord::new(ConnectionId(1)).controlling(a));
        let mut pending = ConnectionRecord::new(ConnectionId(2)).controlling(b);
        pending.authenticated = false;
        world.connections.insert(pending);
        world.connections.insert(ConnectionRecord::new(ConnectionId(3)));
        world
            .connections
            .insert(ConnectionRecord::new(ConnectionId(4)).controlling(EntityId(99)));

        let found: Vec<_> = observers(&world).map(|(conn, e)| (conn, e.id)).collect();
        assert_eq!(found, vec![(ConnectionId(1), a)]);
    }
}
