//! Distance-based interest
//!
//! An entity is visible to a connection when the connection's controlled
//! entity is strictly closer than the entity's visibility range. There are
//! no partitions to diff, so every interval rebuilds every spawned entity.

use crate::strategy::{observers, InterestManagement, RebuildSink, TickReport};
use log::trace;
use sightline_core::{ConnectionId, EntityId, EntityRecord, IntervalTimer, Registry};
use std::collections::HashSet;

/// Default visibility radius
pub const DEFAULT_VIS_RANGE: f32 = 500.0;

/// Distance interest management
#[derive(Debug, Clone)]
pub struct DistanceInterest {
    vis_range: f32,
    timer: IntervalTimer,
}

impl DistanceInterest {
    /// Create a strategy with a global radius, rebuilding every
    /// `rebuild_interval` seconds
    pub fn new(vis_range: f32, rebuild_interval: f64) -> Self {
        Self {
            vis_range,
            timer: IntervalTimer::new(rebuild_interval),
        }
    }

    pub fn vis_range(&self) -> f32 {
        self.vis_range
    }

    /// Radius for one entity: its own override or the global default
    pub fn range_of(&self, record: &EntityRecord) -> f32 {
        record.tags.vis_range.unwrap_or(self.vis_range)
    }

    fn sees(&self, record: &EntityRecord, observer: &EntityRecord) -> bool {
        record.pose.position.distance(observer.pose.position) < self.range_of(record)
    }
}

impl Default for DistanceInterest {
    fn default() -> Self {
        Self::new(DEFAULT_VIS_RANGE, 1.0)
    }
}

impl InterestManagement for DistanceInterest {
    fn name(&self) -> &'static str {
        "distance"
    }

    fn on_spawned(&mut self, _entity: EntityId, _registry: &dyn Registry) {}

    fn on_destroyed(&mut self, _entity: EntityId) {}

    fn check_observer(
        &self,
        entity: EntityId,
        connection: ConnectionId,
        registry: &dyn Registry,
    ) -> bool {
        match (registry.entity(entity), registry.observer_entity(connection)) {
            (Some(record), Some(observer)) => self.sees(record, observer),
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
        if let Some(record) = registry.entity(entity) {
            out.extend(
                observers(registry)
                    .filter(|(_, observer)| self.sees(record, observer))
                    .map(|(connection, _)| connection),
            );
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

        let mut scratch = HashSet::new();
        let mut rebuilt = 0;
        for record in registry.entities() {
            self.rebuild_observers(record.id, registry, &mut scratch);
            sink.rebuild_observers(record.id, &scratch);
            rebuilt += 1;
        }
        trace!("distance interest: rebuilt {} entities", rebuilt);
        TickReport {
            rebuilt,
            dirty_partitions: 0,
        }
    }
}
