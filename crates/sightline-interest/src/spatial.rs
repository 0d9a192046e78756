//! Spatial hash interest
//!
//! Positions are projected onto a 2D grid whose cells are a third of the
//! visibility range, and an entity is visible to every observer in its own
//! or a neighboring cell. The grid only holds observers; each tick it is
//! refilled from scratch because observers move too.

use crate::grid::{Cell, SpatialHashGrid};
use crate::strategy::{observers, InterestManagement, RebuildSink, TickReport};
use log::trace;
use serde::{Deserialize, Serialize};
use sightline_core::{ConnectionId, EntityId, IntervalTimer, Registry, Vec3};
use std::collections::{HashMap, HashSet};

/// Default visibility radius
pub const DEFAULT_VIS_RANGE: f32 = 30.0;

/// Which plane positions are projected onto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Projection {
    /// Ground plane, for worlds with Y up
    #[default]
    TopDownXZ,
    /// Screen plane, for side-scrollers
    SideViewXY,
}

impl Projection {
    /// Grid cell of `position` for a given cell size
    pub fn project(self, position: Vec3, cell_size: f32) -> Cell {
        let (a, b) = match self {
            Projection::TopDownXZ => (position.x, position.z),
            Projection::SideViewXY => (position.x, position.y),
        };
        Cell::new(
            (a / cell_size).round() as i32,
            (b / cell_size).round() as i32,
        )
    }
}

/// Spatial hash interest management
#[derive(Debug, Clone)]
pub struct SpatialHashInterest {
    vis_range: f32,
    projection: Projection,
    grid: SpatialHashGrid<ConnectionId>,
    /// Last projected cell of every tracked entity
    cells: HashMap<EntityId, Cell>,
    timer: IntervalTimer,
}

impl SpatialHashInterest {
    pub fn new(vis_range: f32, projection: Projection, rebuild_interval: f64) -> Self {
        Self {
            vis_range,
            projection,
            grid: SpatialHashGrid::new(),
            cells: HashMap::new(),
            timer: IntervalTimer::new(rebuild_interval),
        }
    }

    pub fn vis_range(&self) -> f32 {
        self.vis_range
    }

    pub fn cell_size(&self) -> f32 {
        self.vis_range / 3.0
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    /// Grid cell of a position
    pub fn project(&self, position: Vec3) -> Cell {
        self.projection.project(position, self.cell_size())
    }

    /// Last cell recorded for `entity`
    pub fn cell_of(&self, entity: EntityId) -> Option<Cell> {
        self.cells.get(&entity).copied()
    }

    /// The observer grid as filled by the last tick
    pub fn grid(&self) -> &SpatialHashGrid<ConnectionId> {
        &self.grid
    }
}

impl Default for SpatialHashInterest {
    fn default() -> Self {
        Self::new(DEFAULT_VIS_RANGE, Projection::default(), 1.0)
    }
}

impl InterestManagement for SpatialHashInterest {
    fn name(&self) -> &'static str {
        "spatial_hash"
    }

    fn on_spawned(&mut self, entity: EntityId, registry: &dyn Registry) {
        if let Some(record) = registry.entity(entity) {
            let cell = self.project(record.pose.position);
            self.cells.insert(entity, cell);
        }
    }

    fn on_destroyed(&mut self, entity: EntityId) {
        self.cells.remove(&entity);
    }

    fn check_observer(
        &self,
        entity: EntityId,
        connection: ConnectionId,
        registry: &dyn Registry,
    ) -> bool {
        match (registry.entity(entity), registry.observer_entity(connection)) {
            (Some(record), Some(observer)) => self
                .project(record.pose.position)
                .is_neighbor(self.project(observer.pose.position)),
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
        let cell = self.project(record.pose.position);
        out.extend(
            observers(registry)
                .filter(|(_, observer)| cell.is_neighbor(self.project(observer.pose.position)))
                .map(|(connection, _)| connection),
        );
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

        // Observers first, so every query below sees this tick's positions
        self.grid.clear_all();
        for (connection, observer) in observers(registry) {
            let cell = self.project(observer.pose.position);
            self.grid.add(cell, connection);
        }

        let mut seen = HashSet::new();
        let mut dirty_cells = HashSet::new();
        let mut scratch = HashSet::new();
        for record in registry.entities() {
            seen.insert(record.id);
            let cell = self.project(record.pose.position);
            match self.cells.insert(record.id, cell) {
                Some(previous) if previous == cell => {}
                Some(previous) => {
                    dirty_cells.insert(previous);
                    dirty_cells.insert(cell);
                }
                None => {
                    dirty_cells.insert(cell);
                }
            }

            self.grid.query_with_neighbors(cell, &mut scratch);
            sink.rebuild_observers(record.id, &scratch);
        }
        self.cells.retain(|id, _| seen.contains(id));

        trace!(
            "spatial hash interest: rebuilt {} entities, {} dirty cells",
            seen.len(),
            dirty_cells.len()
        );
        TickReport {
            rebuilt: seen.len(),
            dirty_partitions: dirty_cells.len(),
        }
    }
}
