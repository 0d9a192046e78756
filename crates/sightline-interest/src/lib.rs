//! Sightline Interest - Who gets to see what
//!
//! Interest management decides, per replicated entity, which connections
//! receive its updates. Five strategies share one contract
//! ([`InterestManagement`]):
//!
//! - [`DistanceInterest`]: within a radius of the observer's entity
//! - [`SpatialHashInterest`]: same or neighboring grid cell
//! - [`SceneInterest`]: same scene
//! - [`TeamInterest`]: same team, or force-shown
//! - [`MatchInterest`]: same match
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐  tick(now, registry)  ┌──────────────────────┐
//! │   Host   │──────────────────────▶│  InterestManagement  │
//! └──────────┘                       └──────────────────────┘
//!      ▲                                        │ rebuild_observers
//!      │ drain_changes                          ▼
//!      │                             ┌──────────────────────┐
//!      └─────────────────────────────│     ObserverSets     │
//!                                    └──────────────────────┘
//! ```
//!
//! Strategies never own the world: they read entities and connections
//! through `sightline_core::Registry` and push results into a
//! [`RebuildSink`].
//!
//! # Example
//!
//! ```rust
//! use sightline_core::{ConnectionId, ConnectionRecord, Pose, Vec3, World};
//! use sightline_interest::{InterestConfig, ObserverSets};
//!
//! let mut world = World::new();
//! let player = world.entities.spawn(Pose::IDENTITY).id;
//! let crate_box = world.entities.spawn(Pose::at(Vec3::new(5.0, 0.0, 0.0))).id;
//! world.connections.insert(ConnectionRecord::new(ConnectionId(1)).controlling(player));
//!
//! let mut interest = InterestConfig::from_ron_str("Distance(vis_range: 10.0)")
//!     .unwrap()
//!     .build()
//!     .unwrap();
//! let mut observers = ObserverSets::new();
//! interest.tick(0.0, &world, &mut observers);
//!
//! assert!(observers.is_observing(ConnectionId(1), crate_box));
//! ```

pub mod config;
pub mod distance;
mod error;
pub mod grid;
pub mod matches;
mod observers;
pub mod partition;
pub mod partitioned;
pub mod scene;
pub mod spatial;
mod strategy;
pub mod team;

pub use config::InterestConfig;
pub use distance::DistanceInterest;
pub use error::{Error, Result};
pub use grid::{Cell, SpatialHashGrid};
pub use matches::{ByMatch, MatchInterest};
pub use observers::{ObserverSets, VisibilityChange};
pub use partition::PartitionTable;
pub use partitioned::{PartitionedInterest, Partitioner};
pub use scene::{ByScene, SceneInterest};
pub use spatial::{Projection, SpatialHashInterest};
pub use strategy::{InterestManagement, RebuildSink, TickReport};
pub use team::{ByTeam, TeamInterest};
