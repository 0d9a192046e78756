//! Sightline Core - Shared types for transform replication
//!
//! This crate provides the vocabulary every other sightline crate speaks:
//! - Identity types (`EntityId`, `ConnectionId`, `SceneId`, `MatchId`)
//! - Entity poses and the tri-state `Sample` used by sync messages
//! - Entity and connection records, and the `Registry` trait that exposes them
//! - Injected time sources (`SystemClock`, `ManualClock`) and `IntervalTimer`
//!
//! Nothing here knows about codecs, buffers or interest strategies.

mod connection;
mod entity;
mod error;
mod identity;
mod pose;
mod registry;
pub mod time;

pub use connection::{ConnectionRecord, ConnectionRegistry};
pub use entity::{Authority, EntityRecord, EntityStore, InterestTags};
pub use error::{Error, Result};
pub use identity::{ConnectionId, EntityId, MatchId, SceneId};
pub use pose::{Pose, Sample};
pub use registry::{Registry, RegistryMut, World};
pub use time::{IntervalTimer, ManualClock, SystemClock, TimeSource};

// Re-export the math types poses are made of
pub use glam::{Quat, Vec3};
