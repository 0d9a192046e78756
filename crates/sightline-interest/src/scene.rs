//! Scene-based interest
//!
//! Entities see each other only within the same scene. Entities without a
//! scene are in no partition and visible to nobody.

use crate::partitioned::{PartitionedInterest, Partitioner};
use sightline_core::{EntityRecord, SceneId};

/// Partitions entities by `InterestTags::scene`
#[derive(Debug, Clone, Copy, Default)]
pub struct ByScene;

impl Partitioner for ByScene {
    type Key = SceneId;
    const NAME: &'static str = "scene";

    fn key(&self, record: &EntityRecord) -> Option<SceneId> {
        record.tags.scene
    }
}

/// Scene interest management
pub type SceneInterest = PartitionedInterest<ByScene>;
