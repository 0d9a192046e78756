//! Match-based interest
//!
//! Entities in the same match see each other. The nil match id means "in no
//! match": such entities are observed by nobody and observe nobody.

use crate::partitioned::{PartitionedInterest, Partitioner};
use sightline_core::{EntityRecord, MatchId};

/// Partitions entities by `InterestTags::match_id`
#[derive(Debug, Clone, Copy, Default)]
pub struct ByMatch;

impl Partitioner for ByMatch {
    type Key = MatchId;
    const NAME: &'static str = "match";

    fn key(&self, record: &EntityRecord) -> Option<MatchId> {
        let id = record.tags.match_id;
        (!id.is_empty()).then_some(id)
    }
}

/// Match interest management
pub type MatchInterest = PartitionedInterest<ByMatch>;
