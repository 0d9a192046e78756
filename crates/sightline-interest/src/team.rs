//! Team-based interest
//!
//! Teammates see each other. `force_shown` entities are visible to every
//! observer. An entity with no (or a blank) team that is not force-shown is
//! visible to nobody, and an observer without a team sees only force-shown
//! entities. Team names compare exactly, case included.

use crate::partitioned::{PartitionedInterest, Partitioner};
use sightline_core::EntityRecord;

/// Partitions entities by `InterestTags::team`
#[derive(Debug, Clone, Copy, Default)]
pub struct ByTeam;

impl Partitioner for ByTeam {
    type Key = String;
    const NAME: &'static str = "team";

    fn key(&self, record: &EntityRecord) -> Option<String> {
        record.tags.team().map(str::to_owned)
    }

    fn force_shown(&self, record: &EntityRecord) -> bool {
        record.tags.force_shown
    }
}

/// Team interest management
pub type TeamInterest = PartitionedInterest<ByTeam>;
