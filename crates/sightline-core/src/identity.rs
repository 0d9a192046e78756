//! Identity types for entities, connections and interest partitions

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a network-visible entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    /// Create a new entity ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity:{}", self.0)
    }
}

/// Identifier for a remote peer connection
///
/// Connections are created by the transport; replication only refers to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    /// The connection a client uses to talk to its server
    pub const SERVER: ConnectionId = ConnectionId(0);

    /// Create a new connection ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

/// Identifier of a scene or level an entity lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneId(pub u32);

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scene:{}", self.0)
    }
}

/// Opaque 128-bit match/session identifier
///
/// The nil UUID is reserved: [`MatchId::EMPTY`] means "not in any match".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub Uuid);

impl MatchId {
    /// The reserved "no match" value
    pub const EMPTY: MatchId = MatchId(Uuid::nil());

    /// Generate a fresh random match ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Build a match ID from its raw 128-bit value
    pub fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    /// Whether this is the reserved "no match" value
    pub fn is_empty(&self) -> bool {
        self.0.is_nil()
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "match:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id() {
        let id = EntityId::new(42);
        assert_eq!(id.raw(), 42);
        assert_eq!(format!("{}", id), "entity:42");
    }

    #[test]
    fn test_connection_id() {
        assert_eq!(ConnectionId::SERVER.raw(), 0);
        assert_eq!(format!("{}", ConnectionId::new(7)), "conn:7");
    }

    #[test]
    fn test_match_id_empty_sentinel() {
        assert!(MatchId::EMPTY.is_empty());
        assert!(MatchId::default().is_empty());
        assert!(!MatchId::from_u128(1).is_empty());
        assert_ne!(MatchId::generate(), MatchId::generate());
    }
}
