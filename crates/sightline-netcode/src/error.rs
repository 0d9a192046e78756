//! Error types for sightline-netcode

use sightline_core::{ConnectionId, EntityId};
use thiserror::Error;

/// Replication error type
#[derive(Debug, Error)]
pub enum Error {
    /// Payload could not be decoded
    #[error("Codec error: {0}")]
    Codec(#[from] sightline_codec::CodecError),

    /// Entity or connection lookup failed
    #[error(transparent)]
    Core(#[from] sightline_core::Error),

    /// Settings rejected by validation
    #[error("Invalid replication settings: {0}")]
    InvalidSettings(String),

    /// First byte of a message is not a known message kind
    #[error("Unknown message kind {0}")]
    UnknownMessageKind(u8),

    /// A delta arrived before any full message for the entity
    #[error("No baseline for {0}, delta dropped")]
    MissingBaseline(EntityId),

    /// A peer sent state for an entity it has no authority over
    #[error("{from} is not authoritative for {entity}")]
    NotAuthoritative { entity: EntityId, from: ConnectionId },

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(String),

    /// I/O error while loading settings
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// RON parse error while loading settings
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

impl From<sightline_snapshot::Error> for Error {
    fn from(err: sightline_snapshot::Error) -> Self {
        Error::InvalidSettings(err.to_string())
    }
}

/// Result type for replication operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_error_is_send_sync() {
        assert_send_sync::<Error>();
    }

    #[test]
    fn test_codec_conversion() {
        let err: Error = sightline_codec::CodecError::VarintOverflow.into();
        assert!(matches!(err, Error::Codec(_)));
    }
}
