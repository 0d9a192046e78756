//! Error types for sightline-snapshot

use thiserror::Error;

/// Snapshot error type
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// A settings value is out of range
    #[error("Invalid snapshot settings: {0}")]
    InvalidSettings(String),
}

/// Result type for snapshot operations
pub type Result<T> = std::result::Result<T, Error>;
