//! Error types for sightline-interest

use thiserror::Error;

/// Result type for sightline-interest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring interest management
#[derive(Debug, Error)]
pub enum Error {
    /// A strategy parameter is out of range
    #[error("invalid interest config: {0}")]
    InvalidConfig(String),

    /// Config file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config text is not valid RON for an `InterestConfig`
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

// Compile-time check that Error is Send + Sync
fn _assert_error_send_sync<T: Send + Sync>() {}
fn _error_is_send_sync() {
    _assert_error_send_sync::<Error>();
}
