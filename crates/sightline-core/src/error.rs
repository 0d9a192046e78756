//! Error types for sightline-core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Entity not found: {0}")]
    EntityNotFound(crate::EntityId),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
