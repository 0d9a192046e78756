//! Error types for sightline-codec

use thiserror::Error;

/// Codec error type
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodecError {
    /// Quantization step must be a positive, finite number
    #[error("Invalid precision {0}: must be finite and > 0")]
    InvalidPrecision(f32),

    /// Ran out of input while decoding
    #[error("Unexpected end of input: needed {needed} more byte(s)")]
    UnexpectedEnd { needed: usize },

    /// Varint longer than a 64-bit value allows
    #[error("Varint overflows 64 bits")]
    VarintOverflow,

    /// Decoded float values that cannot describe a transform
    #[error("Non-finite or degenerate {0} on the wire")]
    NonFinite(&'static str),
}

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;
