//! Timestamp service error types.

use tessera_metadata::MetadataError;
use tessera_signer::SignerError;
use thiserror::Error;

/// Timestamp generation errors.
#[derive(Debug, Error)]
pub enum TimestampError {
    /// A timestamp cannot be produced before a snapshot exists.
    #[error("no snapshot published for {0}; cannot create a timestamp")]
    MissingSnapshot(String),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error("timestamp document error: {0}")]
    Codec(#[from] tessera_core::Error),
}

/// Result type for timestamp operations.
pub type TimestampResult<T> = std::result::Result<T, TimestampError>;
