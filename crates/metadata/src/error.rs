//! Metadata store error types.

use thiserror::Error;

/// Metadata store operation errors.
///
/// `StaleVersion`, `NotFound`, `NoKey`, and `KeyExists` are expected outcomes
/// under normal concurrent use. Every other variant is a backend failure.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("stale version: {role} v{version} for {gun} is not newer than the stored version")]
    StaleVersion {
        gun: String,
        role: String,
        version: i64,
    },

    #[error("not found: no {role} metadata for {gun}")]
    NotFound { gun: String, role: String },

    #[error("no timestamp key for {0}")]
    NoKey(String),

    #[error("timestamp key already exists for {0}")]
    KeyExists(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MetadataError {
    pub(crate) fn stale(gun: &str, role: &str, version: i64) -> Self {
        Self::StaleVersion {
            gun: gun.to_string(),
            role: role.to_string(),
            version,
        }
    }

    pub(crate) fn not_found(gun: &str, role: &str) -> Self {
        Self::NotFound {
            gun: gun.to_string(),
            role: role.to_string(),
        }
    }

    /// Whether this error is a lost first-writer-wins race or an outdated write.
    pub fn is_stale_version(&self) -> bool {
        matches!(self, Self::StaleVersion { .. })
    }

    /// Whether this error means the requested record does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;

/// Reject versions that cannot be stored.
pub(crate) fn check_version(gun: &str, role: &str, version: i64) -> MetadataResult<()> {
    if version < 0 {
        return Err(MetadataError::Constraint(format!(
            "{role} version for {gun} must be non-negative, got {version}"
        )));
    }
    Ok(())
}
