//! Database models mapping to the metadata schema.

use sqlx::FromRow;

/// One persisted version of a role's metadata for a repository.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct TufFileRow {
    pub id: i64,
    pub gun: String,
    pub role: String,
    pub version: i64,
    pub data: Vec<u8>,
}

/// Public half of a repository's timestamp signing key.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct TimestampKeyRow {
    pub gun: String,
    /// Algorithm identifier, e.g. "ed25519".
    pub cipher: String,
    pub public: Vec<u8>,
}
