//! Versioned role metadata repository trait.

use crate::error::MetadataResult;
use crate::models::TufFileRow;
use async_trait::async_trait;

/// Repository for versioned role metadata.
///
/// Versions are append-only per (gun, role). Implementations pair a
/// "newer version exists" pre-check with a uniqueness constraint on
/// (gun, role, version); a writer that loses the race on the constraint
/// must see [`MetadataError::StaleVersion`](crate::MetadataError::StaleVersion),
/// never a generic database error.
#[async_trait]
pub trait TufFileRepo: Send + Sync {
    /// Append `data` as `version` of `role` for `gun`.
    ///
    /// Fails with `StaleVersion` if a version greater than or equal to
    /// `version` already exists. Nothing is written in that case.
    async fn write_version(
        &self,
        gun: &str,
        role: &str,
        version: i64,
        data: &[u8],
    ) -> MetadataResult<()>;

    /// Data of the highest stored version, or `NotFound`.
    async fn read_latest(&self, gun: &str, role: &str) -> MetadataResult<Vec<u8>>;

    /// Full row of the highest stored version, or `NotFound`.
    async fn read_latest_record(&self, gun: &str, role: &str) -> MetadataResult<TufFileRow>;

    /// Delete every role and version for `gun`. Returns the number of rows removed.
    async fn delete_repository(&self, gun: &str) -> MetadataResult<u64>;
}
