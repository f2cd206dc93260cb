//! Timestamp key repository trait.

use crate::error::MetadataResult;
use crate::models::TimestampKeyRow;
use async_trait::async_trait;

/// Repository for per-repository timestamp keys. At most one key exists per gun.
#[async_trait]
pub trait TimestampKeyRepo: Send + Sync {
    /// Get the timestamp key for `gun`, or `NoKey`.
    async fn get_timestamp_key(&self, gun: &str) -> MetadataResult<TimestampKeyRow>;

    /// Store the timestamp key for `gun`.
    ///
    /// Fails with `KeyExists` if a key is already stored; the existing key is left untouched.
    async fn set_timestamp_key(&self, gun: &str, cipher: &str, public: &[u8])
    -> MetadataResult<()>;
}
