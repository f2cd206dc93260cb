//! Backend-specific classification of insert failures.

use crate::error::MetadataError;

/// Maps a backend's duplicate-key signal onto the store's conflict errors.
///
/// Each SQL backend recognizes its own duplicate-key failures so callers only
/// ever see `StaleVersion` or `KeyExists`, never a vendor error code.
pub trait ConflictClassifier {
    /// Whether `err` was raised by a uniqueness constraint.
    fn is_duplicate_key(&self, err: &sqlx::Error) -> bool;

    /// Turn an insert failure into `conflict` when it is a duplicate key,
    /// otherwise into a database error.
    fn classify_insert_error(&self, err: sqlx::Error, conflict: MetadataError) -> MetadataError {
        if self.is_duplicate_key(&err) {
            conflict
        } else {
            MetadataError::Database(err)
        }
    }
}
