//! Test fixtures for generating metadata documents.

use time::OffsetDateTime;
use time::macros::datetime;

/// Starting instant for manual clocks.
pub const START: OffsetDateTime = datetime!(2030-01-01 00:00 UTC);

/// A snapshot document body that differs per version.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub fn snapshot_doc(version: i64) -> Vec<u8> {
    format!(r#"{{"signed":{{"_type":"Snapshot","version":{version}}},"signatures":[]}}"#)
        .into_bytes()
}
