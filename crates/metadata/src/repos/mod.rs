//! Repository traits for metadata operations.

pub mod timestamp_keys;
pub mod tuf_files;

pub use timestamp_keys::TimestampKeyRepo;
pub use tuf_files::TufFileRepo;
