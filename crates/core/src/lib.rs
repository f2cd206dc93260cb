//! Core domain types shared by the Tessera trust-metadata server.
//!
//! This crate defines:
//! - Repository and role naming
//! - SHA-256 content hashes for metadata references
//! - The timestamp document codec
//! - Configuration for the store, signer, and timestamp service

pub mod config;
pub mod error;
pub mod hash;
pub mod role;
pub mod timestamp;

pub use error::{Error, Result};
pub use hash::ContentHash;
pub use role::Role;
pub use timestamp::{FileMeta, SignedTimestamp, Timestamp, TimestampSignature};

/// Default validity window for generated timestamps: 14 days.
pub const DEFAULT_TIMESTAMP_VALIDITY_SECS: u64 = 14 * 24 * 60 * 60;

/// Default signing algorithm for timestamp keys.
pub const DEFAULT_TIMESTAMP_KEY_ALGORITHM: &str = "ed25519";
