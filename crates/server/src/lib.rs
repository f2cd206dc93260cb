//! Timestamp signing coordinator for the Tessera trust-metadata server.
//!
//! This crate provides:
//! - Get-or-create of per-repository timestamp keys
//! - Freshness checks and regeneration of signed timestamp documents
//! - An injectable clock
//! - Application state assembled from configuration

pub mod clock;
pub mod error;
pub mod state;
pub mod timestamp;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{TimestampError, TimestampResult};
pub use state::AppState;
pub use timestamp::{TimestampService, timestamp_expired};
