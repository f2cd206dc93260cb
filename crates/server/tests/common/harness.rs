//! Timestamp service test harness.

use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tessera_core::config::TimestampConfig;
use tessera_metadata::{MemoryStore, MetadataStore, SqliteStore};
use tessera_server::{ManualClock, TimestampService};
use tessera_signer::Ed25519Service;

use super::fixtures::START;

/// A timestamp service wired to a test store, a manual clock and an
/// in-memory signer.
#[allow(dead_code)]
pub struct TestTimestamps {
    pub store: Arc<dyn MetadataStore>,
    pub clock: Arc<ManualClock>,
    pub crypto: Arc<Ed25519Service>,
    pub service: Arc<TimestampService>,
    _temp_dir: Option<TempDir>,
}

#[allow(dead_code)]
impl TestTimestamps {
    /// Harness backed by a file SQLite database.
    pub async fn sqlite(validity_secs: u64) -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let store = SqliteStore::new(temp_dir.path().join("test.db"), None)
            .await
            .expect("Failed to open SQLite store");
        let crypto = Arc::new(Ed25519Service::new());
        Self::build(Arc::new(store), crypto, validity_secs, Some(temp_dir))
    }

    /// Harness backed by a file SQLite database whose signer persists
    /// private keys under `keys/` next to it.
    pub async fn sqlite_with_key_dir(validity_secs: u64) -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let store = SqliteStore::new(temp_dir.path().join("test.db"), None)
            .await
            .expect("Failed to open SQLite store");
        let crypto = Arc::new(
            Ed25519Service::with_key_dir(temp_dir.path().join("keys"))
                .expect("Failed to open key directory"),
        );
        Self::build(Arc::new(store), crypto, validity_secs, Some(temp_dir))
    }

    /// Harness backed by the in-memory store.
    pub fn memory(validity_secs: u64) -> Self {
        let crypto = Arc::new(Ed25519Service::new());
        Self::build(Arc::new(MemoryStore::new()), crypto, validity_secs, None)
    }

    /// Private key files currently in the key directory.
    pub fn key_files(&self) -> Vec<PathBuf> {
        let Some(temp_dir) = &self._temp_dir else {
            return Vec::new();
        };
        let Ok(entries) = std::fs::read_dir(temp_dir.path().join("keys")) else {
            return Vec::new();
        };
        entries
            .map(|entry| entry.expect("Failed to read key directory").path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "key"))
            .collect()
    }

    fn build(
        store: Arc<dyn MetadataStore>,
        crypto: Arc<Ed25519Service>,
        validity_secs: u64,
        temp_dir: Option<TempDir>,
    ) -> Self {
        let clock = Arc::new(ManualClock::new(START));
        let config = TimestampConfig {
            validity_secs,
            ..TimestampConfig::default()
        };
        let service = Arc::new(TimestampService::new(
            store.clone(),
            crypto.clone(),
            clock.clone(),
            config,
        ));
        Self {
            store,
            clock,
            crypto,
            service,
            _temp_dir: temp_dir,
        }
    }
}
