//! Process-local metadata store.
//!
//! Holds the same invariants as the SQL backends: one row per
//! (gun, role, version), append-only versions, and one timestamp key per gun.
//! The check and the insert happen under a single lock, so the lock plays the
//! part of the uniqueness constraint.

use crate::error::{MetadataError, MetadataResult, check_version};
use crate::models::{TimestampKeyRow, TufFileRow};
use crate::repos::{TimestampKeyRepo, TufFileRepo};
use crate::store::MetadataStore;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    /// (gun, role) -> version -> row
    files: HashMap<(String, String), BTreeMap<i64, TufFileRow>>,
    keys: HashMap<String, TimestampKeyRow>,
}

/// In-memory metadata store.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn migrate(&self) -> MetadataResult<()> {
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        Ok(())
    }
}

#[async_trait]
impl TufFileRepo for MemoryStore {
    async fn write_version(
        &self,
        gun: &str,
        role: &str,
        version: i64,
        data: &[u8],
    ) -> MetadataResult<()> {
        check_version(gun, role, version)?;

        let mut state = self.state.lock().await;
        state.next_id += 1;
        let id = state.next_id;
        let versions = state
            .files
            .entry((gun.to_string(), role.to_string()))
            .or_default();

        if let Some((&latest, _)) = versions.last_key_value()
            && latest >= version
        {
            return Err(MetadataError::stale(gun, role, version));
        }

        versions.insert(
            version,
            TufFileRow {
                id,
                gun: gun.to_string(),
                role: role.to_string(),
                version,
                data: data.to_vec(),
            },
        );
        Ok(())
    }

    async fn read_latest(&self, gun: &str, role: &str) -> MetadataResult<Vec<u8>> {
        self.read_latest_record(gun, role).await.map(|row| row.data)
    }

    async fn read_latest_record(&self, gun: &str, role: &str) -> MetadataResult<TufFileRow> {
        let state = self.state.lock().await;
        state
            .files
            .get(&(gun.to_string(), role.to_string()))
            .and_then(|versions| versions.last_key_value())
            .map(|(_, row)| row.clone())
            .ok_or_else(|| MetadataError::not_found(gun, role))
    }

    async fn delete_repository(&self, gun: &str) -> MetadataResult<u64> {
        let mut state = self.state.lock().await;
        let mut removed = 0u64;
        state.files.retain(|(file_gun, _), versions| {
            if file_gun == gun {
                removed += versions.len() as u64;
                false
            } else {
                true
            }
        });
        Ok(removed)
    }
}

#[async_trait]
impl TimestampKeyRepo for MemoryStore {
    async fn get_timestamp_key(&self, gun: &str) -> MetadataResult<TimestampKeyRow> {
        let state = self.state.lock().await;
        state
            .keys
            .get(gun)
            .cloned()
            .ok_or_else(|| MetadataError::NoKey(gun.to_string()))
    }

    async fn set_timestamp_key(
        &self,
        gun: &str,
        cipher: &str,
        public: &[u8],
    ) -> MetadataResult<()> {
        let mut state = self.state.lock().await;
        if state.keys.contains_key(gun) {
            return Err(MetadataError::KeyExists(gun.to_string()));
        }
        state.keys.insert(
            gun.to_string(),
            TimestampKeyRow {
                gun: gun.to_string(),
                cipher: cipher.to_string(),
                public: public.to_vec(),
            },
        );
        Ok(())
    }
}
