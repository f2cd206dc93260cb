//! Timestamp key and document management.
//!
//! Every repository has exactly one timestamp key, created lazily by the
//! first caller that needs it. The timestamp document itself is regenerated
//! only when the stored one has expired; otherwise the stored bytes are
//! served unchanged. Both paths tolerate concurrent callers: losers of a
//! creation race fall back to whatever the winner stored.

use crate::clock::Clock;
use crate::error::{TimestampError, TimestampResult};
use std::sync::Arc;
use tessera_core::config::TimestampConfig;
use tessera_core::{Role, SignedTimestamp, Timestamp, TimestampSignature};
use tessera_metadata::{MetadataError, MetadataStore, TimestampKeyRow};
use tessera_signer::{CryptoService, PublicKey};
use time::OffsetDateTime;

/// Whether `timestamp` is no longer valid at `now`.
///
/// A timestamp whose expiry equals `now` is already expired.
pub fn timestamp_expired(timestamp: &SignedTimestamp, now: OffsetDateTime) -> bool {
    timestamp.is_expired(now)
}

/// Creates and caches timestamp keys and signed timestamp documents.
pub struct TimestampService {
    store: Arc<dyn MetadataStore>,
    crypto: Arc<dyn CryptoService>,
    clock: Arc<dyn Clock>,
    config: TimestampConfig,
}

impl TimestampService {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        crypto: Arc<dyn CryptoService>,
        clock: Arc<dyn Clock>,
        config: TimestampConfig,
    ) -> Self {
        Self {
            store,
            crypto,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &TimestampConfig {
        &self.config
    }

    /// Return the timestamp key for `gun`, creating it on first use.
    ///
    /// If another caller stores a key first, that key is returned and the
    /// private half of the one generated here is discarded.
    pub async fn get_or_create_timestamp_key(&self, gun: &str) -> TimestampResult<PublicKey> {
        match self.store.get_timestamp_key(gun).await {
            Ok(row) => return stored_key(&row),
            Err(MetadataError::NoKey(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let key = self.crypto.create(&self.config.key_algorithm)?;
        match self
            .store
            .set_timestamp_key(gun, key.algorithm().as_str(), key.as_bytes())
            .await
        {
            Ok(()) => {
                tracing::info!(gun = gun, key_id = %key.key_id(), "Created timestamp key");
                Ok(key)
            }
            Err(MetadataError::KeyExists(_)) => {
                tracing::warn!(
                    gun = gun,
                    discarded_key_id = %key.key_id(),
                    "Timestamp key created concurrently, using stored key"
                );
                if let Err(e) = self.crypto.remove(&key) {
                    tracing::warn!(
                        gun = gun,
                        key_id = %key.key_id(),
                        error = %e,
                        "Failed to discard unused timestamp key"
                    );
                }
                let row = self.store.get_timestamp_key(gun).await?;
                stored_key(&row)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Return the current signed timestamp for `gun`.
    ///
    /// The stored timestamp is returned byte-for-byte while it is unexpired.
    /// Otherwise a new one is signed over the latest snapshot. Its version is
    /// one above both the stored row version and the stored document's own
    /// version (so 1 if there was no timestamp).
    pub async fn get_or_create_timestamp(&self, gun: &str) -> TimestampResult<Vec<u8>> {
        let key = self.get_or_create_timestamp_key(gun).await?;
        let now = self.clock.now();

        let previous_version = match self
            .store
            .read_latest_record(gun, Role::Timestamp.as_str())
            .await
        {
            Ok(record) => {
                let current = SignedTimestamp::decode(&record.data)?;
                if !timestamp_expired(&current, now) {
                    tracing::debug!(
                        gun = gun,
                        version = record.version,
                        "Serving stored timestamp"
                    );
                    return Ok(record.data);
                }
                let document_version = i64::try_from(current.signed.version).unwrap_or(i64::MAX);
                record.version.max(document_version)
            }
            Err(MetadataError::NotFound { .. }) => 0,
            Err(e) => return Err(e.into()),
        };

        let snapshot = match self.store.read_latest(gun, Role::Snapshot.as_str()).await {
            Ok(data) => data,
            Err(MetadataError::NotFound { .. }) => {
                return Err(TimestampError::MissingSnapshot(gun.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let version = previous_version.checked_add(1).ok_or_else(|| {
            tessera_core::Error::InvalidDocument("timestamp version overflow".to_string())
        })?;
        let expires = now.checked_add(self.config.validity()).ok_or_else(|| {
            tessera_core::Error::InvalidTime(format!(
                "expiry overflows {now} + {}s",
                self.config.validity_secs
            ))
        })?;

        // `version` is at least 1 here.
        let timestamp = Timestamp::new(version.unsigned_abs(), expires, &snapshot);
        let data = self.sign(timestamp, &key)?.encode()?;

        match self
            .store
            .write_version(gun, Role::Timestamp.as_str(), version, &data)
            .await
        {
            Ok(()) => {
                tracing::info!(
                    gun = gun,
                    version = version,
                    expires = %expires,
                    "Generated timestamp"
                );
                Ok(data)
            }
            Err(conflict @ MetadataError::StaleVersion { .. }) => {
                let stored = self.store.read_latest(gun, Role::Timestamp.as_str()).await?;
                if timestamp_expired(&SignedTimestamp::decode(&stored)?, now) {
                    tracing::error!(
                        gun = gun,
                        version = version,
                        "Newer stored timestamp is already expired"
                    );
                    return Err(conflict.into());
                }
                tracing::warn!(
                    gun = gun,
                    version = version,
                    "Timestamp generated concurrently, using stored timestamp"
                );
                Ok(stored)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn sign(&self, signed: Timestamp, key: &PublicKey) -> TimestampResult<SignedTimestamp> {
        let signature = self.crypto.sign(key, &signed.canonical_bytes()?)?;
        Ok(SignedTimestamp {
            signed,
            signatures: vec![TimestampSignature {
                key_id: signature.key_id.clone(),
                method: signature.method.as_str().to_string(),
                sig: signature.to_base64(),
            }],
        })
    }
}

fn stored_key(row: &TimestampKeyRow) -> TimestampResult<PublicKey> {
    Ok(PublicKey::from_parts(&row.cipher, &row.public)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use tessera_metadata::{MemoryStore, TimestampKeyRepo, TufFileRepo};
    use tessera_signer::{Ed25519Service, SignerError};
    use time::Duration;
    use time::macros::datetime;

    const START: OffsetDateTime = datetime!(2030-01-01 00:00 UTC);

    fn service(validity_secs: u64) -> (Arc<MemoryStore>, Arc<ManualClock>, TimestampService) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(START));
        let config = TimestampConfig {
            validity_secs,
            ..TimestampConfig::default()
        };
        let service = TimestampService::new(
            store.clone(),
            Arc::new(Ed25519Service::new()),
            clock.clone(),
            config,
        );
        (store, clock, service)
    }

    #[test]
    fn test_expiry_boundary() {
        let ts = SignedTimestamp {
            signed: Timestamp::new(1, START, b"snapshot"),
            signatures: vec![],
        };
        assert!(!timestamp_expired(&ts, START - Duration::seconds(1)));
        assert!(timestamp_expired(&ts, START));
        assert!(timestamp_expired(&ts, START + Duration::seconds(1)));
    }

    #[tokio::test]
    async fn test_first_timestamp_is_version_one() {
        let (store, _clock, service) = service(3600);
        store.write_version("acme", "snapshot", 1, b"snap").await.unwrap();

        let bytes = service.get_or_create_timestamp("acme").await.unwrap();
        let ts = SignedTimestamp::decode(&bytes).unwrap();
        assert_eq!(ts.signed.version, 1);
        assert_eq!(ts.signed.expires, START + Duration::hours(1));
        assert!(ts.signed.snapshot_meta().unwrap().matches(b"snap"));

        let record = store.read_latest_record("acme", "timestamp").await.unwrap();
        assert_eq!(record.version, 1);
        assert_eq!(record.data, bytes);
    }

    #[tokio::test]
    async fn test_exact_expiry_regenerates() {
        let (store, clock, service) = service(60);
        store.write_version("acme", "snapshot", 1, b"snap").await.unwrap();

        let first = service.get_or_create_timestamp("acme").await.unwrap();
        clock.advance(Duration::seconds(60));
        let second = service.get_or_create_timestamp("acme").await.unwrap();

        assert_ne!(first, second);
        assert_eq!(SignedTimestamp::decode(&second).unwrap().signed.version, 2);
    }

    #[tokio::test]
    async fn test_missing_snapshot_still_creates_key() {
        let (store, _clock, service) = service(60);
        let err = service.get_or_create_timestamp("acme").await.unwrap_err();
        assert!(matches!(err, TimestampError::MissingSnapshot(gun) if gun == "acme"));

        assert!(store.get_timestamp_key("acme").await.is_ok());
        assert!(store.read_latest("acme", "timestamp").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_next_version_follows_stored_row_version() {
        let (store, _clock, service) = service(60);
        store.write_version("acme", "snapshot", 1, b"snap").await.unwrap();

        // Published by hand: the row version is ahead of the document's own.
        let expired = SignedTimestamp {
            signed: Timestamp::new(1, START - Duration::hours(1), b"snap"),
            signatures: vec![],
        };
        store
            .write_version("acme", "timestamp", 5, &expired.encode().unwrap())
            .await
            .unwrap();

        let bytes = service.get_or_create_timestamp("acme").await.unwrap();
        let ts = SignedTimestamp::decode(&bytes).unwrap();
        assert_eq!(ts.signed.version, 6);
        assert!(!timestamp_expired(&ts, START));

        let record = store.read_latest_record("acme", "timestamp").await.unwrap();
        assert_eq!(record.version, 6);
        assert_eq!(record.data, bytes);
    }

    #[tokio::test]
    async fn test_next_version_follows_document_version() {
        let (store, _clock, service) = service(60);
        store.write_version("acme", "snapshot", 1, b"snap").await.unwrap();

        let expired = SignedTimestamp {
            signed: Timestamp::new(9, START - Duration::hours(1), b"snap"),
            signatures: vec![],
        };
        store
            .write_version("acme", "timestamp", 2, &expired.encode().unwrap())
            .await
            .unwrap();

        let bytes = service.get_or_create_timestamp("acme").await.unwrap();
        assert_eq!(SignedTimestamp::decode(&bytes).unwrap().signed.version, 10);
    }

    #[tokio::test]
    async fn test_corrupt_stored_timestamp_is_an_error() {
        let (store, _clock, service) = service(60);
        store.write_version("acme", "snapshot", 1, b"snap").await.unwrap();
        store
            .write_version("acme", "timestamp", 1, b"not json")
            .await
            .unwrap();

        let err = service.get_or_create_timestamp("acme").await.unwrap_err();
        assert!(matches!(err, TimestampError::Codec(_)));
    }

    #[tokio::test]
    async fn test_unknown_stored_cipher_is_rejected() {
        let (store, _clock, service) = service(60);
        store.set_timestamp_key("acme", "rsa", &[7; 32]).await.unwrap();

        let err = service.get_or_create_timestamp_key("acme").await.unwrap_err();
        assert!(matches!(
            err,
            TimestampError::Signer(SignerError::UnsupportedAlgorithm(_))
        ));
    }

    #[tokio::test]
    async fn test_unsupported_configured_algorithm() {
        let store = Arc::new(MemoryStore::new());
        let service = TimestampService::new(
            store.clone(),
            Arc::new(Ed25519Service::new()),
            Arc::new(ManualClock::new(START)),
            TimestampConfig {
                key_algorithm: "rsa".to_string(),
                ..TimestampConfig::default()
            },
        );

        let err = service.get_or_create_timestamp_key("acme").await.unwrap_err();
        assert!(matches!(
            err,
            TimestampError::Signer(SignerError::UnsupportedAlgorithm(_))
        ));
        assert!(matches!(
            store.get_timestamp_key("acme").await,
            Err(MetadataError::NoKey(_))
        ));
    }
}
