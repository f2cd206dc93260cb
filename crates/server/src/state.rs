//! Application state assembled from configuration.

use crate::clock::{Clock, SystemClock};
use crate::timestamp::TimestampService;
use anyhow::{Context, Result};
use std::sync::Arc;
use tessera_core::config::AppConfig;
use tessera_metadata::MetadataStore;
use tessera_signer::{CryptoService, Ed25519Service};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Metadata store.
    pub metadata: Arc<dyn MetadataStore>,
    /// Signing backend for timestamp keys.
    pub crypto: Arc<dyn CryptoService>,
    /// Timestamp coordinator.
    pub timestamps: Arc<TimestampService>,
}

impl AppState {
    /// Create application state from already-built parts.
    pub fn new(
        config: AppConfig,
        metadata: Arc<dyn MetadataStore>,
        crypto: Arc<dyn CryptoService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let timestamps = Arc::new(TimestampService::new(
            metadata.clone(),
            crypto.clone(),
            clock,
            config.timestamp.clone(),
        ));
        Self {
            config: Arc::new(config),
            metadata,
            crypto,
            timestamps,
        }
    }

    /// Validate `config`, open the metadata store and build the signer.
    ///
    /// The signer persists keys wherever [`AppConfig::key_dir`] points, so
    /// every process opening the same store can sign with the same keys.
    pub async fn from_config(config: AppConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

        let metadata = tessera_metadata::from_config(&config.metadata)
            .await
            .context("failed to initialize metadata store")?;
        tracing::info!("Metadata store initialized");

        let key_dir = config
            .key_dir()
            .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
        let crypto: Arc<dyn CryptoService> = match key_dir {
            Some(dir) => {
                let service = Ed25519Service::with_key_dir(&dir).with_context(|| {
                    format!("failed to open key directory {}", dir.display())
                })?;
                tracing::info!(key_dir = %dir.display(), "Signing keys persisted to disk");
                Arc::new(service)
            }
            None => {
                tracing::info!("Metadata store is not persistent, signing keys kept in memory");
                Arc::new(Ed25519Service::new())
            }
        };

        Ok(Self::new(config, metadata, crypto, Arc::new(SystemClock)))
    }
}
