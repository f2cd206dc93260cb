//! Versioned trust-metadata store for Tessera.
//!
//! This crate provides:
//! - Append-only, versioned role metadata keyed by (gun, role, version)
//! - Per-repository timestamp key storage (first writer wins)
//! - SQLite, PostgreSQL, and in-memory backends
//!
//! Concurrency safety comes from uniqueness constraints, not locks. Each SQL
//! backend classifies its own duplicate-key failures into
//! [`MetadataError::StaleVersion`] or [`MetadataError::KeyExists`].

pub mod classify;
pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod repos;
pub mod store;

pub use classify::ConflictClassifier;
pub use error::{MetadataError, MetadataResult};
pub use memory::MemoryStore;
pub use models::{TimestampKeyRow, TufFileRow};
pub use postgres::PostgresStore;
pub use repos::{TimestampKeyRepo, TufFileRepo};
pub use store::{MetadataStore, SqliteStore};

use std::sync::Arc;
use tessera_core::config::MetadataConfig;

/// Create a metadata store from configuration.
pub async fn from_config(config: &MetadataConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    config.validate().map_err(MetadataError::Config)?;

    match config {
        MetadataConfig::Sqlite {
            path,
            query_timeout_secs,
        } => {
            let store = SqliteStore::new(path, *query_timeout_secs).await?;
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
        MetadataConfig::Postgres {
            url,
            host,
            port,
            username,
            password,
            database,
            ssl_mode,
            max_connections,
            statement_timeout_ms,
        } => {
            let store = if let Some(url) = url {
                // URL takes precedence over individual fields
                tracing::info!("Connecting to PostgreSQL using connection URL");
                PostgresStore::from_url(url, *max_connections, *statement_timeout_ms).await?
            } else if let (Some(host), Some(database)) = (host.as_ref(), database.as_ref()) {
                PostgresStore::from_params(
                    host,
                    port.unwrap_or(5432),
                    username.as_deref(),
                    password.as_deref(),
                    database,
                    *ssl_mode,
                    *max_connections,
                    *statement_timeout_ms,
                )
                .await?
            } else {
                return Err(MetadataError::Config(
                    "postgres config requires either 'url' or 'host' + 'database'".to_string(),
                ));
            };
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
        MetadataConfig::Memory => {
            tracing::warn!("Using in-memory metadata store; contents are lost on exit");
            Ok(Arc::new(MemoryStore::new()) as Arc<dyn MetadataStore>)
        }
    }
}
