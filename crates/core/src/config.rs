//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::Duration;

/// PostgreSQL SSL mode configuration.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PgSslMode {
    /// Disable SSL/TLS entirely.
    Disable,
    /// Prefer SSL/TLS but allow unencrypted connections (default).
    #[default]
    Prefer,
    /// Require SSL/TLS for all connections.
    Require,
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database (recommended for testing and small deployments only).
    Sqlite {
        /// Database file path, or `:memory:`.
        path: PathBuf,
        /// Query timeout in seconds (advisory only - SQLite cannot force-cancel queries).
        #[serde(default = "default_sqlite_query_timeout_secs")]
        query_timeout_secs: Option<u64>,
    },
    /// PostgreSQL database.
    Postgres {
        /// Connection URL (optional if using individual fields).
        /// Takes precedence over individual fields if both are provided.
        url: Option<String>,
        /// Database host (e.g., "localhost" or "db.example.com").
        host: Option<String>,
        /// Database port (default: 5432).
        #[serde(default = "default_pg_port")]
        port: Option<u16>,
        /// Database username.
        username: Option<String>,
        /// Database password.
        /// WARNING: Prefer TESSERA_METADATA__PASSWORD env var over storing in config.
        password: Option<String>,
        /// Database name.
        database: Option<String>,
        /// SSL mode for connections.
        ssl_mode: Option<PgSslMode>,
        /// Maximum connections in the pool.
        #[serde(default = "default_max_connections")]
        max_connections: u32,
        /// Statement timeout in milliseconds (prevents hung queries).
        #[serde(default = "default_statement_timeout_ms")]
        statement_timeout_ms: Option<u64>,
    },
    /// Process-local store. Contents are lost on exit.
    Memory,
}

fn default_max_connections() -> u32 {
    10
}

fn default_pg_port() -> Option<u16> {
    Some(5432)
}

fn default_statement_timeout_ms() -> Option<u64> {
    Some(30_000)
}

fn default_sqlite_query_timeout_secs() -> Option<u64> {
    Some(600) // advisory only
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/metadata.db"),
            query_timeout_secs: default_sqlite_query_timeout_secs(),
        }
    }
}

impl MetadataConfig {
    /// Validate metadata configuration invariants.
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            MetadataConfig::Sqlite { .. } | MetadataConfig::Memory => Ok(()),
            MetadataConfig::Postgres {
                url,
                host,
                database,
                ..
            } => match (url.as_ref(), host.as_ref(), database.as_ref()) {
                (Some(_), _, _) => Ok(()),
                (None, Some(_), Some(_)) => Ok(()),
                (None, None, _) => Err(
                    "postgres config requires either 'url' or 'host' + 'database'".to_string(),
                ),
                (None, Some(_), None) => Err(
                    "postgres config requires 'database' when using individual fields".to_string(),
                ),
            },
        }
    }
}

/// Timestamp generation configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimestampConfig {
    /// How long a generated timestamp stays valid, in seconds (default: 14 days).
    #[serde(default = "default_timestamp_validity_secs")]
    pub validity_secs: u64,
    /// Algorithm used when a repository's timestamp key is first created.
    #[serde(default = "default_timestamp_key_algorithm")]
    pub key_algorithm: String,
}

fn default_timestamp_validity_secs() -> u64 {
    crate::DEFAULT_TIMESTAMP_VALIDITY_SECS
}

fn default_timestamp_key_algorithm() -> String {
    crate::DEFAULT_TIMESTAMP_KEY_ALGORITHM.to_string()
}

impl Default for TimestampConfig {
    fn default() -> Self {
        Self {
            validity_secs: default_timestamp_validity_secs(),
            key_algorithm: default_timestamp_key_algorithm(),
        }
    }
}

impl TimestampConfig {
    /// Get the validity window as a Duration.
    pub fn validity(&self) -> Duration {
        // Saturate at i64::MAX to prevent overflow wrapping to negative
        let secs = i64::try_from(self.validity_secs).unwrap_or(i64::MAX);
        Duration::seconds(secs)
    }

    /// Validate timestamp configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.validity_secs == 0 {
            return Err("timestamp validity_secs must be greater than zero".to_string());
        }
        if self.key_algorithm.trim().is_empty() {
            return Err("timestamp key_algorithm must not be empty".to_string());
        }
        Ok(())
    }
}

/// Signing backend configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Directory holding private keys created by the signer.
    /// When unset, see [`AppConfig::key_dir`] for the default.
    pub key_dir: Option<PathBuf>,
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Metadata store configuration.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Timestamp generation configuration.
    #[serde(default)]
    pub timestamp: TimestampConfig,
    /// Signing backend configuration.
    #[serde(default)]
    pub signing: SigningConfig,
}

impl AppConfig {
    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses the in-memory metadata store and
    /// in-memory signing keys.
    pub fn for_testing() -> Self {
        Self {
            metadata: MetadataConfig::Memory,
            timestamp: TimestampConfig::default(),
            signing: SigningConfig::default(),
        }
    }

    /// Directory for private signing keys.
    ///
    /// An explicit `signing.key_dir` always wins. Otherwise a file-backed
    /// SQLite store keeps keys in `keys/` beside the database, and stores
    /// that vanish on exit keep them in memory (`None`). A PostgreSQL store
    /// outlives any single host, so it requires an explicit directory.
    pub fn key_dir(&self) -> Result<Option<PathBuf>, String> {
        if let Some(dir) = &self.signing.key_dir {
            return Ok(Some(dir.clone()));
        }
        match &self.metadata {
            MetadataConfig::Sqlite { path, .. } if path.as_os_str() == ":memory:" => Ok(None),
            MetadataConfig::Sqlite { path, .. } => Ok(Some(
                path.parent()
                    .map(|parent| parent.join("keys"))
                    .unwrap_or_else(|| PathBuf::from("keys")),
            )),
            MetadataConfig::Memory => Ok(None),
            MetadataConfig::Postgres { .. } => Err(
                "signing.key_dir is required with a postgres metadata store".to_string(),
            ),
        }
    }

    /// Validate all sections.
    pub fn validate(&self) -> Result<(), String> {
        self.metadata.validate()?;
        self.timestamp.validate()?;
        self.key_dir()?;
        Ok(())
    }
}
