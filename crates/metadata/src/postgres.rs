//! PostgreSQL-based metadata store implementation.

use crate::classify::ConflictClassifier;
use crate::error::{MetadataError, MetadataResult, check_version};
use crate::models::{TimestampKeyRow, TufFileRow};
use crate::repos::{TimestampKeyRepo, TufFileRepo};
use crate::store::MetadataStore;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode as SqlxPgSslMode};
use sqlx::{Pool, Postgres};
use std::str::FromStr;
use tessera_core::config::PgSslMode;

/// PostgreSQL schema (embedded).
const POSTGRES_SCHEMA: &str = include_str!("postgres_schema.sql");

/// SQLSTATE for unique_violation.
const PG_UNIQUE_VIOLATION: &str = "23505";

fn postgres_schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                return None;
            }
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

/// PostgreSQL-based metadata store.
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Create a new PostgreSQL store from a connection URL.
    pub async fn from_url(
        url: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        let opts = PgConnectOptions::from_str(url)?;
        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    /// Create a new PostgreSQL store from individual connection parameters.
    ///
    /// This allows credentials to be passed separately, e.g. the password
    /// through an environment variable.
    #[allow(clippy::too_many_arguments)]
    pub async fn from_params(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        database: &str,
        ssl_mode: Option<PgSslMode>,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        let mut opts = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(database);

        if let Some(user) = username {
            opts = opts.username(user);
        }

        if let Some(pass) = password {
            opts = opts.password(pass);
        }

        if let Some(mode) = ssl_mode {
            let sqlx_mode = match mode {
                PgSslMode::Disable => SqlxPgSslMode::Disable,
                PgSslMode::Prefer => SqlxPgSslMode::Prefer,
                PgSslMode::Require => SqlxPgSslMode::Require,
            };
            opts = opts.ssl_mode(sqlx_mode);
        }

        // Log connection info without password
        tracing::info!(
            host = host,
            port = port,
            database = database,
            username = username.unwrap_or("<none>"),
            ssl_mode = ?ssl_mode,
            "Connecting to PostgreSQL with individual parameters"
        );

        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    async fn connect(
        mut opts: PgConnectOptions,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{}ms", timeout_ms))]);
            tracing::info!("PostgreSQL statement_timeout set to {}ms", timeout_ms);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

impl ConflictClassifier for PostgresStore {
    fn is_duplicate_key(&self, err: &sqlx::Error) -> bool {
        match err {
            sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some(PG_UNIQUE_VIOLATION),
            _ => false,
        }
    }
}

#[async_trait]
impl MetadataStore for PostgresStore {
    async fn migrate(&self) -> MetadataResult<()> {
        // PostgreSQL doesn't allow multiple statements in a single prepared statement,
        // so we split the schema and execute each statement separately.
        for statement in postgres_schema_statements(POSTGRES_SCHEMA) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl TufFileRepo for PostgresStore {
    async fn write_version(
        &self,
        gun: &str,
        role: &str,
        version: i64,
        data: &[u8],
    ) -> MetadataResult<()> {
        check_version(gun, role, version)?;

        let newer: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tuf_files WHERE gun = $1 AND role = $2 AND version >= $3",
        )
        .bind(gun)
        .bind(role)
        .bind(version)
        .fetch_one(&self.pool)
        .await?;
        if newer != 0 {
            return Err(MetadataError::stale(gun, role, version));
        }

        sqlx::query("INSERT INTO tuf_files (gun, role, version, data) VALUES ($1, $2, $3, $4)")
            .bind(gun)
            .bind(role)
            .bind(version)
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(|e| self.classify_insert_error(e, MetadataError::stale(gun, role, version)))?;

        tracing::debug!(gun = gun, role = role, version = version, "Metadata version stored");
        Ok(())
    }

    async fn read_latest(&self, gun: &str, role: &str) -> MetadataResult<Vec<u8>> {
        let data: Option<Vec<u8>> = sqlx::query_scalar(
            "SELECT data FROM tuf_files WHERE gun = $1 AND role = $2 ORDER BY version DESC LIMIT 1",
        )
        .bind(gun)
        .bind(role)
        .fetch_optional(&self.pool)
        .await?;
        data.ok_or_else(|| MetadataError::not_found(gun, role))
    }

    async fn read_latest_record(&self, gun: &str, role: &str) -> MetadataResult<TufFileRow> {
        let row = sqlx::query_as::<_, TufFileRow>(
            "SELECT id, gun, role, version, data FROM tuf_files \
             WHERE gun = $1 AND role = $2 ORDER BY version DESC LIMIT 1",
        )
        .bind(gun)
        .bind(role)
        .fetch_optional(&self.pool)
        .await?;
        row.ok_or_else(|| MetadataError::not_found(gun, role))
    }

    async fn delete_repository(&self, gun: &str) -> MetadataResult<u64> {
        let result = sqlx::query("DELETE FROM tuf_files WHERE gun = $1")
            .bind(gun)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TimestampKeyRepo for PostgresStore {
    async fn get_timestamp_key(&self, gun: &str) -> MetadataResult<TimestampKeyRow> {
        let row = sqlx::query_as::<_, TimestampKeyRow>(
            "SELECT gun, cipher, public FROM timestamp_keys WHERE gun = $1",
        )
        .bind(gun)
        .fetch_optional(&self.pool)
        .await?;
        row.ok_or_else(|| MetadataError::NoKey(gun.to_string()))
    }

    async fn set_timestamp_key(
        &self,
        gun: &str,
        cipher: &str,
        public: &[u8],
    ) -> MetadataResult<()> {
        sqlx::query("INSERT INTO timestamp_keys (gun, cipher, public) VALUES ($1, $2, $3)")
            .bind(gun)
            .bind(cipher)
            .bind(public)
            .execute(&self.pool)
            .await
            .map_err(|e| self.classify_insert_error(e, MetadataError::KeyExists(gun.to_string())))?;
        Ok(())
    }
}
