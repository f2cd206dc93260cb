//! Metadata store trait and the SQLite implementation.

use crate::classify::ConflictClassifier;
use crate::error::{MetadataError, MetadataResult, check_version};
use crate::models::{TimestampKeyRow, TufFileRow};
use crate::repos::{TimestampKeyRepo, TufFileRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: TufFileRepo + TimestampKeyRepo + Send + Sync {
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite extended result codes for UNIQUE and PRIMARY KEY violations.
const SQLITE_CONSTRAINT_UNIQUE: &str = "2067";
const SQLITE_CONSTRAINT_PRIMARYKEY: &str = "1555";

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    query_timeout_secs: u64,
}

impl SqliteStore {
    /// Create a new SQLite store. `path` may be `:memory:`.
    pub async fn new(
        path: impl AsRef<Path>,
        query_timeout_secs: Option<u64>,
    ) -> MetadataResult<Self> {
        let path = path.as_ref();
        let query_timeout_secs = query_timeout_secs.unwrap_or(600);
        let in_memory = path.as_os_str() == ":memory:";

        if !in_memory && let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // A single connection keeps an in-memory database alive and avoids
            // persistent "database is locked" failures under concurrency.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self {
            pool,
            query_timeout_secs,
        };
        store.migrate().await?;

        tracing::debug!(
            path = %path.display(),
            query_timeout_secs = store.query_timeout_secs,
            "SQLite metadata store opened (query timeout is advisory only)"
        );

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Advisory query timeout in seconds.
    pub fn query_timeout_secs(&self) -> u64 {
        self.query_timeout_secs
    }
}

impl ConflictClassifier for SqliteStore {
    fn is_duplicate_key(&self, err: &sqlx::Error) -> bool {
        match err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code();
                matches!(
                    code.as_deref(),
                    Some(SQLITE_CONSTRAINT_UNIQUE) | Some(SQLITE_CONSTRAINT_PRIMARYKEY)
                ) || db_err.message().contains("UNIQUE constraint")
            }
            _ => false,
        }
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl TufFileRepo for SqliteStore {
    async fn write_version(
        &self,
        gun: &str,
        role: &str,
        version: i64,
        data: &[u8],
    ) -> MetadataResult<()> {
        check_version(gun, role, version)?;

        let newer: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tuf_files WHERE gun = ? AND role = ? AND version >= ?",
        )
        .bind(gun)
        .bind(role)
        .bind(version)
        .fetch_one(&self.pool)
        .await?;
        if newer != 0 {
            return Err(MetadataError::stale(gun, role, version));
        }

        // A concurrent writer may insert the same version between the check
        // and this insert; the unique index decides the winner.
        sqlx::query("INSERT INTO tuf_files (gun, role, version, data) VALUES (?, ?, ?, ?)")
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
            "SELECT data FROM tuf_files WHERE gun = ? AND role = ? ORDER BY version DESC LIMIT 1",
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
             WHERE gun = ? AND role = ? ORDER BY version DESC LIMIT 1",
        )
        .bind(gun)
        .bind(role)
        .fetch_optional(&self.pool)
        .await?;
        row.ok_or_else(|| MetadataError::not_found(gun, role))
    }

    async fn delete_repository(&self, gun: &str) -> MetadataResult<u64> {
        let result = sqlx::query("DELETE FROM tuf_files WHERE gun = ?")
            .bind(gun)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TimestampKeyRepo for SqliteStore {
    async fn get_timestamp_key(&self, gun: &str) -> MetadataResult<TimestampKeyRow> {
        let row = sqlx::query_as::<_, TimestampKeyRow>(
            "SELECT gun, cipher, public FROM timestamp_keys WHERE gun = ?",
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
        sqlx::query("INSERT INTO timestamp_keys (gun, cipher, public) VALUES (?, ?, ?)")
            .bind(gun)
            .bind(cipher)
            .bind(public)
            .execute(&self.pool)
            .await
            .map_err(|e| self.classify_insert_error(e, MetadataError::KeyExists(gun.to_string())))?;
        Ok(())
    }
}

/// SQLite schema.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS tuf_files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    gun TEXT NOT NULL,
    role TEXT NOT NULL,
    version INTEGER NOT NULL,
    data BLOB NOT NULL,
    UNIQUE(gun, role, version)
);
CREATE INDEX IF NOT EXISTS idx_tuf_files_gun ON tuf_files(gun);

CREATE TABLE IF NOT EXISTS timestamp_keys (
    gun TEXT PRIMARY KEY,
    cipher TEXT NOT NULL,
    public BLOB NOT NULL
);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteStore {
        SqliteStore::new(":memory:", None).await.unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_classified_as_stale_version() {
        let store = store().await;
        let insert = "INSERT INTO tuf_files (gun, role, version, data) VALUES (?, ?, ?, ?)";
        sqlx::query(insert)
            .bind("acme")
            .bind("targets")
            .bind(3_i64)
            .bind(b"first".as_slice())
            .execute(store.pool())
            .await
            .unwrap();

        // Skip the pre-check to exercise the uniqueness constraint directly.
        let err = sqlx::query(insert)
            .bind("acme")
            .bind("targets")
            .bind(3_i64)
            .bind(b"second".as_slice())
            .execute(store.pool())
            .await
            .unwrap_err();
        assert!(store.is_duplicate_key(&err));

        let classified =
            store.classify_insert_error(err, MetadataError::stale("acme", "targets", 3));
        assert!(classified.is_stale_version());
        assert_eq!(store.read_latest("acme", "targets").await.unwrap(), b"first");
    }

    #[tokio::test]
    async fn test_other_database_errors_are_not_conflicts() {
        let store = store().await;
        let err = sqlx::query("INSERT INTO missing_table (x) VALUES (1)")
            .execute(store.pool())
            .await
            .unwrap_err();
        assert!(!store.is_duplicate_key(&err));
        assert!(matches!(
            store.classify_insert_error(err, MetadataError::KeyExists("acme".to_string())),
            MetadataError::Database(_)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_timestamp_key_keeps_first() {
        let store = store().await;
        store
            .set_timestamp_key("acme", "ed25519", &[1; 32])
            .await
            .unwrap();
        let err = store
            .set_timestamp_key("acme", "ed25519", &[2; 32])
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::KeyExists(gun) if gun == "acme"));

        let key = store.get_timestamp_key("acme").await.unwrap();
        assert_eq!(key.public, vec![1; 32]);
    }

    #[tokio::test]
    async fn test_file_backed_store_persists_across_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("metadata.db");

        {
            let store = SqliteStore::new(&db_path, Some(30)).await.unwrap();
            assert_eq!(store.query_timeout_secs(), 30);
            store.write_version("acme", "root", 1, b"root-v1").await.unwrap();
        }

        let store = SqliteStore::new(&db_path, None).await.unwrap();
        let row = store.read_latest_record("acme", "root").await.unwrap();
        assert_eq!(row.version, 1);
        assert_eq!(row.data, b"root-v1");
    }
}
