use async_trait::async_trait;
use linkstash_core::error::{Result, StorageError};
use linkstash_core::{DeletionEntry, Handle, Stats, Storage, UrlRecord};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Connection, Row};
use std::time::Duration;
use tracing::{debug, info, trace};
use typed_builder::TypedBuilder;

/// Connection pool settings for [`PgStorage::connect_with`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct PgStorageConfig {
    #[builder(default = 10)]
    pub max_connections: u32,
    #[builder(default = Duration::from_secs(5))]
    pub acquire_timeout: Duration,
}

impl Default for PgStorageConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// PostgreSQL implementation of the storage contract.
///
/// All records live in a single `urls` table with a unique index on
/// `handle`, so the first writer of a handle wins and later saves fail with
/// [`StorageError::AlreadyExists`]. Deletion only flips the `deleted` column.
#[derive(Debug, Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    /// Creates a storage from an existing pool. The schema is not touched.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool with default settings and ensures the schema exists.
    pub async fn connect(dsn: &str) -> Result<Self> {
        Self::connect_with(dsn, PgStorageConfig::default()).await
    }

    /// Opens a pool and ensures the schema exists.
    pub async fn connect_with(dsn: &str, config: PgStorageConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(dsn)
            .await
            .map_err(map_connect_error)?;

        let storage = Self::new(pool);
        storage.migrate().await?;
        Ok(storage)
    }

    /// Creates the `urls` table and its unique handle index if absent.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS urls (
                owner VARCHAR NOT NULL,
                handle VARCHAR NOT NULL,
                original_url VARCHAR NOT NULL,
                deleted BOOLEAN NOT NULL DEFAULT FALSE
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS urls_handle_idx ON urls (handle)")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        info!("postgres url schema ready");
        Ok(())
    }
}

const INSERT_URL: &str = r#"
    INSERT INTO urls (owner, handle, original_url, deleted)
    VALUES ($1, $2, $3, $4)
"#;

fn record_from_row(row: &PgRow) -> Result<UrlRecord> {
    let handle: String = row.try_get("handle").map_err(map_sqlx_error)?;

    Ok(UrlRecord {
        owner: row.try_get("owner").map_err(map_sqlx_error)?,
        handle: Handle::new_unchecked(handle),
        original_url: row.try_get("original_url").map_err(map_sqlx_error)?,
        deleted: row.try_get("deleted").map_err(map_sqlx_error)?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_insert_error(err: sqlx::Error, handle: &Handle) -> StorageError {
    if is_unique_violation(&err) {
        StorageError::AlreadyExists(handle.to_string())
    } else {
        map_sqlx_error(err)
    }
}

fn map_connect_error(err: sqlx::Error) -> StorageError {
    match map_sqlx_error(err) {
        StorageError::Query(message) => StorageError::Unavailable(message),
        other => other,
    }
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn save_url(&self, original_url: &str, owner: &str, handle: &Handle) -> Result<()> {
        sqlx::query(INSERT_URL)
            .bind(owner)
            .bind(handle.as_str())
            .bind(original_url)
            .bind(false)
            .execute(&self.pool)
            .await
            .map_err(|err| map_insert_error(err, handle))?;

        trace!(handle = %handle, owner, "saved url");
        Ok(())
    }

    async fn get_url(&self, handle: &Handle) -> Result<UrlRecord> {
        let row = sqlx::query(
            r#"
            SELECT owner, handle, original_url, deleted
            FROM urls
            WHERE handle = $1
            LIMIT 1
            "#,
        )
        .bind(handle.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Err(StorageError::NotFound(handle.to_string()));
        };

        record_from_row(&row)
    }

    async fn get_urls_by_owner(&self, owner: &str) -> Result<Vec<UrlRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT owner, handle, original_url, deleted
            FROM urls
            WHERE owner = $1
              AND NOT deleted
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(record_from_row).collect()
    }

    async fn is_alive(&self) -> Result<bool> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        conn.ping().await.map_err(map_sqlx_error)?;
        Ok(true)
    }

    async fn batch_save_urls(&self, records: Vec<UrlRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        // Dropping the transaction on any early return rolls the batch back.
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        for record in &records {
            sqlx::query(INSERT_URL)
                .bind(&record.owner)
                .bind(record.handle.as_str())
                .bind(&record.original_url)
                .bind(record.deleted)
                .execute(&mut *tx)
                .await
                .map_err(|err| map_insert_error(err, &record.handle))?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;

        debug!(count = records.len(), "saved url batch");
        Ok(())
    }

    async fn delete_urls(&self, entries: Vec<DeletionEntry>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let (owners, handles): (Vec<String>, Vec<String>) = entries
            .into_iter()
            .map(|entry| (entry.owner, entry.handle.as_str().to_owned()))
            .unzip();
        let requested = owners.len();

        let result = sqlx::query(
            r#"
            UPDATE urls
            SET deleted = TRUE
            FROM UNNEST($1::text[], $2::text[]) AS pending(owner, handle)
            WHERE urls.owner = pending.owner
              AND urls.handle = pending.handle
            "#,
        )
        .bind(owners)
        .bind(handles)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        debug!(requested, deleted = result.rows_affected(), "soft-deleted urls");
        Ok(())
    }

    async fn stats(&self) -> Result<Stats> {
        let (owners, urls): (i64, i64) =
            sqlx::query_as("SELECT COUNT(DISTINCT owner), COUNT(*) FROM urls")
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        Ok(Stats {
            owners: owners.max(0) as u64,
            urls: urls.max(0) as u64,
        })
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        info!("postgres pool closed");
        Ok(())
    }
}
