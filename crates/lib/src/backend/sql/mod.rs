//! SQLite-backed record store.
//!
//! Uses sqlx with `AnyPool`. The schema is defined in the [`schema`] module
//! and initialized automatically when connecting.

/// Schema definition and migration system.
pub mod schema;

use std::any::Any;

use async_trait::async_trait;
use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;

use crate::Result;
use crate::backend::RecordStore;
use crate::backend::errors::BackendError;

/// Extension trait for sqlx Result types to simplify error handling.
///
/// Converts sqlx errors to `BackendError::SqlxError` with a context message.
pub(crate) trait SqlxResultExt<T> {
    /// Convert sqlx error to BackendError with context message.
    fn sql_context(self, context: &str) -> Result<T>;
}

impl<T> SqlxResultExt<T> for std::result::Result<T, sqlx::Error> {
    fn sql_context(self, context: &str) -> Result<T> {
        self.map_err(|e| {
            BackendError::SqlxError {
                reason: format!("{context}: {e}"),
                source: Some(e),
            }
            .into()
        })
    }
}

/// Record store persisting to a SQLite database.
///
/// # Thread Safety
///
/// `Sqlite` is `Send + Sync` as required by `RecordStore`. The underlying
/// sqlx pool handles connection pooling.
#[derive(Debug, Clone)]
pub struct Sqlite {
    pool: AnyPool,
}

impl Sqlite {
    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Open a SQLite database at the given path.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use coffer::backend::Sqlite;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let store = Sqlite::open("records.db").await.unwrap();
    /// }
    /// ```
    pub async fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        // mode=rwc: read-write-create (create file if it doesn't exist)
        let url = format!("sqlite:{}?mode=rwc", path.as_ref().display());
        Self::connect(&url).await
    }

    /// Create an in-memory SQLite database.
    ///
    /// The database exists only for the lifetime of this store. Useful for testing.
    pub async fn in_memory() -> Result<Self> {
        // Shared cache so every pooled connection sees the same database.
        // The unique name keeps separate stores isolated from each other.
        let unique_id = uuid::Uuid::new_v4();
        let url = format!("sqlite:file:mem_{unique_id}?mode=memory&cache=shared");
        Self::connect(&url).await
    }

    /// Connect to a SQLite database using a connection URL.
    ///
    /// # Arguments
    ///
    /// * `url` - SQLite connection URL (e.g., "sqlite:./records.db")
    pub async fn connect(url: &str) -> Result<Self> {
        sqlx::any::install_default_drivers();

        let is_in_memory = url.contains("mode=memory");

        // An in-memory database is destroyed when its last connection closes,
        // so keep one connection alive for the life of the pool.
        let pool = if is_in_memory {
            AnyPoolOptions::new()
                .max_connections(5)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect(url)
                .await
                .sql_context("Failed to connect to SQLite")?
        } else {
            AnyPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await
                .sql_context("Failed to connect to SQLite")?
        };

        if is_in_memory {
            sqlx::query("PRAGMA busy_timeout = 5000;")
                .execute(&pool)
                .await
                .sql_context("Failed to configure SQLite")?;
        } else {
            sqlx::query(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA busy_timeout = 5000;",
            )
            .execute(&pool)
            .await
            .sql_context("Failed to configure SQLite")?;
        }

        let store = Self { pool };
        schema::initialize(&store).await?;

        Ok(store)
    }

    /// Close the pool, waiting for in-flight queries.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl RecordStore for Sqlite {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM records WHERE physical_key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .sql_context("Failed to get record")?;

        Ok(row.map(|(value,)| value))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO records (physical_key, value) VALUES ($1, $2)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await
            .sql_context("Failed to write record")?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM records WHERE physical_key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .sql_context("Failed to remove record")?;
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        // substr() compares literally, unlike LIKE which treats % and _ as wildcards
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT physical_key FROM records
             WHERE substr(physical_key, 1, length($1)) = $1
             ORDER BY physical_key",
        )
        .bind(prefix)
        .fetch_all(&self.pool)
        .await
        .sql_context("Failed to list records")?;

        Ok(rows.into_iter().map(|(key,)| key).collect())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
