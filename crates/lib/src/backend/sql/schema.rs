//! SQL schema definition.
//!
//! The schema is versioned so a database written by a newer build is refused
//! rather than misread.

use super::{Sqlite, SqlxResultExt};
use crate::Result;
use crate::backend::errors::BackendError;

/// Current schema version.
pub const SCHEMA_VERSION: i64 = 1;

/// SQL statements to create the schema tables.
pub const CREATE_TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS schema_version (
        version BIGINT PRIMARY KEY
    )",
    // Raw envelope strings keyed by physical key
    "CREATE TABLE IF NOT EXISTS records (
        physical_key TEXT PRIMARY KEY NOT NULL,
        value TEXT NOT NULL
    )",
];

/// Create tables if they don't exist and check the stored schema version.
pub async fn initialize(store: &Sqlite) -> Result<()> {
    let pool = store.pool();

    for statement in CREATE_TABLES {
        sqlx::query(statement)
            .execute(pool)
            .await
            .sql_context(&format!("Schema creation failed - SQL: {statement}"))?;
    }

    let row: Option<(i64,)> = sqlx::query_as("SELECT version FROM schema_version")
        .fetch_optional(pool)
        .await
        .sql_context("Failed to check schema version")?;

    match row {
        None => {
            sqlx::query("INSERT INTO schema_version (version) VALUES ($1)")
                .bind(SCHEMA_VERSION)
                .execute(pool)
                .await
                .sql_context("Failed to initialize schema version")?;
            tracing::debug!(version = SCHEMA_VERSION, "Initialized SQL schema");
        }
        Some((SCHEMA_VERSION,)) => {}
        Some((found,)) => {
            return Err(BackendError::SqlxError {
                reason: format!(
                    "Database schema version {found} is not supported (expected {SCHEMA_VERSION})"
                ),
                source: None,
            }
            .into());
        }
    }

    Ok(())
}
