//! Database layer for Annex.
//!
//! Provides SQLite connection pooling and the queries backing the
//! record store: workspaces, collections, records and their field values.

mod records;

pub use records::*;

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Type alias for the SQLite connection pool.
pub type DbPool = sqlx::SqlitePool;

/// Initialize the database connection pool.
///
/// Creates parent directories if needed and configures SQLite with
/// settings suited to concurrent access.
pub async fn init_pool(path: &str) -> Result<DbPool> {
    // Create parent directories if they don't exist
    if path != ":memory:" {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
    }

    let options = SqliteConnectOptions::from_str(path)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30))
        .foreign_keys(true)
        .pragma("temp_store", "memory");

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect_with(options)
        .await?;

    info!("Database pool initialized: {}", path);

    Ok(pool)
}

/// Initialize the database schema.
///
/// Applies schema.sql statement by statement. Every table uses
/// IF NOT EXISTS, so running it again is a no-op.
pub async fn initialize_schema(pool: &DbPool) -> Result<()> {
    let statements = schema_statements(include_str!("../../schema.sql"));

    info!(statements = statements.len(), "Initializing database schema");

    for statement in &statements {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}

/// Split a schema script into executable statements.
///
/// `--` comments are dropped before splitting on `;`, so a semicolon inside
/// a comment never ends a statement. The schema holds no string literals
/// containing `--` or `;`.
fn schema_statements(script: &str) -> Vec<String> {
    let code: String = script
        .lines()
        .map(|line| match line.find("--") {
            Some(at) => &line[..at],
            None => line,
        })
        .collect::<Vec<_>>()
        .join("\n");

    code.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Health check for the database connection.
pub async fn health_check(pool: &DbPool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
