//! Database access for the observation store
//!
//! Single SQLite file in the root folder; one table, `observations`.

pub mod observations;

use crate::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Creates the parent directory and the `observations` table when missing.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// In-memory database with the schema applied
///
/// Limited to one connection: every SQLite `:memory:` connection is a
/// separate database.
pub async fn init_memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Create the observation table if it doesn't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS observations (
            id INTEGER PRIMARY KEY,
            lat REAL NOT NULL CHECK (lat BETWEEN -90.0 AND 90.0),
            lon REAL NOT NULL CHECK (lon BETWEEN -180.0 AND 180.0),
            kind TEXT NOT NULL,
            comment TEXT NOT NULL DEFAULT '',
            score REAL,
            validation_reason TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::debug!("Database tables initialized (observations)");

    Ok(())
}
