//! Database module - read-only SQLite knowledge store

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

/// Open a read-only connection pool over an existing knowledge store
pub async fn create_pool(database_path: &Path, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(database_path)
        .read_only(true)
        .create_if_missing(false);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    tracing::info!(
        "Knowledge store opened read-only: {} (max {} connections)",
        database_path.display(),
        max_connections
    );
    Ok(pool)
}

/// Schema the ETL collaborator must produce. The service never writes it;
/// it is kept here as the contract and for building fixture stores in tests.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS pests (
    PestID INTEGER PRIMARY KEY AUTOINCREMENT,
    PestCommonName TEXT NOT NULL UNIQUE,
    PestInfo TEXT
);

CREATE TABLE IF NOT EXISTS recommendations (
    PestID INTEGER NOT NULL REFERENCES pests(PestID),
    RecommendationType TEXT NOT NULL,
    RecommendationDetails TEXT NOT NULL,
    Source TEXT,
    LastVerifiedDate TEXT
);

CREATE INDEX IF NOT EXISTS idx_recommendations_pest ON recommendations(PestID);
"#;
