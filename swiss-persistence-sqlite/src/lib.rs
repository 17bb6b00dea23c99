use std::str::FromStr;

use log::info;
use sqlx::{
    Pool, Sqlite,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use swiss_domain::store::{StoreError, StoreResult};

pub mod tournaments;

pub use tournaments::SqliteTournamentStore;

pub const DB_PATH_VAR: &str = "SWISS_DB";

const SCHEMA: [&str; 6] = [
    "CREATE TABLE IF NOT EXISTS tournaments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS players (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        tournament_id INTEGER NOT NULL REFERENCES tournaments(id) ON DELETE CASCADE,
        name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS matches (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        tournament_id INTEGER NOT NULL REFERENCES tournaments(id) ON DELETE CASCADE,
        player_a INTEGER NOT NULL REFERENCES players(id) ON DELETE CASCADE,
        player_b INTEGER REFERENCES players(id) ON DELETE CASCADE,
        CHECK (player_b IS NULL OR player_a < player_b)
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS matches_unique_pair
        ON matches (tournament_id, player_a, player_b) WHERE player_b IS NOT NULL",
    "CREATE UNIQUE INDEX IF NOT EXISTS matches_unique_bye
        ON matches (tournament_id, player_a) WHERE player_b IS NULL",
    "CREATE TABLE IF NOT EXISTS records (
        match_id INTEGER NOT NULL REFERENCES matches(id) ON DELETE CASCADE,
        player_id INTEGER NOT NULL REFERENCES players(id) ON DELETE CASCADE,
        outcome TEXT NOT NULL CHECK (outcome IN ('win', 'loss', 'tie', 'bye')),
        PRIMARY KEY (match_id, player_id)
    )",
];

pub(crate) fn store_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e
        && db.is_unique_violation()
    {
        return StoreError::Conflict(db.message().to_string());
    }
    match e {
        sqlx::Error::RowNotFound => StoreError::NotFound("row not found".to_string()),
        other => StoreError::Storage(other.to_string()),
    }
}

pub async fn create_db_pool(db_path: &str) -> StoreResult<Pool<Sqlite>> {
    let conn_options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(conn_options)
        .await
        .map_err(store_error)?;
    apply_schema(&pool).await?;
    info!("Opened tournament database at {}", db_path);
    Ok(pool)
}

/// Single-connection pool over a private in-memory database.
pub async fn create_memory_pool() -> StoreResult<Pool<Sqlite>> {
    let conn_options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(store_error)?
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(conn_options)
        .await
        .map_err(store_error)?;
    apply_schema(&pool).await?;
    Ok(pool)
}

pub async fn create_db_pool_from_env() -> StoreResult<Pool<Sqlite>> {
    let db_path = std::env::var(DB_PATH_VAR)
        .map_err(|_| StoreError::Storage(format!("{} env var not set", DB_PATH_VAR)))?;
    create_db_pool(&db_path).await
}

async fn apply_schema(pool: &Pool<Sqlite>) -> StoreResult<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(store_error)?;
    }
    Ok(())
}
