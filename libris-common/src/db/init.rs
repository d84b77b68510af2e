//! Database initialization
//!
//! Creates the library database on first run and applies the schema
//! idempotently on every start.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Open (or create) the library database and ensure all tables exist
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Applied to every pooled connection; WAL lets readers proceed while a
    // resolution pass commits
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Open an in-memory database with the full schema (tests, dry runs)
///
/// Single connection: every pooled connection to `:memory:` is a separate database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    create_schema(&pool).await?;
    Ok(pool)
}

/// Create all tables (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    create_books_table(pool).await?;
    create_candidates_table(pool).await?;
    create_final_metadata_table(pool).await?;

    Ok(())
}

async fn create_books_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS books (
            guid TEXT PRIMARY KEY,
            file_path TEXT NOT NULL DEFAULT '',
            fallback_cover_path TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Candidate values, one row per sourced proposal
///
/// `entity_key` is the folded related-entity name for author/series/publisher
/// rows and empty otherwise. The partial unique index makes
/// `(book, field, entity_key, source)` the upsert target for relational rows.
async fn create_candidates_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS candidates (
            guid TEXT PRIMARY KEY,
            book_guid TEXT NOT NULL REFERENCES books(guid) ON DELETE CASCADE,
            field TEXT NOT NULL,
            value TEXT NOT NULL,
            entity_key TEXT NOT NULL DEFAULT '',
            source TEXT NOT NULL,
            confidence REAL NOT NULL CHECK (confidence >= 0.0 AND confidence <= 1.0),
            is_active INTEGER NOT NULL DEFAULT 1,
            is_main_author INTEGER,
            series_number TEXT,
            is_high_resolution INTEGER,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_candidates_book_field ON candidates(book_guid, field, is_active)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_candidates_relational
        ON candidates(book_guid, field, entity_key, source)
        WHERE entity_key != ''
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_final_metadata_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS final_metadata (
            book_guid TEXT PRIMARY KEY REFERENCES books(guid) ON DELETE CASCADE,
            final_title TEXT NOT NULL DEFAULT '',
            final_title_confidence REAL NOT NULL DEFAULT 0.0,
            final_author TEXT NOT NULL DEFAULT '',
            final_author_confidence REAL NOT NULL DEFAULT 0.0,
            final_series TEXT NOT NULL DEFAULT '',
            final_series_number TEXT NOT NULL DEFAULT '',
            final_series_confidence REAL NOT NULL DEFAULT 0.0,
            final_publisher TEXT NOT NULL DEFAULT '',
            final_publisher_confidence REAL NOT NULL DEFAULT 0.0,
            final_cover_path TEXT NOT NULL DEFAULT '',
            final_cover_confidence REAL NOT NULL DEFAULT 0.0,
            publication_year INTEGER,
            language TEXT NOT NULL DEFAULT '',
            isbn TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            genres TEXT NOT NULL DEFAULT '[]',
            extra TEXT NOT NULL DEFAULT '{}',
            overall_confidence REAL NOT NULL DEFAULT 0.0,
            completeness_score REAL NOT NULL DEFAULT 0.0,
            is_reviewed INTEGER NOT NULL DEFAULT 0,
            last_updated TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
