//! Database initialization on first run and re-open

use libris_common::db::{init_database, init_memory_database};
use sqlx::SqlitePool;
use tempfile::TempDir;

async fn table_names(pool: &SqlitePool) -> Vec<String> {
    sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .fetch_all(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("library").join("libris.db");

    let pool = init_database(&db_path).await;
    assert!(pool.is_ok(), "Database initialization failed: {:?}", pool.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_reopen_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("libris.db");

    let first = init_database(&db_path).await.unwrap();
    first.close().await;

    let second = init_database(&db_path).await;
    assert!(second.is_ok(), "Failed to open existing database: {:?}", second.err());
}

#[tokio::test]
async fn test_schema_tables_exist() {
    let pool = init_memory_database().await.unwrap();
    let tables = table_names(&pool).await;

    for expected in ["books", "candidates", "final_metadata"] {
        assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
    }
}

#[tokio::test]
async fn test_candidate_confidence_check_constraint() {
    let pool = init_memory_database().await.unwrap();
    sqlx::query("INSERT INTO books (guid, created_at) VALUES ('b1', '2024-01-01T00:00:00Z')")
        .execute(&pool)
        .await
        .unwrap();

    let result = sqlx::query(
        "INSERT INTO candidates (guid, book_guid, field, value, source, confidence, created_at)
         VALUES ('c1', 'b1', 'title', 'X', 'Filename', 1.5, '2024-01-01T00:00:00Z')",
    )
    .execute(&pool)
    .await;

    assert!(result.is_err(), "confidence above 1.0 must be rejected");
}

#[tokio::test]
async fn test_relational_triple_is_unique() {
    let pool = init_memory_database().await.unwrap();
    let unique: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'candidates' AND sql LIKE '%UNIQUE%'",
    )
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(unique, vec!["idx_candidates_relational".to_string()]);

    sqlx::query("INSERT INTO books (guid, created_at) VALUES ('b1', '2024-01-01T00:00:00Z')")
        .execute(&pool)
        .await
        .unwrap();

    let insert = |guid: &'static str, entity: &'static str| {
        sqlx::query(
            "INSERT INTO candidates (guid, book_guid, field, value, entity_key, source, confidence, created_at)
             VALUES (?, 'b1', 'author', 'Terry Pratchett', ?, 'OpenLibrary', 0.9, '2024-01-01T00:00:00Z')",
        )
        .bind(guid)
        .bind(entity)
    };

    insert("c1", "terry pratchett").execute(&pool).await.unwrap();
    let duplicate = insert("c2", "terry pratchett").execute(&pool).await;
    assert!(duplicate.is_err(), "same book, field, entity and source must be rejected");

    // Non-relational rows carry an empty key and may repeat
    insert("c3", "").execute(&pool).await.unwrap();
    insert("c4", "").execute(&pool).await.unwrap();
}
