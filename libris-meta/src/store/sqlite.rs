//! SQLite metadata store
//!
//! Tables are created by `libris_common::db`. Candidates and the final
//! record are each written with a single `INSERT ... ON CONFLICT DO UPDATE`
//! statement; relational candidates conflict on the partial unique index over
//! `(book, field, entity_key, source)`.

use crate::store::MetadataStore;
use crate::types::{
    entity_key, Book, Candidate, CandidateDetail, FinalMetadata, MetadataField, NewCandidate,
    SourceKind,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libris_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use uuid::Uuid;

const CANDIDATE_COLUMNS: &str = "guid, book_guid, field, value, source, confidence, is_active, \
     is_main_author, series_number, is_high_resolution, created_at";

/// SQLite-backed store
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wrap a pool whose schema was created by `libris_common::db`
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn book_exists(&self, book_id: Uuid) -> Result<bool> {
        let row: Option<(String,)> = sqlx::query_as("SELECT guid FROM books WHERE guid = ?")
            .bind(book_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn fetch_candidates(&self, sql: &str, book_id: Uuid) -> Result<Vec<Candidate>> {
        let rows = sqlx::query(sql)
            .bind(book_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(candidate_from_row).collect()
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn insert_book(&self, book: &Book) -> Result<()> {
        sqlx::query(
            "INSERT INTO books (guid, file_path, fallback_cover_path, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(book.id.to_string())
        .bind(&book.file_path)
        .bind(book.fallback_cover_path.as_deref())
        .bind(book.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::debug!(book_id = %book.id, path = %book.file_path, "Inserted book");
        Ok(())
    }

    async fn book(&self, book_id: Uuid) -> Result<Option<Book>> {
        let row = sqlx::query(
            "SELECT guid, file_path, fallback_cover_path, created_at FROM books WHERE guid = ?",
        )
        .bind(book_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<Book> {
            Ok(Book {
                id: parse_uuid(&row.try_get::<String, _>("guid")?)?,
                file_path: row.try_get("file_path")?,
                fallback_cover_path: row.try_get("fallback_cover_path")?,
                created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
            })
        })
        .transpose()
    }

    async fn record_candidate(&self, candidate: NewCandidate) -> Result<Candidate> {
        if !self.book_exists(candidate.book_id).await? {
            return Err(Error::unknown_book(candidate.book_id));
        }

        let key = if candidate.field.is_relational() {
            entity_key(&candidate.value)
        } else {
            String::new()
        };
        let (is_main_author, series_number, is_high_resolution) = detail_columns(&candidate.detail);
        let fresh = candidate.into_candidate(Utc::now());

        // Rows with an empty key fall outside the partial unique index and
        // always insert; relational rows update in place
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO candidates (
                guid, book_guid, field, value, entity_key, source, confidence, is_active,
                is_main_author, series_number, is_high_resolution, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?, ?)
            ON CONFLICT(book_guid, field, entity_key, source) WHERE entity_key != ''
            DO UPDATE SET
                value = excluded.value,
                confidence = excluded.confidence,
                is_active = 1,
                is_main_author = excluded.is_main_author,
                series_number = excluded.series_number,
                is_high_resolution = excluded.is_high_resolution
            RETURNING {}
            "#,
            CANDIDATE_COLUMNS
        ))
        .bind(fresh.id.to_string())
        .bind(fresh.book_id.to_string())
        .bind(fresh.field.as_str())
        .bind(&fresh.value)
        .bind(&key)
        .bind(fresh.source.as_str())
        .bind(fresh.confidence)
        .bind(is_main_author)
        .bind(series_number.as_deref())
        .bind(is_high_resolution)
        .bind(fresh.created_at.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        let stored = candidate_from_row(&row)?;
        if stored.id != fresh.id {
            tracing::debug!(
                candidate_id = %stored.id,
                field = %stored.field,
                source = %stored.source,
                "Updated relational candidate"
            );
        }
        Ok(stored)
    }

    async fn candidate(&self, candidate_id: Uuid) -> Result<Option<Candidate>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM candidates WHERE guid = ?",
            CANDIDATE_COLUMNS
        ))
        .bind(candidate_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(candidate_from_row).transpose()
    }

    async fn set_candidate_active(
        &self,
        candidate_id: Uuid,
        active: bool,
    ) -> Result<Option<Candidate>> {
        let result = sqlx::query("UPDATE candidates SET is_active = ? WHERE guid = ?")
            .bind(active)
            .bind(candidate_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.candidate(candidate_id).await
    }

    async fn active_candidates(
        &self,
        book_id: Uuid,
        field: &MetadataField,
    ) -> Result<Vec<Candidate>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM candidates WHERE book_guid = ? AND field = ? AND is_active = 1 \
             ORDER BY rowid",
            CANDIDATE_COLUMNS
        ))
        .bind(book_id.to_string())
        .bind(field.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(candidate_from_row).collect()
    }

    async fn active_candidates_for_book(&self, book_id: Uuid) -> Result<Vec<Candidate>> {
        self.fetch_candidates(
            &format!(
                "SELECT {} FROM candidates WHERE book_guid = ? AND is_active = 1 ORDER BY rowid",
                CANDIDATE_COLUMNS
            ),
            book_id,
        )
        .await
    }

    async fn all_candidates_for_book(&self, book_id: Uuid) -> Result<Vec<Candidate>> {
        self.fetch_candidates(
            &format!(
                "SELECT {} FROM candidates WHERE book_guid = ? ORDER BY rowid",
                CANDIDATE_COLUMNS
            ),
            book_id,
        )
        .await
    }

    async fn load_final(&self, book_id: Uuid) -> Result<Option<FinalMetadata>> {
        let row = sqlx::query("SELECT * FROM final_metadata WHERE book_guid = ?")
            .bind(book_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(final_from_row).transpose()
    }

    async fn save_final(&self, record: &FinalMetadata) -> Result<()> {
        if !self.book_exists(record.book_id).await? {
            return Err(Error::unknown_book(record.book_id));
        }

        let genres = serde_json::to_string(&record.genres)
            .map_err(|e| Error::Internal(format!("Encode genres failed: {}", e)))?;
        let extra = serde_json::to_string(&record.extra)
            .map_err(|e| Error::Internal(format!("Encode extra fields failed: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO final_metadata (
                book_guid,
                final_title, final_title_confidence,
                final_author, final_author_confidence,
                final_series, final_series_number, final_series_confidence,
                final_publisher, final_publisher_confidence,
                final_cover_path, final_cover_confidence,
                publication_year, language, isbn, description, genres, extra,
                overall_confidence, completeness_score, is_reviewed, last_updated
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(book_guid) DO UPDATE SET
                final_title = excluded.final_title,
                final_title_confidence = excluded.final_title_confidence,
                final_author = excluded.final_author,
                final_author_confidence = excluded.final_author_confidence,
                final_series = excluded.final_series,
                final_series_number = excluded.final_series_number,
                final_series_confidence = excluded.final_series_confidence,
                final_publisher = excluded.final_publisher,
                final_publisher_confidence = excluded.final_publisher_confidence,
                final_cover_path = excluded.final_cover_path,
                final_cover_confidence = excluded.final_cover_confidence,
                publication_year = excluded.publication_year,
                language = excluded.language,
                isbn = excluded.isbn,
                description = excluded.description,
                genres = excluded.genres,
                extra = excluded.extra,
                overall_confidence = excluded.overall_confidence,
                completeness_score = excluded.completeness_score,
                is_reviewed = excluded.is_reviewed,
                last_updated = excluded.last_updated
            "#,
        )
        .bind(record.book_id.to_string())
        .bind(&record.final_title)
        .bind(record.final_title_confidence)
        .bind(&record.final_author)
        .bind(record.final_author_confidence)
        .bind(&record.final_series)
        .bind(&record.final_series_number)
        .bind(record.final_series_confidence)
        .bind(&record.final_publisher)
        .bind(record.final_publisher_confidence)
        .bind(&record.final_cover_path)
        .bind(record.final_cover_confidence)
        .bind(record.publication_year)
        .bind(&record.language)
        .bind(&record.isbn)
        .bind(&record.description)
        .bind(genres)
        .bind(extra)
        .bind(record.overall_confidence)
        .bind(record.completeness_score)
        .bind(record.is_reviewed)
        .bind(record.last_updated.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Invalid UUID in database: {}", e)))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid timestamp in database '{}': {}", value, e)))
}

fn detail_columns(detail: &CandidateDetail) -> (Option<bool>, Option<String>, Option<bool>) {
    match detail {
        CandidateDetail::None => (None, None, None),
        CandidateDetail::Author { is_main_author } => (Some(*is_main_author), None, None),
        CandidateDetail::Series { series_number } => (None, series_number.clone(), None),
        CandidateDetail::Cover { is_high_resolution } => (None, None, Some(*is_high_resolution)),
    }
}

fn flag(row: &SqliteRow, column: &str) -> Result<Option<bool>> {
    Ok(row.try_get::<Option<i64>, _>(column)?.map(|v| v != 0))
}

fn candidate_from_row(row: &SqliteRow) -> Result<Candidate> {
    let field = MetadataField::from_name(&row.try_get::<String, _>("field")?);
    let source: SourceKind = row.try_get::<String, _>("source")?.parse()?;

    let detail = match field {
        MetadataField::Author => CandidateDetail::Author {
            is_main_author: flag(row, "is_main_author")?.unwrap_or(false),
        },
        MetadataField::Series => CandidateDetail::Series {
            series_number: row.try_get("series_number")?,
        },
        MetadataField::Cover => CandidateDetail::Cover {
            is_high_resolution: flag(row, "is_high_resolution")?.unwrap_or(false),
        },
        _ => CandidateDetail::None,
    };

    Ok(Candidate {
        id: parse_uuid(&row.try_get::<String, _>("guid")?)?,
        book_id: parse_uuid(&row.try_get::<String, _>("book_guid")?)?,
        field,
        value: row.try_get("value")?,
        source,
        confidence: row.try_get("confidence")?,
        is_active: row.try_get::<i64, _>("is_active")? != 0,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        detail,
    })
}

fn final_from_row(row: &SqliteRow) -> Result<FinalMetadata> {
    let genres: Vec<String> = serde_json::from_str(&row.try_get::<String, _>("genres")?)
        .map_err(|e| Error::Internal(format!("Invalid genres in database: {}", e)))?;
    let extra: BTreeMap<String, String> = serde_json::from_str(&row.try_get::<String, _>("extra")?)
        .map_err(|e| Error::Internal(format!("Invalid extra fields in database: {}", e)))?;

    Ok(FinalMetadata {
        book_id: parse_uuid(&row.try_get::<String, _>("book_guid")?)?,
        final_title: row.try_get("final_title")?,
        final_title_confidence: row.try_get("final_title_confidence")?,
        final_author: row.try_get("final_author")?,
        final_author_confidence: row.try_get("final_author_confidence")?,
        final_series: row.try_get("final_series")?,
        final_series_number: row.try_get("final_series_number")?,
        final_series_confidence: row.try_get("final_series_confidence")?,
        final_publisher: row.try_get("final_publisher")?,
        final_publisher_confidence: row.try_get("final_publisher_confidence")?,
        final_cover_path: row.try_get("final_cover_path")?,
        final_cover_confidence: row.try_get("final_cover_confidence")?,
        publication_year: row
            .try_get::<Option<i64>, _>("publication_year")?
            .and_then(|y| i32::try_from(y).ok()),
        language: row.try_get("language")?,
        isbn: row.try_get("isbn")?,
        description: row.try_get("description")?,
        genres,
        extra,
        overall_confidence: row.try_get("overall_confidence")?,
        completeness_score: row.try_get("completeness_score")?,
        last_updated: parse_timestamp(&row.try_get::<String, _>("last_updated")?)?,
        is_reviewed: row.try_get::<i64, _>("is_reviewed")? != 0,
    })
}
