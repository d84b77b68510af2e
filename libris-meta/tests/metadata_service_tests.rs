//! Ingest → resolve → commit against the SQLite store

use libris_common::db::{init_database, init_memory_database};
use libris_common::Error;
use libris_meta::services::ManualValue;
use libris_meta::store::SqliteStore;
use libris_meta::{Book, MetadataField, MetadataService, NewCandidate, SourceKind};
use std::sync::Arc;
use tempfile::TempDir;

async fn sqlite_service() -> MetadataService<SqliteStore> {
    let pool = init_memory_database().await.unwrap();
    MetadataService::new(Arc::new(SqliteStore::new(pool)))
}

#[tokio::test]
async fn test_ingest_and_resolve_filename() {
    let service = sqlite_service().await;
    let book = Book::new("/library/Fantasy Series - 02 - Book Title - John Doe.epub");
    service.create_book(&book).await.unwrap();

    service
        .ingest_filename(book.id, "Fantasy Series - 02 - Book Title - John Doe.epub", None)
        .await
        .unwrap();
    let report = service.resolve_book(book.id).await.unwrap();
    assert_eq!(report.fields[0], MetadataField::Title);

    let record = service.final_metadata(book.id).await.unwrap().unwrap();
    assert_eq!(record.final_title, "Book Title");
    assert_eq!(record.final_author, "John Doe");
    assert_eq!(record.final_series, "Fantasy Series");
    assert_eq!(record.final_series_number, "2");
    assert_eq!(record.final_title_confidence, SourceKind::Filename.trust_level());
    assert_eq!(record.completeness_score, 3.0 / 8.0);
}

#[tokio::test]
async fn test_manual_override_wins_immediately() {
    let service = sqlite_service().await;
    let book = Book::new("/library/mort.epub");
    service.create_book(&book).await.unwrap();

    service
        .record_candidate(NewCandidate::new(
            book.id,
            MetadataField::Author,
            "T. Pratchett",
            SourceKind::OpfFile,
            0.95,
        ))
        .await
        .unwrap();
    service.resolve_book(book.id).await.unwrap();

    let record = service
        .apply_manual(book.id, ManualValue::Author("Terry Pratchett".to_string()))
        .await
        .unwrap();
    assert_eq!(record.final_author, "Terry Pratchett");
    assert_eq!(record.final_author_confidence, 1.0);

    let stored = service.final_metadata(book.id).await.unwrap().unwrap();
    assert_eq!(stored.final_author, "Terry Pratchett");
    assert_eq!(stored.final_author_confidence, 1.0);
    assert!((stored.overall_confidence - 0.30).abs() < 1e-9);
}

#[tokio::test]
async fn test_second_manual_edit_replaces_first() {
    let service = sqlite_service().await;
    let book = Book::new("/library/mort.epub");
    service.create_book(&book).await.unwrap();

    for title in ["First Edit", "Corrected Edit"] {
        service
            .apply_manual(book.id, ManualValue::Title(title.to_string()))
            .await
            .unwrap();
    }
    service.resolve_book(book.id).await.unwrap();

    let record = service.final_metadata(book.id).await.unwrap().unwrap();
    assert_eq!(record.final_title, "Corrected Edit");
    assert_eq!(record.final_title_confidence, 1.0);

    let manual: Vec<_> = service
        .candidates(book.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|c| c.source == SourceKind::ManualEntry)
        .collect();
    assert_eq!(manual.len(), 2);
    assert_eq!(manual.iter().filter(|c| c.is_active).count(), 1);
}

#[tokio::test]
async fn test_reviewed_record_ignores_new_candidates() {
    let service = sqlite_service().await;
    let book = Book::new("/library/mort.epub");
    service.create_book(&book).await.unwrap();

    service
        .record_candidate(NewCandidate::new(book.id, MetadataField::Title, "Mort", SourceKind::OpfFile, 0.9))
        .await
        .unwrap();
    service.resolve_book(book.id).await.unwrap();
    service.set_reviewed(book.id, true).await.unwrap();

    service
        .record_candidate(NewCandidate::new(
            book.id,
            MetadataField::Title,
            "Mort: A Discworld Novel",
            SourceKind::GoogleBooks,
            0.99,
        ))
        .await
        .unwrap();
    service.resolve_book(book.id).await.unwrap();
    service
        .resolve_fields(book.id, &[MetadataField::Title])
        .await
        .unwrap();

    let record = service.final_metadata(book.id).await.unwrap().unwrap();
    assert_eq!(record.final_title, "Mort");
    assert!(record.is_reviewed);
}

#[tokio::test]
async fn test_single_field_resolution_leaves_others() {
    let service = sqlite_service().await;
    let book = Book::new("/library/mort.epub");
    service.create_book(&book).await.unwrap();

    service
        .record_candidate(NewCandidate::new(book.id, MetadataField::Title, "Mort", SourceKind::OpfFile, 0.9))
        .await
        .unwrap();
    service
        .record_candidate(NewCandidate::new(book.id, MetadataField::Language, "en", SourceKind::OpfFile, 0.9))
        .await
        .unwrap();

    let report = service
        .resolve_fields(book.id, &[MetadataField::Title])
        .await
        .unwrap();
    assert_eq!(report.fields, vec![MetadataField::Title]);

    let record = service.final_metadata(book.id).await.unwrap().unwrap();
    assert_eq!(record.final_title, "Mort");
    assert_eq!(record.language, "");
    assert_eq!(record.completeness_score, 1.0 / 8.0);
}

#[tokio::test]
async fn test_cover_deactivation_falls_back() {
    let service = sqlite_service().await;
    let book = Book::new("/library/mort.epub").with_fallback_cover("/covers/placeholder.png");
    service.create_book(&book).await.unwrap();

    let cover = service
        .record_candidate(
            NewCandidate::new(book.id, MetadataField::Cover, "/covers/mort.jpg", SourceKind::OpenLibrary, 0.8)
                .high_resolution(true),
        )
        .await
        .unwrap();
    service.resolve_book(book.id).await.unwrap();
    let record = service.final_metadata(book.id).await.unwrap().unwrap();
    assert_eq!(record.final_cover_path, "/covers/mort.jpg");

    let deactivated = service.deactivate_candidate(cover.id).await.unwrap().unwrap();
    assert!(!deactivated.is_active);

    let record = service.final_metadata(book.id).await.unwrap().unwrap();
    assert_eq!(record.final_cover_path, "/covers/placeholder.png");
    assert_eq!(record.final_cover_confidence, 0.0);

    let audit = service.candidates(book.id).await.unwrap();
    assert_eq!(audit.len(), 1);
    assert!(!audit[0].is_active);
}

#[tokio::test]
async fn test_unknown_book_errors() {
    let service = sqlite_service().await;
    let missing = uuid::Uuid::new_v4();

    assert!(matches!(
        service.resolve_book(missing).await.unwrap_err(),
        Error::NotFound(_)
    ));
    assert!(matches!(
        service
            .apply_manual(missing, ManualValue::Title("Ghost".to_string()))
            .await
            .unwrap_err(),
        Error::NotFound(_)
    ));
    assert!(service.final_metadata(missing).await.unwrap().is_none());
}

#[tokio::test]
async fn test_final_record_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("libris.db");
    let book = Book::new("/library/mort.epub");

    {
        let pool = init_database(&db_path).await.unwrap();
        let service = MetadataService::new(Arc::new(SqliteStore::new(pool.clone())));
        service.create_book(&book).await.unwrap();
        service
            .apply_manual(book.id, ManualValue::Genres(vec!["Fantasy".to_string(), "Humour".to_string()]))
            .await
            .unwrap();
        service
            .apply_manual(book.id, ManualValue::PublicationYear(1987))
            .await
            .unwrap();
        pool.close().await;
    }

    let pool = init_database(&db_path).await.unwrap();
    let service = MetadataService::new(Arc::new(SqliteStore::new(pool)));
    let record = service.final_metadata(book.id).await.unwrap().unwrap();
    assert_eq!(record.genres, vec!["Fantasy".to_string(), "Humour".to_string()]);
    assert_eq!(record.publication_year, Some(1987));
    assert_eq!(record.completeness_score, 1.0 / 8.0);
}
