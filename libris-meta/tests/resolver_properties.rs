//! Resolution properties over hand-built candidate sets

use chrono::{Duration, Utc};
use libris_meta::fusion::resolver::select_winner;
use libris_meta::{
    Book, Candidate, ConfidenceAggregator, FinalMetadata, MetadataField, MetadataResolver,
    NewCandidate, SourceKind,
};

fn candidate(book: &Book, field: MetadataField, value: &str, source: SourceKind, confidence: f64) -> Candidate {
    NewCandidate::new(book.id, field, value, source, confidence).into_candidate(Utc::now())
}

fn resolve(book: &Book, candidates: &[Candidate]) -> FinalMetadata {
    let mut record = FinalMetadata::new(book.id);
    MetadataResolver::new().resolve_all(book, candidates, &mut record);
    record
}

#[test]
fn test_highest_confidence_wins_regardless_of_trust() {
    let book = Book::new("a.epub");
    let candidates = vec![
        candidate(&book, MetadataField::Title, "From OPF", SourceKind::OpfFile, 0.6),
        candidate(&book, MetadataField::Title, "From Filename", SourceKind::Filename, 0.85),
        candidate(&book, MetadataField::Title, "From Google", SourceKind::GoogleBooks, 0.7),
    ];

    let record = resolve(&book, &candidates);
    assert_eq!(record.final_title, "From Filename");
    assert_eq!(record.final_title_confidence, 0.85);
}

#[test]
fn test_ties_are_deterministic() {
    let book = Book::new("a.epub");
    let created = Utc::now();
    let mut candidates: Vec<Candidate> = ["Alpha", "Beta", "Gamma"]
        .into_iter()
        .map(|v| {
            NewCandidate::new(book.id, MetadataField::Language, v, SourceKind::OpenLibrary, 0.5)
                .into_candidate(created)
        })
        .collect();

    let forward = resolve(&book, &candidates);
    candidates.reverse();
    let backward = resolve(&book, &candidates);
    assert_eq!(forward.language, backward.language);
}

#[test]
fn test_author_tie_prefers_main_author() {
    let book = Book::new("a.epub");
    let created = Utc::now();
    let co_author = NewCandidate::new(book.id, MetadataField::Author, "Jane Roe", SourceKind::EpubMetadata, 0.8)
        .into_candidate(created);
    let main = NewCandidate::new(book.id, MetadataField::Author, "John Doe", SourceKind::EpubMetadata, 0.8)
        .main_author(true)
        .into_candidate(created);

    let record = resolve(&book, &[co_author, main]);
    assert_eq!(record.final_author, "John Doe");
}

#[test]
fn test_cover_tie_prefers_high_resolution() {
    let book = Book::new("a.epub").with_fallback_cover("/covers/fallback.jpg");
    let created = Utc::now();
    let thumbnail = NewCandidate::new(book.id, MetadataField::Cover, "/covers/opf-thumb.jpg", SourceKind::OpfFile, 0.7)
        .into_candidate(created);
    let full_size = NewCandidate::new(book.id, MetadataField::Cover, "/covers/google-full.jpg", SourceKind::GoogleBooks, 0.7)
        .high_resolution(true)
        .into_candidate(created);

    // Resolution outranks the more trusted source
    let record = resolve(&book, &[thumbnail.clone(), full_size.clone()]);
    assert_eq!(record.final_cover_path, "/covers/google-full.jpg");
    assert_eq!(record.final_cover_confidence, 0.7);

    let record = resolve(&book, &[full_size, thumbnail]);
    assert_eq!(record.final_cover_path, "/covers/google-full.jpg");
}

#[test]
fn test_tie_on_everything_prefers_earlier_candidate() {
    let book = Book::new("a.epub");
    let now = Utc::now();
    let newer = NewCandidate::new(book.id, MetadataField::Isbn, "9780000000002", SourceKind::OpenLibrary, 0.5)
        .into_candidate(now);
    let older = NewCandidate::new(book.id, MetadataField::Isbn, "9780000000001", SourceKind::OpenLibrary, 0.5)
        .into_candidate(now - Duration::seconds(30));

    let record = resolve(&book, &[newer, older]);
    assert_eq!(record.isbn, "9780000000001");
}

#[test]
fn test_inactive_candidates_never_win() {
    let book = Book::new("a.epub");
    let mut candidates = vec![
        candidate(&book, MetadataField::Publisher, "Gollancz", SourceKind::GoogleBooks, 0.9),
        candidate(&book, MetadataField::Publisher, "Corgi", SourceKind::Filename, 0.3),
    ];
    assert_eq!(resolve(&book, &candidates).final_publisher, "Gollancz");

    candidates[0].is_active = false;
    let record = resolve(&book, &candidates);
    assert_eq!(record.final_publisher, "Corgi");
    assert_eq!(record.final_publisher_confidence, 0.3);

    candidates[1].is_active = false;
    let record = resolve(&book, &candidates);
    assert_eq!(record.final_publisher, "");
    assert_eq!(record.final_publisher_confidence, 0.0);
    assert!(select_winner(&MetadataField::Publisher, candidates.iter()).is_none());
}

#[test]
fn test_resolution_is_idempotent() {
    let book = Book::new("a.epub").with_fallback_cover("/covers/fallback.jpg");
    let candidates = vec![
        candidate(&book, MetadataField::Title, "Mort", SourceKind::OpfFile, 0.9),
        candidate(&book, MetadataField::Author, "Terry Pratchett", SourceKind::OpfFile, 0.9),
        candidate(&book, MetadataField::Series, "Discworld", SourceKind::OpenLibrary, 0.7),
        candidate(&book, MetadataField::Genre, "Fantasy", SourceKind::GoogleBooks, 0.8),
        candidate(&book, MetadataField::Genre, "Humour", SourceKind::OpenLibrary, 0.6),
        candidate(&book, MetadataField::PublicationYear, "First published 1987", SourceKind::OpenLibrary, 0.6),
        candidate(&book, MetadataField::from_name("page count"), "272", SourceKind::GoogleBooks, 0.6),
    ];

    let resolver = MetadataResolver::new();
    let mut record = FinalMetadata::new(book.id);
    resolver.resolve_all(&book, &candidates, &mut record);
    let first = record.clone();
    resolver.resolve_all(&book, &candidates, &mut record);

    assert_eq!(first, record);
    assert_eq!(record.publication_year, Some(1987));
    assert_eq!(record.genres, vec!["Fantasy".to_string(), "Humour".to_string()]);
    assert_eq!(record.extra.get("page_count").map(String::as_str), Some("272"));
    assert_eq!(record.final_cover_path, "/covers/fallback.jpg");
    assert_eq!(record.final_cover_confidence, 0.0);
}

#[test]
fn test_conflicts_reported_for_differing_values() {
    let book = Book::new("a.epub");
    let candidates = vec![
        candidate(&book, MetadataField::Title, "Mort", SourceKind::OpfFile, 0.9),
        candidate(&book, MetadataField::Title, "Mort (Discworld 4)", SourceKind::Filename, 0.2),
    ];

    let mut record = FinalMetadata::new(book.id);
    let report = MetadataResolver::new().resolve_all(&book, &candidates, &mut record);
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].winning_value, "Mort");
    assert!(report.conflicts[0].similarity < 1.0);
}

#[test]
fn test_scores_stay_in_bounds() {
    let book = Book::new("a.epub");
    let aggregator = ConfidenceAggregator::new();

    let empty = resolve(&book, &[]);
    assert_eq!(empty.overall_confidence, 0.0);
    assert_eq!(empty.completeness_score, 0.0);

    let candidates = vec![
        candidate(&book, MetadataField::Title, "Mort", SourceKind::ManualEntry, 1.0),
        candidate(&book, MetadataField::Author, "Terry Pratchett", SourceKind::ManualEntry, 1.0),
        candidate(&book, MetadataField::Series, "Discworld", SourceKind::ManualEntry, 1.0),
        candidate(&book, MetadataField::Cover, "/covers/mort.jpg", SourceKind::ManualEntry, 1.0),
        candidate(&book, MetadataField::Language, "en", SourceKind::ManualEntry, 1.0),
        candidate(&book, MetadataField::PublicationYear, "1987", SourceKind::ManualEntry, 1.0),
        candidate(&book, MetadataField::Isbn, "9780552131063", SourceKind::ManualEntry, 1.0),
        candidate(&book, MetadataField::Description, "Death takes an apprentice.", SourceKind::ManualEntry, 1.0),
    ];
    let full = resolve(&book, &candidates);
    assert!((full.overall_confidence - 1.0).abs() < 1e-9);
    assert_eq!(full.completeness_score, 1.0);

    for k in 0..=candidates.len() {
        let record = resolve(&book, &candidates[..k]);
        assert!((0.0..=1.0).contains(&record.overall_confidence));
        assert_eq!(record.completeness_score, k as f64 / 8.0);
        assert_eq!(aggregator.missing_fields(&record).len(), 8 - k);
    }
}
