//! Metadata Service
//!
//! Explicit orchestration over a [`MetadataStore`]:
//! ingest candidates → resolve → aggregate → commit.
//!
//! Nothing here runs implicitly: recording a candidate never triggers
//! resolution, and resolution is a separate call. The one cascade is cover
//! deactivation, which re-resolves the cover when the final record points at
//! the deactivated image.
//!
//! **Review freeze:** a record with `is_reviewed = true` is skipped by
//! automatic resolution. Manual entry and the cover cascade still apply.

use crate::fusion::aggregate::ConfidenceAggregator;
use crate::fusion::resolver::MetadataResolver;
use crate::fusion::ResolutionReport;
use crate::parser::{clean_filename, split_author_names, ai, FilenameParser, ParsedFilename};
use crate::predictor::{MetadataPredictor, Prediction, Predictions};
use crate::store::MetadataStore;
use crate::types::{Book, Candidate, FinalMetadata, MetadataField, NewCandidate, SourceKind};
use chrono::Utc;
use libris_common::config::ResolverConfig;
use libris_common::{Error, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A human-entered value, one variant per field kind
#[derive(Debug, Clone, PartialEq)]
pub enum ManualValue {
    Title(String),
    Author(String),
    Series { name: String, number: Option<String> },
    Publisher(String),
    Cover(String),
    Genres(Vec<String>),
    PublicationYear(i32),
    Language(String),
    Isbn(String),
    Description(String),
    /// Generic field submitted under an arbitrary name
    Other { name: String, value: String },
}

impl ManualValue {
    pub fn field(&self) -> MetadataField {
        match self {
            ManualValue::Title(_) => MetadataField::Title,
            ManualValue::Author(_) => MetadataField::Author,
            ManualValue::Series { .. } => MetadataField::Series,
            ManualValue::Publisher(_) => MetadataField::Publisher,
            ManualValue::Cover(_) => MetadataField::Cover,
            ManualValue::Genres(_) => MetadataField::Genre,
            ManualValue::PublicationYear(_) => MetadataField::PublicationYear,
            ManualValue::Language(_) => MetadataField::Language,
            ManualValue::Isbn(_) => MetadataField::Isbn,
            ManualValue::Description(_) => MetadataField::Description,
            ManualValue::Other { name, .. } => MetadataField::from_name(name),
        }
    }
}

/// Metadata service
pub struct MetadataService<S: MetadataStore> {
    store: Arc<S>,
    resolver: MetadataResolver,
    aggregator: ConfidenceAggregator,
    parser: FilenameParser,
    predictor: Option<Arc<dyn MetadataPredictor>>,
    config: ResolverConfig,
}

impl<S: MetadataStore> MetadataService<S> {
    /// Service with default resolver settings and no predictor
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, ResolverConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: ResolverConfig) -> Self {
        Self {
            store,
            resolver: MetadataResolver::new(),
            aggregator: ConfidenceAggregator::new(),
            parser: FilenameParser::with_folder_depth(config.folder_depth),
            predictor: None,
            config,
        }
    }

    /// Attach a filename predictor used by [`MetadataService::ingest_filename`]
    pub fn with_predictor(mut self, predictor: Arc<dyn MetadataPredictor>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Register a book together with its (empty) final record
    pub async fn create_book(&self, book: &Book) -> Result<FinalMetadata> {
        self.store.insert_book(book).await?;

        let mut record = FinalMetadata::new(book.id);
        self.aggregator.apply(&mut record);
        self.store.save_final(&record).await?;

        info!(book_id = %book.id, path = %book.file_path, "Created book");
        Ok(record)
    }

    /// Record one candidate without resolving
    pub async fn record_candidate(&self, candidate: NewCandidate) -> Result<Candidate> {
        let stored = self.store.record_candidate(candidate).await?;
        debug!(
            book_id = %stored.book_id,
            field = %stored.field,
            source = %stored.source,
            confidence = stored.confidence,
            "Recorded candidate"
        );
        Ok(stored)
    }

    /// Record title / author / series candidates from a filename parse
    ///
    /// Every candidate carries the source's trust level as confidence; the
    /// first author is the main author.
    pub async fn ingest_parsed_filename(
        &self,
        book_id: Uuid,
        parsed: &ParsedFilename,
        source: SourceKind,
    ) -> Result<Vec<Candidate>> {
        let confidence = source.trust_level();
        let mut submissions = Vec::new();

        if !parsed.title.trim().is_empty() {
            submissions.push(NewCandidate::new(
                book_id,
                MetadataField::Title,
                parsed.title.as_str(),
                source,
                confidence,
            ));
        }
        for (index, author) in parsed.authors.iter().enumerate() {
            submissions.push(
                NewCandidate::new(book_id, MetadataField::Author, author.as_str(), source, confidence)
                    .main_author(index == 0),
            );
        }
        if !parsed.series.trim().is_empty() {
            submissions.push(
                NewCandidate::new(
                    book_id,
                    MetadataField::Series,
                    parsed.series.as_str(),
                    source,
                    confidence,
                )
                .series_number(parsed.series_number.map(|n| n.to_string())),
            );
        }

        let mut recorded = Vec::with_capacity(submissions.len());
        for submission in submissions {
            recorded.push(self.store.record_candidate(submission).await?);
        }

        debug!(
            book_id = %book_id,
            source = %source,
            candidates = recorded.len(),
            "Ingested parsed filename"
        );
        Ok(recorded)
    }

    /// Parse `filename`, consult the predictor if configured, record candidates
    ///
    /// Heuristic values are recorded as `Filename` candidates; confident
    /// predictions as `AiPrediction` candidates with their own confidence.
    /// Returns the merged parse.
    pub async fn ingest_filename(
        &self,
        book_id: Uuid,
        filename: &str,
        folder: Option<&Path>,
    ) -> Result<ParsedFilename> {
        let heuristic = self.parser.parse(filename, folder);
        self.ingest_parsed_filename(book_id, &heuristic, SourceKind::Filename)
            .await?;

        let Some(predictor) = self.predictor.as_ref() else {
            return Ok(heuristic);
        };
        let Some(predictions) = self.predict(filename).await else {
            return Ok(heuristic);
        };
        if !predictor.are_predictions_confident(&predictions) {
            debug!(book_id = %book_id, filename, "No prediction cleared the threshold");
            return Ok(heuristic);
        }

        self.ingest_predictions(book_id, &predictions).await?;

        Ok(ai::merge_predictions(
            heuristic,
            &predictions,
            predictor.confidence_threshold(),
            self.config.predictor_override,
        ))
    }

    /// Apply a human-entered value
    ///
    /// Records a `ManualEntry` candidate at confidence 1.0 and writes the value
    /// straight into the final record, bypassing resolution. Works on
    /// reviewed records. Aggregate scores are refreshed.
    pub async fn apply_manual(&self, book_id: Uuid, value: ManualValue) -> Result<FinalMetadata> {
        self.require_book(book_id).await?;
        let mut record = self.load_or_new(book_id).await?;
        let field = value.field();
        let field_name = field.to_string();

        match value {
            ManualValue::Title(title) => {
                let stored = self.record_manual(book_id, field, &title).await?;
                record.final_title = stored.value;
                record.final_title_confidence = stored.confidence;
            }
            ManualValue::Author(author) => {
                let candidate = NewCandidate::new(book_id, field, author, SourceKind::ManualEntry, 1.0)
                    .main_author(true);
                let stored = self.record_manual_candidate(candidate).await?;
                record.final_author = stored.value;
                record.final_author_confidence = stored.confidence;
            }
            ManualValue::Series { name, number } => {
                let candidate = NewCandidate::new(book_id, field, name, SourceKind::ManualEntry, 1.0)
                    .series_number(number);
                let stored = self.record_manual_candidate(candidate).await?;
                record.final_series_number = stored.series_number().unwrap_or_default().to_string();
                record.final_series = stored.value;
                record.final_series_confidence = stored.confidence;
            }
            ManualValue::Publisher(publisher) => {
                let stored = self.record_manual(book_id, field, &publisher).await?;
                record.final_publisher = stored.value;
                record.final_publisher_confidence = stored.confidence;
            }
            ManualValue::Cover(path) => {
                let candidate = NewCandidate::new(book_id, field, path, SourceKind::ManualEntry, 1.0)
                    .high_resolution(true);
                let stored = self.record_manual_candidate(candidate).await?;
                record.final_cover_path = stored.value;
                record.final_cover_confidence = stored.confidence;
            }
            ManualValue::Genres(genres) => {
                if genres.iter().all(|g| g.trim().is_empty()) {
                    return Err(Error::InvalidInput("Manual genre list is empty".to_string()));
                }
                // A manual genre list replaces the previous one as a whole
                self.retire_manual(book_id, &field).await?;
                let mut values = Vec::new();
                for genre in genres.iter().filter(|g| !g.trim().is_empty()) {
                    let candidate =
                        NewCandidate::new(book_id, field.clone(), genre.as_str(), SourceKind::ManualEntry, 1.0);
                    let stored = self.store.record_candidate(candidate).await?;
                    if !values.iter().any(|v: &String| v.eq_ignore_ascii_case(&stored.value)) {
                        values.push(stored.value);
                    }
                }
                record.genres = values;
            }
            ManualValue::PublicationYear(year) => {
                self.record_manual(book_id, field, &year.to_string()).await?;
                record.publication_year = Some(year);
            }
            ManualValue::Language(language) => {
                record.language = self.record_manual(book_id, field, &language).await?.value;
            }
            ManualValue::Isbn(isbn) => {
                record.isbn = self.record_manual(book_id, field, &isbn).await?.value;
            }
            ManualValue::Description(description) => {
                record.description = self.record_manual(book_id, field, &description).await?.value;
            }
            ManualValue::Other { name, value } => {
                let MetadataField::Other(key) = field.clone() else {
                    return Err(Error::InvalidInput(format!(
                        "'{}' is a dedicated field, use its own manual value",
                        name
                    )));
                };
                let stored = self.record_manual(book_id, field, &value).await?;
                record.extra.insert(key, stored.value);
            }
        }

        self.aggregator.apply(&mut record);
        record.last_updated = Utc::now();
        self.store.save_final(&record).await?;

        info!(book_id = %book_id, field = %field_name, "Applied manual value");
        Ok(record)
    }

    /// Resolve every field of a book and commit the final record
    ///
    /// Reviewed records are left untouched and an empty report is returned.
    pub async fn resolve_book(&self, book_id: Uuid) -> Result<ResolutionReport> {
        let book = self.require_book(book_id).await?;
        let existing = self.store.load_final(book_id).await?;
        if existing.as_ref().is_some_and(|r| r.is_reviewed) {
            info!(book_id = %book_id, "Record is reviewed, skipping resolution");
            return Ok(ResolutionReport::default());
        }

        let candidates = self.store.active_candidates_for_book(book_id).await?;
        let mut record = existing
            .clone()
            .unwrap_or_else(|| FinalMetadata::new(book_id));
        let report = self.resolver.resolve_all(&book, &candidates, &mut record);
        self.commit(existing, record).await?;

        info!(
            book_id = %book_id,
            candidates = candidates.len(),
            conflicts = report.conflicts.len(),
            "Resolved book metadata"
        );
        Ok(report)
    }

    /// Re-resolve only `fields`; aggregate scores are always refreshed
    pub async fn resolve_fields(
        &self,
        book_id: Uuid,
        fields: &[MetadataField],
    ) -> Result<ResolutionReport> {
        let book = self.require_book(book_id).await?;
        let existing = self.store.load_final(book_id).await?;
        if existing.as_ref().is_some_and(|r| r.is_reviewed) {
            info!(book_id = %book_id, "Record is reviewed, skipping field resolution");
            return Ok(ResolutionReport::default());
        }

        let mut candidates = Vec::new();
        for field in fields {
            candidates.extend(self.store.active_candidates(book_id, field).await?);
        }

        let mut record = existing
            .clone()
            .unwrap_or_else(|| FinalMetadata::new(book_id));
        let report = self.resolver.resolve_fields(&book, &candidates, fields, &mut record);
        self.commit(existing, record).await?;

        debug!(book_id = %book_id, fields = fields.len(), "Resolved fields");
        Ok(report)
    }

    /// Deactivate a candidate
    ///
    /// When it is the cover the final record currently shows, the cover is
    /// re-resolved immediately (reviewed or not), falling back to the book's
    /// fallback cover.
    pub async fn deactivate_candidate(&self, candidate_id: Uuid) -> Result<Option<Candidate>> {
        let Some(candidate) = self.store.set_candidate_active(candidate_id, false).await? else {
            return Ok(None);
        };
        debug!(candidate_id = %candidate_id, field = %candidate.field, "Deactivated candidate");

        if candidate.field != MetadataField::Cover {
            return Ok(Some(candidate));
        }

        let Some(existing) = self.store.load_final(candidate.book_id).await? else {
            return Ok(Some(candidate));
        };
        if existing.final_cover_path != candidate.value {
            return Ok(Some(candidate));
        }

        let book = self.require_book(candidate.book_id).await?;
        let covers = self
            .store
            .active_candidates(candidate.book_id, &MetadataField::Cover)
            .await?;
        let mut record = existing.clone();
        self.resolver
            .resolve_fields(&book, &covers, &[MetadataField::Cover], &mut record);
        info!(
            book_id = %book.id,
            cover = %record.final_cover_path,
            "Cover re-resolved after deactivation"
        );
        self.commit(Some(existing), record).await?;

        Ok(Some(candidate))
    }

    /// Set or clear the human review flag
    pub async fn set_reviewed(&self, book_id: Uuid, reviewed: bool) -> Result<FinalMetadata> {
        self.require_book(book_id).await?;
        let mut record = self.load_or_new(book_id).await?;
        record.is_reviewed = reviewed;
        record.last_updated = Utc::now();
        self.store.save_final(&record).await?;

        info!(book_id = %book_id, reviewed, "Review status updated");
        Ok(record)
    }

    /// Current final record (read-only)
    pub async fn final_metadata(&self, book_id: Uuid) -> Result<Option<FinalMetadata>> {
        self.store.load_final(book_id).await
    }

    /// Every candidate of a book, active or not
    pub async fn candidates(&self, book_id: Uuid) -> Result<Vec<Candidate>> {
        self.store.all_candidates_for_book(book_id).await
    }

    async fn require_book(&self, book_id: Uuid) -> Result<Book> {
        self.store
            .book(book_id)
            .await?
            .ok_or_else(|| Error::unknown_book(book_id))
    }

    async fn load_or_new(&self, book_id: Uuid) -> Result<FinalMetadata> {
        Ok(self
            .store
            .load_final(book_id)
            .await?
            .unwrap_or_else(|| FinalMetadata::new(book_id)))
    }

    async fn record_manual(&self, book_id: Uuid, field: MetadataField, value: &str) -> Result<Candidate> {
        let candidate = NewCandidate::new(book_id, field, value, SourceKind::ManualEntry, 1.0);
        self.record_manual_candidate(candidate).await
    }

    async fn record_manual_candidate(&self, candidate: NewCandidate) -> Result<Candidate> {
        if candidate.value.is_empty() {
            return Err(Error::InvalidInput(format!(
                "Manual {} value is empty",
                candidate.field
            )));
        }
        self.retire_manual(candidate.book_id, &candidate.field).await?;
        self.store.record_candidate(candidate).await
    }

    /// Deactivate earlier manual entries for `field` so the newest edit stays the winner
    async fn retire_manual(&self, book_id: Uuid, field: &MetadataField) -> Result<()> {
        for earlier in self.store.active_candidates(book_id, field).await? {
            if earlier.source == SourceKind::ManualEntry {
                debug!(candidate_id = %earlier.id, field = %field, "Superseding manual entry");
                self.store.set_candidate_active(earlier.id, false).await?;
            }
        }
        Ok(())
    }

    /// Save `record` unless it equals `previous`; bumps `last_updated` on change
    async fn commit(&self, previous: Option<FinalMetadata>, mut record: FinalMetadata) -> Result<()> {
        if let Some(previous) = &previous {
            record.last_updated = previous.last_updated;
            if *previous == record {
                debug!(book_id = %record.book_id, "Final record unchanged");
                return Ok(());
            }
        }
        record.last_updated = Utc::now();
        self.store.save_final(&record).await
    }

    async fn ingest_predictions(&self, book_id: Uuid, predictions: &Predictions) -> Result<()> {
        let Some(predictor) = &self.predictor else {
            return Ok(());
        };

        let confident = |p: &Option<Prediction>| {
            p.as_ref()
                .filter(|p| predictor.is_prediction_confident(p) && !p.value.trim().is_empty())
                .cloned()
        };

        if let Some(title) = confident(&predictions.title) {
            self.store
                .record_candidate(NewCandidate::new(
                    book_id,
                    MetadataField::Title,
                    title.value,
                    SourceKind::AiPrediction,
                    title.confidence,
                ))
                .await?;
        }
        if let Some(author) = confident(&predictions.author) {
            for (index, name) in split_author_names(&author.value).into_iter().enumerate() {
                self.store
                    .record_candidate(
                        NewCandidate::new(
                            book_id,
                            MetadataField::Author,
                            name,
                            SourceKind::AiPrediction,
                            author.confidence,
                        )
                        .main_author(index == 0),
                    )
                    .await?;
            }
        }
        if let Some(series) = confident(&predictions.series) {
            let number = confident(&predictions.series_number).map(|n| n.value);
            self.store
                .record_candidate(
                    NewCandidate::new(
                        book_id,
                        MetadataField::Series,
                        series.value,
                        SourceKind::AiPrediction,
                        series.confidence,
                    )
                    .series_number(number),
                )
                .await?;
        }
        Ok(())
    }

    /// Run the predictor off the async runtime, bounded by the configured timeout
    async fn predict(&self, filename: &str) -> Option<Predictions> {
        let predictor = self.predictor.clone()?;
        let cleaned = clean_filename(filename);
        let limit = Duration::from_millis(self.config.predictor_timeout_ms);

        let task = tokio::task::spawn_blocking(move || predictor.predict_metadata(&cleaned));
        match tokio::time::timeout(limit, task).await {
            Ok(Ok(Ok(predictions))) => Some(predictions),
            Ok(Ok(Err(e))) => {
                warn!("Predictor failed for '{}', using heuristic parse: {}", filename, e);
                None
            }
            Ok(Err(e)) => {
                warn!("Predictor task failed for '{}': {}", filename, e);
                None
            }
            Err(_) => {
                warn!(
                    "Predictor timed out after {} ms for '{}', using heuristic parse",
                    limit.as_millis(),
                    filename
                );
                None
            }
        }
    }
}
