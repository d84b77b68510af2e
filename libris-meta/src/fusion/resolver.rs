// Metadata Resolver - Field-Wise Highest-Confidence Selection
//
// For each resolvable field the single best active candidate wins and its
// value + confidence are written into the final record. Resolution never
// fails: an empty candidate set resolves to "" / None with confidence 0.0.

use crate::fusion::aggregate::ConfidenceAggregator;
use crate::fusion::{ConflictReport, ResolutionReport};
use crate::types::{entity_key, Book, Candidate, FinalMetadata, MetadataField};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, warn};

/// First standalone 4-digit run, e.g. "Published in 2023"
static YEAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})\b").expect("year regex should compile"));

/// Metadata resolver
///
/// Pure decision logic over an in-memory candidate snapshot. Mutates only the
/// `FinalMetadata` it is given; the caller commits it as one unit.
#[derive(Debug, Clone, Default)]
pub struct MetadataResolver {
    aggregator: ConfidenceAggregator,
}

impl MetadataResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every field, then recompute aggregate scores
    ///
    /// Order: title → author → series → cover → publisher → publication_year →
    /// language → isbn → description → genre → generic fields by name.
    pub fn resolve_all(
        &self,
        book: &Book,
        candidates: &[Candidate],
        record: &mut FinalMetadata,
    ) -> ResolutionReport {
        let fields = resolution_order(candidates, record);
        self.resolve_fields(book, candidates, &fields, record)
    }

    /// Resolve only `fields`; aggregate scores are always recomputed
    pub fn resolve_fields(
        &self,
        book: &Book,
        candidates: &[Candidate],
        fields: &[MetadataField],
        record: &mut FinalMetadata,
    ) -> ResolutionReport {
        let mut report = ResolutionReport::default();

        for field in fields {
            let conflicts = self.resolve_field(book, field, candidates, record);
            report.fields.push(field.clone());
            report.conflicts.extend(conflicts);
        }

        self.aggregator.apply(record);

        debug!(
            book_id = %book.id,
            fields = report.fields.len(),
            conflicts = report.conflicts.len(),
            overall = record.overall_confidence,
            completeness = record.completeness_score,
            "Resolution pass complete"
        );

        report
    }

    /// Resolve a single field into `record`
    ///
    /// Returns conflicts between the winner and differing active candidates.
    pub fn resolve_field(
        &self,
        book: &Book,
        field: &MetadataField,
        candidates: &[Candidate],
        record: &mut FinalMetadata,
    ) -> Vec<ConflictReport> {
        let active: Vec<&Candidate> = candidates
            .iter()
            .filter(|c| c.book_id == book.id && is_eligible(field, c))
            .collect();

        if *field == MetadataField::Genre {
            record.genres = ranked_genres(&active);
            return Vec::new();
        }

        let winner = select_winner(field, active.iter().copied());
        let confidence = winner.map(|w| w.confidence).unwrap_or(0.0);
        let value = winner.map(|w| w.value.clone()).unwrap_or_default();

        match field {
            MetadataField::Title => {
                record.final_title = value;
                record.final_title_confidence = confidence;
            }
            MetadataField::Author => {
                record.final_author = value;
                record.final_author_confidence = confidence;
            }
            MetadataField::Series => {
                record.final_series = value;
                record.final_series_number = winner
                    .and_then(|w| w.series_number())
                    .unwrap_or_default()
                    .to_string();
                record.final_series_confidence = confidence;
            }
            MetadataField::Publisher => {
                record.final_publisher = value;
                record.final_publisher_confidence = confidence;
            }
            MetadataField::Cover => match (winner, book.fallback_cover_path.as_deref()) {
                (Some(w), _) => {
                    record.final_cover_path = w.value.clone();
                    record.final_cover_confidence = w.confidence;
                }
                (None, Some(fallback)) if !fallback.trim().is_empty() => {
                    debug!(book_id = %book.id, "No active cover candidate, using fallback path");
                    record.final_cover_path = fallback.to_string();
                    record.final_cover_confidence = 0.0;
                }
                (None, _) => {
                    record.final_cover_path = String::new();
                    record.final_cover_confidence = 0.0;
                }
            },
            MetadataField::PublicationYear => {
                record.publication_year = winner.and_then(|w| extract_year(&w.value));
            }
            MetadataField::Language => record.language = value,
            MetadataField::Isbn => record.isbn = value,
            MetadataField::Description => record.description = value,
            MetadataField::Other(name) => {
                if winner.is_some() {
                    record.extra.insert(name.clone(), value);
                } else {
                    record.extra.remove(name);
                }
            }
            MetadataField::Genre => unreachable!("genre handled above"),
        }

        match winner {
            Some(w) => {
                debug!(
                    field = %field,
                    source = %w.source,
                    confidence = w.confidence,
                    candidates = active.len(),
                    "Field resolved"
                );
                detect_conflicts(field, w, &active)
            }
            None => {
                debug!(field = %field, "No active candidates, field cleared");
                Vec::new()
            }
        }
    }
}

/// Full resolution order for a candidate snapshot
///
/// Generic fields already present on the record are included so that a field
/// whose last candidate was deactivated gets cleared.
pub fn resolution_order(candidates: &[Candidate], record: &FinalMetadata) -> Vec<MetadataField> {
    let mut order = vec![
        MetadataField::Title,
        MetadataField::Author,
        MetadataField::Series,
        MetadataField::Cover,
        MetadataField::Publisher,
    ];
    order.extend(MetadataField::DYNAMIC.iter().cloned());
    order.push(MetadataField::Genre);

    let generic: BTreeSet<String> = candidates
        .iter()
        .filter(|c| c.is_active)
        .filter_map(|c| match &c.field {
            MetadataField::Other(name) => Some(name.clone()),
            _ => None,
        })
        .chain(record.extra.keys().cloned())
        .collect();
    order.extend(generic.into_iter().map(MetadataField::Other));

    order
}

/// Pick the best active candidate for `field`
///
/// Highest confidence wins; ties use [`compare_candidates`].
pub fn select_winner<'a, I>(field: &MetadataField, candidates: I) -> Option<&'a Candidate>
where
    I: IntoIterator<Item = &'a Candidate>,
{
    candidates
        .into_iter()
        .filter(|c| is_eligible(field, c))
        .max_by(|a, b| compare_candidates(field, a, b))
}

/// Total order over candidates of one field (`Greater` = better)
///
/// 1. confidence
/// 2. author: `is_main_author`; cover: `is_high_resolution`
/// 3. source trust level
/// 4. earlier `created_at`
/// 5. smaller id
pub fn compare_candidates(field: &MetadataField, a: &Candidate, b: &Candidate) -> Ordering {
    a.confidence
        .total_cmp(&b.confidence)
        .then_with(|| match field {
            MetadataField::Author => a.is_main_author().cmp(&b.is_main_author()),
            MetadataField::Cover => a.is_high_resolution().cmp(&b.is_high_resolution()),
            _ => Ordering::Equal,
        })
        .then_with(|| a.source.trust_level().total_cmp(&b.source.trust_level()))
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| b.id.cmp(&a.id))
}

/// Extract a 4-digit year from free text; `None` when there is none
pub fn extract_year(text: &str) -> Option<i32> {
    YEAR_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<i32>().ok())
}

// Blank values never win; they would make "" ambiguous with "no winner".
fn is_eligible(field: &MetadataField, candidate: &Candidate) -> bool {
    candidate.is_active && &candidate.field == field && !candidate.value.trim().is_empty()
}

fn ranked_genres(active: &[&Candidate]) -> Vec<String> {
    let mut ranked: Vec<&Candidate> = active.to_vec();
    ranked.sort_by(|a, b| compare_candidates(&MetadataField::Genre, b, a));

    let mut seen = HashSet::new();
    ranked
        .into_iter()
        .filter(|c| seen.insert(c.entity_key()))
        .map(|c| c.value.clone())
        .collect()
}

fn detect_conflicts(
    field: &MetadataField,
    winner: &Candidate,
    active: &[&Candidate],
) -> Vec<ConflictReport> {
    let winning_key = winner.entity_key();
    let mut seen = HashSet::new();

    let conflicts: Vec<ConflictReport> = active
        .iter()
        .filter(|c| c.id != winner.id)
        .filter(|c| {
            let key = entity_key(&c.value);
            key != winning_key && seen.insert(key)
        })
        .map(|c| ConflictReport {
            field: field.clone(),
            winning_value: winner.value.clone(),
            winning_source: winner.source,
            value: c.value.clone(),
            source: c.source,
            similarity: strsim::normalized_levenshtein(
                &winning_key,
                &entity_key(&c.value),
            ),
        })
        .collect();

    if !conflicts.is_empty() {
        warn!(
            "Conflicts detected for field '{}': {} differing values, kept '{}' from {}",
            field,
            conflicts.len(),
            winner.value,
            winner.source
        );
    }

    conflicts
}
