//! Confidence & Completeness Aggregator
//!
//! Derives the two dashboard scores stored on every final record.
//!
//! # Overall confidence
//! Weighted sum of four per-field confidences:
//! - title: 0.30
//! - author: 0.30
//! - series: 0.15
//! - cover: 0.25
//!
//! A field without a winner contributes 0.0 at its weight; weights are never
//! renormalized, so missing data lowers the score.
//!
//! # Completeness
//! `present / 8` over a fixed checklist: final_title, final_author,
//! final_cover_path, language, publication_year, isbn, final_series,
//! description. Blank strings, `"0"` and a zero year count as absent.

use crate::types::FinalMetadata;
use tracing::debug;

pub const TITLE_WEIGHT: f64 = 0.30;
pub const AUTHOR_WEIGHT: f64 = 0.30;
pub const SERIES_WEIGHT: f64 = 0.15;
pub const COVER_WEIGHT: f64 = 0.25;

/// Checklist size for the completeness score
pub const COMPLETENESS_FIELD_COUNT: usize = 8;

/// Confidence / completeness aggregator
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceAggregator;

impl ConfidenceAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Recompute both scores on `record`
    pub fn apply(&self, record: &mut FinalMetadata) {
        record.overall_confidence = self.overall_confidence(record);
        record.completeness_score = self.completeness_score(record);

        debug!(
            book_id = %record.book_id,
            overall = record.overall_confidence,
            completeness = record.completeness_score,
            "Aggregate scores updated"
        );
    }

    /// Weighted blend of title / author / series / cover confidence, in [0, 1]
    pub fn overall_confidence(&self, record: &FinalMetadata) -> f64 {
        let weighted = unit(record.final_title_confidence) * TITLE_WEIGHT
            + unit(record.final_author_confidence) * AUTHOR_WEIGHT
            + unit(record.final_series_confidence) * SERIES_WEIGHT
            + unit(record.final_cover_confidence) * COVER_WEIGHT;
        weighted.clamp(0.0, 1.0)
    }

    /// `k / 8` for `k` present checklist fields
    pub fn completeness_score(&self, record: &FinalMetadata) -> f64 {
        let present = checklist(record).iter().filter(|(_, present)| *present).count();
        present as f64 / COMPLETENESS_FIELD_COUNT as f64
    }

    /// Names of checklist fields that are absent
    pub fn missing_fields(&self, record: &FinalMetadata) -> Vec<&'static str> {
        checklist(record)
            .into_iter()
            .filter(|(_, present)| !present)
            .map(|(name, _)| name)
            .collect()
    }
}

fn checklist(record: &FinalMetadata) -> [(&'static str, bool); COMPLETENESS_FIELD_COUNT] {
    [
        ("final_title", is_present(&record.final_title)),
        ("final_author", is_present(&record.final_author)),
        ("final_cover_path", is_present(&record.final_cover_path)),
        ("language", is_present(&record.language)),
        (
            "publication_year",
            record.publication_year.is_some_and(|y| y != 0),
        ),
        ("isbn", is_present(&record.isbn)),
        ("final_series", is_present(&record.final_series)),
        ("description", is_present(&record.description)),
    ]
}

fn is_present(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && trimmed != "0"
}

fn unit(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}
