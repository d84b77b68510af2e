//! Core Types for libris-meta
//!
//! Data contracts between the parser / ingestion side (which produces
//! candidates) and the resolver (which turns active candidates into one
//! final record per book).
//!
//! # Model
//! - **Candidate**: one sourced, confidence-scored proposal for a field value
//! - **Source**: fixed reference data carrying a trust level
//! - **FinalMetadata**: materialized winners plus aggregate scores

use chrono::{DateTime, Utc};
use libris_common::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Candidate / prediction confidence (0.0-1.0)
pub type Confidence = f64;

/// Clamp a confidence into [0.0, 1.0]; NaN becomes 0.0
pub fn clamp_confidence(confidence: f64) -> Confidence {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

// ============================================================================
// Field kinds
// ============================================================================

/// Logical metadata field a candidate proposes a value for
///
/// Closed set of known fields plus `Other` for generic metadata submitted
/// under an arbitrary name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetadataField {
    Title,
    Author,
    Series,
    Publisher,
    Cover,
    Genre,
    PublicationYear,
    Language,
    Isbn,
    Description,
    Other(String),
}

impl MetadataField {
    /// Fields with a dedicated slot resolved by the generic rule, in resolution order
    pub const DYNAMIC: [MetadataField; 4] = [
        MetadataField::PublicationYear,
        MetadataField::Language,
        MetadataField::Isbn,
        MetadataField::Description,
    ];

    /// Storage / display name
    pub fn as_str(&self) -> &str {
        match self {
            MetadataField::Title => "title",
            MetadataField::Author => "author",
            MetadataField::Series => "series",
            MetadataField::Publisher => "publisher",
            MetadataField::Cover => "cover",
            MetadataField::Genre => "genre",
            MetadataField::PublicationYear => "publication_year",
            MetadataField::Language => "language",
            MetadataField::Isbn => "isbn",
            MetadataField::Description => "description",
            MetadataField::Other(name) => name,
        }
    }

    /// Map a name to a field; unknown names become `Other(lowercased name)`
    pub fn from_name(name: &str) -> Self {
        let key = name.trim().to_lowercase().replace([' ', '-'], "_");
        match key.as_str() {
            "title" => MetadataField::Title,
            "author" | "authors" => MetadataField::Author,
            "series" => MetadataField::Series,
            "publisher" => MetadataField::Publisher,
            "cover" | "cover_path" => MetadataField::Cover,
            "genre" | "genres" => MetadataField::Genre,
            "publication_year" | "year" => MetadataField::PublicationYear,
            "language" => MetadataField::Language,
            "isbn" => MetadataField::Isbn,
            "description" => MetadataField::Description,
            _ => MetadataField::Other(key),
        }
    }

    /// Author / series / publisher reference a normalized related entity
    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            MetadataField::Author | MetadataField::Series | MetadataField::Publisher
        )
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Sources
// ============================================================================

/// Named origin of a candidate (immutable reference data)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    ManualEntry,
    OpfFile,
    GoogleBooks,
    OpenLibrary,
    ComicVine,
    EpubMetadata,
    MobiMetadata,
    PdfMetadata,
    ComicInfo,
    ContentScan,
    AiPrediction,
    Filename,
}

impl SourceKind {
    pub const ALL: [SourceKind; 12] = [
        SourceKind::ManualEntry,
        SourceKind::OpfFile,
        SourceKind::GoogleBooks,
        SourceKind::OpenLibrary,
        SourceKind::ComicVine,
        SourceKind::EpubMetadata,
        SourceKind::MobiMetadata,
        SourceKind::PdfMetadata,
        SourceKind::ComicInfo,
        SourceKind::ContentScan,
        SourceKind::AiPrediction,
        SourceKind::Filename,
    ];

    /// Fixed trust level of this source
    pub fn trust_level(self) -> f64 {
        match self {
            Self::ManualEntry => 1.0,
            Self::OpfFile => 0.9,
            Self::GoogleBooks => 0.85,
            Self::ComicVine => 0.85,
            Self::OpenLibrary => 0.8,
            Self::EpubMetadata => 0.8,
            Self::ComicInfo => 0.8,
            Self::MobiMetadata => 0.75,
            Self::ContentScan => 0.65,
            Self::PdfMetadata => 0.6,
            Self::AiPrediction => 0.4,
            Self::Filename => 0.2,
        }
    }

    /// Lookup name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ManualEntry => "Manual Entry",
            Self::OpfFile => "OPF File",
            Self::GoogleBooks => "Google Books",
            Self::OpenLibrary => "Open Library",
            Self::ComicVine => "Comic Vine",
            Self::EpubMetadata => "EPUB",
            Self::MobiMetadata => "MOBI",
            Self::PdfMetadata => "PDF",
            Self::ComicInfo => "ComicInfo",
            Self::ContentScan => "Content Scan",
            Self::AiPrediction => "AI Prediction",
            Self::Filename => "Filename",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        SourceKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::InvalidInput(format!("Unknown source: {}", s)))
    }
}

// ============================================================================
// Candidates
// ============================================================================

/// Field-specific candidate detail used for tie-breaks and companions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CandidateDetail {
    None,
    Author { is_main_author: bool },
    /// `Some("")` and `None` both mean "no number"
    Series { series_number: Option<String> },
    Cover { is_high_resolution: bool },
}

/// One sourced, confidence-scored proposal for a field's value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: Uuid,
    pub book_id: Uuid,
    pub field: MetadataField,
    /// Display value (entity name for relational fields, path for covers)
    pub value: String,
    pub source: SourceKind,
    /// Proposer's certainty (0.0-1.0)
    pub confidence: Confidence,
    /// Inactive candidates are kept for audit but never win
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub detail: CandidateDetail,
}

impl Candidate {
    pub fn is_main_author(&self) -> bool {
        matches!(self.detail, CandidateDetail::Author { is_main_author: true })
    }

    pub fn is_high_resolution(&self) -> bool {
        matches!(self.detail, CandidateDetail::Cover { is_high_resolution: true })
    }

    /// Series number, `None` when absent or blank
    pub fn series_number(&self) -> Option<&str> {
        match &self.detail {
            CandidateDetail::Series { series_number: Some(n) } if !n.trim().is_empty() => {
                Some(n.trim())
            }
            _ => None,
        }
    }

    /// Related-entity identity for relational fields
    pub fn entity_key(&self) -> String {
        entity_key(&self.value)
    }
}

/// Case-folded, whitespace-collapsed identity of a related entity name
pub fn entity_key(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Candidate submission (id / timestamp assigned by the store)
#[derive(Debug, Clone, PartialEq)]
pub struct NewCandidate {
    pub book_id: Uuid,
    pub field: MetadataField,
    pub value: String,
    pub source: SourceKind,
    pub confidence: Confidence,
    pub detail: CandidateDetail,
}

impl NewCandidate {
    /// Create a submission with clamped confidence and the field's default detail
    pub fn new(
        book_id: Uuid,
        field: MetadataField,
        value: impl Into<String>,
        source: SourceKind,
        confidence: f64,
    ) -> Self {
        let detail = match field {
            MetadataField::Author => CandidateDetail::Author {
                is_main_author: false,
            },
            MetadataField::Series => CandidateDetail::Series {
                series_number: None,
            },
            MetadataField::Cover => CandidateDetail::Cover {
                is_high_resolution: false,
            },
            _ => CandidateDetail::None,
        };

        Self {
            book_id,
            field,
            value: value.into().trim().to_string(),
            source,
            confidence: clamp_confidence(confidence),
            detail,
        }
    }

    pub fn main_author(mut self, is_main_author: bool) -> Self {
        if self.field == MetadataField::Author {
            self.detail = CandidateDetail::Author { is_main_author };
        }
        self
    }

    pub fn series_number(mut self, series_number: Option<String>) -> Self {
        if self.field == MetadataField::Series {
            self.detail = CandidateDetail::Series { series_number };
        }
        self
    }

    pub fn high_resolution(mut self, is_high_resolution: bool) -> Self {
        if self.field == MetadataField::Cover {
            self.detail = CandidateDetail::Cover { is_high_resolution };
        }
        self
    }

    /// Materialize with a fresh id and creation time
    pub fn into_candidate(self, created_at: DateTime<Utc>) -> Candidate {
        Candidate {
            id: Uuid::new_v4(),
            book_id: self.book_id,
            field: self.field,
            value: self.value,
            source: self.source,
            confidence: self.confidence,
            is_active: true,
            created_at,
            detail: self.detail,
        }
    }
}

// ============================================================================
// Book and final record
// ============================================================================

/// Parent entity candidates and the final record attach to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: Uuid,
    /// Path the book was scanned from (informational)
    pub file_path: String,
    /// Last-resort cover when no active cover candidate exists
    pub fallback_cover_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Book {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_path: file_path.into(),
            fallback_cover_path: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_fallback_cover(mut self, path: impl Into<String>) -> Self {
        self.fallback_cover_path = Some(path.into());
        self
    }
}

/// Materialized, currently-authoritative metadata for one book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalMetadata {
    pub book_id: Uuid,

    pub final_title: String,
    pub final_title_confidence: Confidence,

    pub final_author: String,
    pub final_author_confidence: Confidence,

    pub final_series: String,
    /// Empty when the winning series candidate carries no number
    pub final_series_number: String,
    pub final_series_confidence: Confidence,

    pub final_publisher: String,
    pub final_publisher_confidence: Confidence,

    pub final_cover_path: String,
    pub final_cover_confidence: Confidence,

    pub publication_year: Option<i32>,
    pub language: String,
    pub isbn: String,
    pub description: String,
    pub genres: Vec<String>,
    /// Generic metadata submitted under arbitrary names
    pub extra: BTreeMap<String, String>,

    /// Weighted blend of title / author / series / cover confidence
    pub overall_confidence: f64,
    /// Fraction of the fixed 8-field checklist that is present
    pub completeness_score: f64,

    pub last_updated: DateTime<Utc>,
    /// Set only by human action; freezes automatic resolution
    pub is_reviewed: bool,
}

impl FinalMetadata {
    /// Empty record for a freshly created book
    pub fn new(book_id: Uuid) -> Self {
        Self {
            book_id,
            final_title: String::new(),
            final_title_confidence: 0.0,
            final_author: String::new(),
            final_author_confidence: 0.0,
            final_series: String::new(),
            final_series_number: String::new(),
            final_series_confidence: 0.0,
            final_publisher: String::new(),
            final_publisher_confidence: 0.0,
            final_cover_path: String::new(),
            final_cover_confidence: 0.0,
            publication_year: None,
            language: String::new(),
            isbn: String::new(),
            description: String::new(),
            genres: Vec::new(),
            extra: BTreeMap::new(),
            overall_confidence: 0.0,
            completeness_score: 0.0,
            last_updated: Utc::now(),
            is_reviewed: false,
        }
    }

    /// Current value of a field rendered as text (`""` when absent)
    pub fn field_value(&self, field: &MetadataField) -> String {
        match field {
            MetadataField::Title => self.final_title.clone(),
            MetadataField::Author => self.final_author.clone(),
            MetadataField::Series => self.final_series.clone(),
            MetadataField::Publisher => self.final_publisher.clone(),
            MetadataField::Cover => self.final_cover_path.clone(),
            MetadataField::Genre => self.genres.join(", "),
            MetadataField::PublicationYear => self
                .publication_year
                .map(|y| y.to_string())
                .unwrap_or_default(),
            MetadataField::Language => self.language.clone(),
            MetadataField::Isbn => self.isbn.clone(),
            MetadataField::Description => self.description.clone(),
            MetadataField::Other(name) => self.extra.get(name).cloned().unwrap_or_default(),
        }
    }

    /// Per-field confidence slot, for the fields that have one
    pub fn field_confidence(&self, field: &MetadataField) -> Option<Confidence> {
        match field {
            MetadataField::Title => Some(self.final_title_confidence),
            MetadataField::Author => Some(self.final_author_confidence),
            MetadataField::Series => Some(self.final_series_confidence),
            MetadataField::Publisher => Some(self.final_publisher_confidence),
            MetadataField::Cover => Some(self.final_cover_confidence),
            _ => None,
        }
    }
}
