// Fusion Module - candidate reconciliation
//
// Resolver (per-field winner selection) → Aggregator (overall confidence and
// completeness). Both operate on in-memory data only; persistence is the
// caller's job.

pub mod aggregate;
pub mod resolver;

use crate::types::{MetadataField, SourceKind};
use serde::{Deserialize, Serialize};

/// Disagreement between the winning candidate and another active candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictReport {
    pub field: MetadataField,
    pub winning_value: String,
    pub winning_source: SourceKind,
    pub value: String,
    pub source: SourceKind,
    /// Normalized Levenshtein similarity (1.0 = identical)
    pub similarity: f64,
}

/// Outcome of one resolution pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionReport {
    /// Fields re-resolved during the pass, in resolution order
    pub fields: Vec<MetadataField>,
    pub conflicts: Vec<ConflictReport>,
}
