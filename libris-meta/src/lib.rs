//! libris-meta library interface
//!
//! Metadata resolution core for an ebook / comic / audiobook library:
//! - `parser`: filename and folder heuristics producing candidate values
//! - `predictor`: injectable filename predictor (token classifier)
//! - `fusion`: per-field winner selection and aggregate scores
//! - `store`: candidate / final-record persistence (memory, SQLite)
//! - `services`: explicit ingest → resolve → commit orchestration

pub mod fusion;
pub mod parser;
pub mod predictor;
pub mod services;
pub mod store;
pub mod types;

pub use crate::fusion::aggregate::ConfidenceAggregator;
pub use crate::fusion::resolver::MetadataResolver;
pub use crate::parser::{FilenameParser, ParsedFilename};
pub use crate::services::metadata_service::MetadataService;
pub use crate::types::{
    Book, Candidate, CandidateDetail, FinalMetadata, MetadataField, NewCandidate, SourceKind,
};
