//! Candidate and final-record persistence
//!
//! `MetadataStore` is the seam between the service and storage. Two
//! implementations: [`MemoryStore`] (tests, dry runs) and [`SqliteStore`]
//! (library database).
//!
//! Contract shared by both:
//! - relational candidates (author / series / publisher) are unique per
//!   `(book, entity_key, source)`; re-submission updates in place
//! - `save_final` replaces the whole record in one atomic step
//! - lookups of missing rows return `Ok(None)`

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::types::{Book, Candidate, FinalMetadata, MetadataField, NewCandidate};
use async_trait::async_trait;
use libris_common::Result;
use uuid::Uuid;

#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn insert_book(&self, book: &Book) -> Result<()>;

    async fn book(&self, book_id: Uuid) -> Result<Option<Book>>;

    /// Insert a candidate, or update the existing relational candidate with
    /// the same entity and source. Fails with `NotFound` for unknown books.
    async fn record_candidate(&self, candidate: NewCandidate) -> Result<Candidate>;

    async fn candidate(&self, candidate_id: Uuid) -> Result<Option<Candidate>>;

    /// Flip the active flag; returns the updated candidate
    async fn set_candidate_active(&self, candidate_id: Uuid, active: bool)
        -> Result<Option<Candidate>>;

    /// Active candidates for one field of one book
    async fn active_candidates(&self, book_id: Uuid, field: &MetadataField)
        -> Result<Vec<Candidate>>;

    /// All active candidates of one book
    async fn active_candidates_for_book(&self, book_id: Uuid) -> Result<Vec<Candidate>>;

    /// Every candidate of one book, active or not (audit view)
    async fn all_candidates_for_book(&self, book_id: Uuid) -> Result<Vec<Candidate>>;

    async fn load_final(&self, book_id: Uuid) -> Result<Option<FinalMetadata>>;

    async fn save_final(&self, record: &FinalMetadata) -> Result<()>;
}
