//! In-memory metadata store
//!
//! Single `RwLock` over all tables, so a final-record replacement is
//! observed either entirely or not at all.

use crate::store::MetadataStore;
use crate::types::{Book, Candidate, FinalMetadata, MetadataField, NewCandidate};
use async_trait::async_trait;
use chrono::Utc;
use libris_common::{Error, Result};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct MemoryState {
    books: HashMap<Uuid, Book>,
    /// Insertion order
    candidates: Vec<Candidate>,
    finals: HashMap<Uuid, FinalMetadata>,
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn insert_book(&self, book: &Book) -> Result<()> {
        let mut state = self.state.write().await;
        if state.books.contains_key(&book.id) {
            return Err(Error::InvalidInput(format!("Book {} already exists", book.id)));
        }
        state.books.insert(book.id, book.clone());
        Ok(())
    }

    async fn book(&self, book_id: Uuid) -> Result<Option<Book>> {
        Ok(self.state.read().await.books.get(&book_id).cloned())
    }

    async fn record_candidate(&self, candidate: NewCandidate) -> Result<Candidate> {
        let mut state = self.state.write().await;
        if !state.books.contains_key(&candidate.book_id) {
            return Err(Error::unknown_book(candidate.book_id));
        }

        if candidate.field.is_relational() {
            let key = crate::types::entity_key(&candidate.value);
            let existing = state.candidates.iter_mut().find(|c| {
                c.book_id == candidate.book_id
                    && c.field == candidate.field
                    && c.source == candidate.source
                    && c.entity_key() == key
            });
            if let Some(existing) = existing {
                existing.value = candidate.value;
                existing.confidence = candidate.confidence;
                existing.detail = candidate.detail;
                existing.is_active = true;
                return Ok(existing.clone());
            }
        }

        let stored = candidate.into_candidate(Utc::now());
        state.candidates.push(stored.clone());
        Ok(stored)
    }

    async fn candidate(&self, candidate_id: Uuid) -> Result<Option<Candidate>> {
        let state = self.state.read().await;
        Ok(state.candidates.iter().find(|c| c.id == candidate_id).cloned())
    }

    async fn set_candidate_active(
        &self,
        candidate_id: Uuid,
        active: bool,
    ) -> Result<Option<Candidate>> {
        let mut state = self.state.write().await;
        Ok(state
            .candidates
            .iter_mut()
            .find(|c| c.id == candidate_id)
            .map(|c| {
                c.is_active = active;
                c.clone()
            }))
    }

    async fn active_candidates(
        &self,
        book_id: Uuid,
        field: &MetadataField,
    ) -> Result<Vec<Candidate>> {
        let state = self.state.read().await;
        Ok(state
            .candidates
            .iter()
            .filter(|c| c.book_id == book_id && c.is_active && &c.field == field)
            .cloned()
            .collect())
    }

    async fn active_candidates_for_book(&self, book_id: Uuid) -> Result<Vec<Candidate>> {
        let state = self.state.read().await;
        Ok(state
            .candidates
            .iter()
            .filter(|c| c.book_id == book_id && c.is_active)
            .cloned()
            .collect())
    }

    async fn all_candidates_for_book(&self, book_id: Uuid) -> Result<Vec<Candidate>> {
        let state = self.state.read().await;
        Ok(state
            .candidates
            .iter()
            .filter(|c| c.book_id == book_id)
            .cloned()
            .collect())
    }

    async fn load_final(&self, book_id: Uuid) -> Result<Option<FinalMetadata>> {
        Ok(self.state.read().await.finals.get(&book_id).cloned())
    }

    async fn save_final(&self, record: &FinalMetadata) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.books.contains_key(&record.book_id) {
            return Err(Error::unknown_book(record.book_id));
        }
        state.finals.insert(record.book_id, record.clone());
        Ok(())
    }
}
