//! Boundary to the remote document-persistence collaborator.
//!
//! Authentication, organization scoping and retries are the
//! collaborator's business. The editor needs `load` and `save`.

use crate::model::DocumentState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// A stored document as returned by `load`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDocument {
    pub content: DocumentState,
    pub title: String,
    pub version: String,
    /// Last modification, epoch milliseconds
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReceipt {
    pub id: String,
    pub updated_at: i64,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Document store unavailable: {0}")]
    Unavailable(String),

    #[error("Stored document is malformed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub trait DocumentStore {
    fn load(&mut self, document_id: &str) -> Result<RemoteDocument, StoreError>;

    /// Create or update the document matching `(title, version)`
    fn save(
        &mut self,
        title: &str,
        version: &str,
        content: &DocumentState,
        now: i64,
    ) -> Result<SaveReceipt, StoreError>;
}

/// In-process store for tests and headless tools
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    documents: HashMap<String, RemoteDocument>,
    next_id: u64,
    failure: Option<String>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following call fail with `Unavailable(reason)`
    pub fn fail_with(&mut self, reason: impl Into<String>) {
        self.failure = Some(reason.into());
    }

    pub fn recover(&mut self) {
        self.failure = None;
    }

    pub fn insert(&mut self, id: impl Into<String>, document: RemoteDocument) {
        self.documents.insert(id.into(), document);
    }

    pub fn get(&self, id: &str) -> Option<&RemoteDocument> {
        self.documents.get(id)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        match &self.failure {
            Some(reason) => Err(StoreError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn load(&mut self, document_id: &str) -> Result<RemoteDocument, StoreError> {
        self.check_available()?;
        self.documents
            .get(document_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(document_id.to_string()))
    }

    fn save(
        &mut self,
        title: &str,
        version: &str,
        content: &DocumentState,
        now: i64,
    ) -> Result<SaveReceipt, StoreError> {
        self.check_available()?;

        let existing = self
            .documents
            .iter()
            .find(|(_, doc)| doc.title == title && doc.version == version)
            .map(|(id, _)| id.clone());

        let id = match existing {
            Some(id) => id,
            None => {
                self.next_id += 1;
                format!("doc-{}", self.next_id)
            }
        };

        self.documents.insert(
            id.clone(),
            RemoteDocument {
                content: content.clone(),
                title: title.to_string(),
                version: version.to_string(),
                updated_at: now,
            },
        );

        Ok(SaveReceipt { id, updated_at: now })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_creates_then_updates() {
        let mut store = MemoryDocumentStore::new();
        let state = DocumentState::initial();

        let first = store.save("Sepsis", "1.0", &state, 10).unwrap();
        let second = store.save("Sepsis", "1.0", &state, 20).unwrap();
        let other = store.save("Sepsis", "2.0", &state, 30).unwrap();

        assert_eq!(first.id, second.id);
        assert_ne!(first.id, other.id);
        assert_eq!(store.len(), 2);
        assert_eq!(store.load(&first.id).unwrap().updated_at, 20);
    }

    #[test]
    fn test_missing_document() {
        let mut store = MemoryDocumentStore::new();
        assert!(matches!(store.load("nope"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_failure_toggle() {
        let mut store = MemoryDocumentStore::new();
        store.fail_with("offline");
        let err = store
            .save("A", "1", &DocumentState::initial(), 1)
            .unwrap_err();
        assert_eq!(err.to_string(), "Document store unavailable: offline");
        assert!(store.is_empty());

        store.recover();
        assert!(store.save("A", "1", &DocumentState::initial(), 1).is_ok());
    }
}
