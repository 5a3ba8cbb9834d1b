//! Local draft persistence for crash recovery.
//!
//! Unsaved documents share one fixed key; documents that already have a
//! remote record get a key of their own so one document's draft is never
//! restored into another.

use crate::model::DocumentState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const UNSAVED_DRAFT_KEY: &str = "sop-editor-draft";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DraftKey {
    /// The not-yet-saved document
    Unsaved,
    /// Draft of a remote document
    Document(String),
}

impl DraftKey {
    pub fn for_document(document_id: Option<&str>) -> Self {
        match document_id {
            Some(id) => DraftKey::Document(id.to_string()),
            None => DraftKey::Unsaved,
        }
    }

    pub fn storage_key(&self) -> String {
        match self {
            DraftKey::Unsaved => UNSAVED_DRAFT_KEY.to_string(),
            DraftKey::Document(id) => format!("{}-{}", UNSAVED_DRAFT_KEY, id),
        }
    }
}

impl fmt::Display for DraftKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

/// Persisted draft value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub content: DocumentState,
    /// Epoch milliseconds
    pub saved_at: i64,
}

#[derive(Error, Debug)]
pub enum DraftError {
    #[error("Draft storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Draft could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Draft storage quota exceeded: need {needed} bytes, {available} available")]
    QuotaExceeded { needed: usize, available: usize },
}

/// Key/value storage for drafts
pub trait DraftStore {
    fn read(&self, key: &DraftKey) -> Result<Option<Draft>, DraftError>;
    fn write(&mut self, key: &DraftKey, draft: &Draft) -> Result<(), DraftError>;
    fn remove(&mut self, key: &DraftKey) -> Result<(), DraftError>;
}

/// In-memory store holding serialized drafts, like browser local storage
#[derive(Debug, Clone, Default)]
pub struct MemoryDraftStore {
    entries: HashMap<String, String>,
    quota_bytes: Option<usize>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects writes once the serialized total would pass `quota_bytes`
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: HashMap::new(),
            quota_bytes: Some(quota_bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &DraftKey) -> bool {
        self.entries.contains_key(&key.storage_key())
    }

    fn used_bytes_except(&self, key: &str) -> usize {
        self.entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl DraftStore for MemoryDraftStore {
    fn read(&self, key: &DraftKey) -> Result<Option<Draft>, DraftError> {
        match self.entries.get(&key.storage_key()) {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }

    fn write(&mut self, key: &DraftKey, draft: &Draft) -> Result<(), DraftError> {
        let storage_key = key.storage_key();
        let raw = serde_json::to_string(draft)?;

        if let Some(quota) = self.quota_bytes {
            let used = self.used_bytes_except(&storage_key);
            let needed = storage_key.len() + raw.len();
            let available = quota.saturating_sub(used);
            if needed > available {
                return Err(DraftError::QuotaExceeded { needed, available });
            }
        }

        self.entries.insert(storage_key, raw);
        Ok(())
    }

    fn remove(&mut self, key: &DraftKey) -> Result<(), DraftError> {
        self.entries.remove(&key.storage_key());
        Ok(())
    }
}

/// One JSON file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileDraftStore {
    dir: PathBuf,
}

impl FileDraftStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &DraftKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.storage_key()))
    }
}

impl DraftStore for FileDraftStore {
    fn read(&self, key: &DraftKey) -> Result<Option<Draft>, DraftError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn write(&mut self, key: &DraftKey, draft: &Draft) -> Result<(), DraftError> {
        std::fs::create_dir_all(&self.dir)?;
        let content = serde_json::to_string_pretty(draft)?;
        std::fs::write(self.path_for(key), content)?;
        Ok(())
    }

    fn remove(&mut self, key: &DraftKey) -> Result<(), DraftError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Which copy of a document to open
#[derive(Debug, Clone, PartialEq)]
pub enum DraftResolution {
    /// The draft is newer than the remote record
    UseDraft(Draft),
    /// No draft, or a stale one that should be discarded
    UseRemote { stale_draft: bool },
}

/// Prefer a draft only when it was saved after the remote record was last modified
pub fn resolve_draft(draft: Option<Draft>, remote_updated_at: i64) -> DraftResolution {
    match draft {
        Some(draft) if draft.saved_at > remote_updated_at => DraftResolution::UseDraft(draft),
        Some(_) => DraftResolution::UseRemote { stale_draft: true },
        None => DraftResolution::UseRemote { stale_draft: false },
    }
}
