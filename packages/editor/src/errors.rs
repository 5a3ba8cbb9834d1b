//! Error types for the editor

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Mutation error: {0}")]
    Mutation(#[from] crate::mutations::MutationError),

    #[error("Draft error: {0}")]
    Draft(#[from] crate::drafts::DraftError),

    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Import error: {0}")]
    Import(#[from] crate::json_io::ImportError),

    #[error("Export error: {0}")]
    Export(#[from] serde_json::Error),
}
