//! # SOP Editor
//!
//! Core editing engine for paginated Standard Operating Procedure documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ host UI: pointer events, layout measurement │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ session: one open document                  │
//! │  - mutations through the history store      │
//! │  - drag → reflow, column resize/equalize    │
//! │  - debounced drafts and page-break recompute│
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ pagination: row heights → page-break set    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **History is the single writer**: every edit names its [`HistoryMode`]
//! 2. **Structure heals itself**: no empty rows, never an empty document
//! 3. **Measurement is injected**: pagination and equalize run against a
//!    [`MeasurementProvider`], so they work headless
//! 4. **Collaborators fail softly**: storage and network errors never
//!    interrupt editing
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sop_editor::{
//!     BlockType, EditSession, EditorConfig, HeightTable, MemoryDraftStore, SystemClock,
//! };
//!
//! let mut session = EditSession::new(
//!     EditorConfig::default(),
//!     Box::new(SystemClock),
//!     Box::new(MemoryDraftStore::new()),
//! );
//!
//! let id = session.add_block(BlockType::Text, None, None)?;
//! session.measure(&HeightTable::new().with_row("row-title", 120.0));
//!
//! // Host timer loop
//! session.tick();
//!
//! let pages = session.export_pages();
//! ```

mod column_ratio;
mod config;
mod debounce;
mod drafts;
mod drag;
mod errors;
mod id_generator;
mod json_io;
mod model;
mod mutations;
mod pagination;
mod reflow;
mod session;
mod store;
mod undo_stack;

pub use column_ratio::{
    equalize_with, EqualizeReport, EqualizeRun, EqualizeStep, EqualizeStop, ResizeGesture,
};
pub use config::{
    ConfigError, EditorConfig, EqualizeConfig, PageGeometry, A4_HEIGHT_PX, DEFAULT_CONFIG_NAME,
};
pub use debounce::{Clock, Debouncer, ManualClock, SystemClock};
pub use drafts::{
    resolve_draft, Draft, DraftError, DraftKey, DraftResolution, DraftStore, FileDraftStore,
    MemoryDraftStore, UNSAVED_DRAFT_KEY,
};
pub use drag::{
    DragCommit, DragEffect, DragMachine, DragNoopReason, DragState, DEFAULT_DRAG_THRESHOLD,
};
pub use errors::EditorError;
pub use id_generator::{get_document_seed, IdGenerator};
pub use json_io::{
    export_as_json, import_from_json, import_from_value, ImportError, EXPORT_FORMAT_VERSION,
    EXPORT_METADATA_KEY,
};
pub use model::{
    clamp_column_ratio, Block, BlockContent, BlockId, BlockType, DocumentState, NestedContent, Row,
    RowId, DEFAULT_COLUMN_RATIO, MAX_BLOCKS_PER_ROW, MAX_COLUMN_RATIO, MIN_COLUMN_RATIO,
};
pub use mutations::{
    add_block, delete_block, ensure_not_empty, sort_content_boxes_by_category, update_block,
    Mutation, MutationError, MutationResult, CATEGORY_ORDER, DEFAULT_CATEGORY,
};
pub use pagination::{
    compute_pages, decide_break, group_pages, page_budget, BreakDecision, HeightTable,
    MeasurementProvider, Page, PageLayout, Paginator,
};
pub use reflow::{
    apply_drop, resolve_drop_target, DropTarget, Point, ReflowKind, ReflowOutcome, RowRect,
};
pub use session::{ApplyOutcome, EditSession, StatusKind, StatusMessage, TickReport};
pub use store::{DocumentStore, MemoryDocumentStore, RemoteDocument, SaveReceipt, StoreError};
pub use undo_stack::{History, HistoryMode, StateChange, DEFAULT_HISTORY_CAPACITY};
