//! # Edit Session
//!
//! One open document in one editor. Every edit funnels through
//! [`EditSession::apply`] into the history, which makes the history the
//! single writer of document state. Side work (draft saves, page-break
//! recomputes, equalize iterations) is deferred and driven by the host
//! through [`EditSession::tick`] and [`EditSession::on_animation_frame`].
//!
//! Collaborator failures never escape as panics: draft storage errors are
//! logged and dropped, remote failures become a [`StatusMessage`].

use crate::column_ratio::{EqualizeRun, EqualizeStep, EqualizeStop, ResizeGesture};
use crate::config::EditorConfig;
use crate::debounce::{Clock, Debouncer};
use crate::drafts::{resolve_draft, Draft, DraftKey, DraftResolution, DraftStore};
use crate::drag::{DragEffect, DragMachine, DragNoopReason, DragState};
use crate::errors::EditorError;
use crate::id_generator::IdGenerator;
use crate::json_io::{export_as_json, import_from_json};
use crate::model::{BlockContent, BlockId, BlockType, DocumentState, RowId};
use crate::mutations::{Mutation, MutationError};
use crate::pagination::{group_pages, MeasurementProvider, PageLayout, Paginator};
use crate::reflow::{apply_drop, Point, ReflowKind, RowRect};
use crate::store::{DocumentStore, SaveReceipt};
use crate::undo_stack::{History, HistoryMode, StateChange};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

/// Id-generator key for documents without a remote record
const UNSAVED_ID_KEY: &str = "unsaved";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusKind {
    Info,
    Error,
}

/// Transient user-facing notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
    pub at: i64,
}

/// What an edit did
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApplyOutcome {
    pub changed: bool,
    pub created_block: Option<BlockId>,
}

/// Deferred work that ran during a [`EditSession::tick`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub draft_saved: bool,
    pub layout_updated: bool,
}

/// Single-document editing session
pub struct EditSession {
    config: EditorConfig,
    clock: Box<dyn Clock>,
    ids: IdGenerator,
    history: History<DocumentState>,
    paginator: Paginator,
    drafts: Box<dyn DraftStore>,
    draft_save: Debouncer,
    document_id: Option<String>,
    drag: DragMachine,
    resize: Option<ResizeGesture>,
    equalizers: BTreeMap<RowId, EqualizeRun>,
    status: Option<StatusMessage>,
}

impl EditSession {
    /// Start a session on the unsaved document, recovering its draft if one exists
    pub fn new(config: EditorConfig, clock: Box<dyn Clock>, drafts: Box<dyn DraftStore>) -> Self {
        let mut session = Self {
            ids: IdGenerator::new(UNSAVED_ID_KEY),
            history: History::with_capacity(DocumentState::initial(), config.history_capacity),
            paginator: Paginator::new(config.page.clone(), config.pagination_debounce_ms),
            draft_save: Debouncer::new(config.draft_debounce_ms),
            drag: DragMachine::new(config.drag_threshold_px, config.drop_zone_edge_px),
            config,
            clock,
            drafts,
            document_id: None,
            resize: None,
            equalizers: BTreeMap::new(),
            status: None,
        };

        match session.drafts.read(&DraftKey::Unsaved) {
            Ok(Some(draft)) => {
                info!(saved_at = draft.saved_at, "Recovered unsaved draft");
                session.replace_document(draft.content);
            }
            Ok(None) => session.replace_document(DocumentState::initial()),
            Err(e) => {
                warn!(error = %e, "Could not read unsaved draft");
                session.replace_document(DocumentState::initial());
            }
        }
        session
    }

    pub fn state(&self) -> &DocumentState {
        self.history.present()
    }

    pub fn history(&self) -> &History<DocumentState> {
        &self.history
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn document_id(&self) -> Option<&str> {
        self.document_id.as_deref()
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    pub fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    fn draft_key(&self) -> DraftKey {
        DraftKey::for_document(self.document_id.as_deref())
    }

    fn set_status(&mut self, kind: StatusKind, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            kind,
            text: text.into(),
            at: self.clock.now_millis(),
        });
    }

    /// Wholesale replacement on load/reset: history and transient state start over
    fn replace_document(&mut self, content: DocumentState) {
        self.ids.observe(content.all_ids());
        self.history.reset(content);
        self.draft_save.cancel();
        self.drag.cancel();
        self.resize = None;
        self.equalizers.clear();
        let now = self.clock.now_millis();
        self.paginator.invalidate(self.history.present(), now);
    }

    // ---------------------------------------------------------------
    // Remote documents
    // ---------------------------------------------------------------

    /// Load a remote document, preferring a local draft saved after the
    /// remote record's last modification. On failure the session is unchanged.
    #[instrument(skip(self, store))]
    pub fn open(
        &mut self,
        store: &mut dyn DocumentStore,
        document_id: &str,
    ) -> Result<(), EditorError> {
        let remote = match store.load(document_id) {
            Ok(remote) => remote,
            Err(e) => {
                warn!(error = %e, "Failed to load document");
                self.set_status(StatusKind::Error, format!("Could not load document: {}", e));
                return Err(e.into());
            }
        };

        let key = DraftKey::Document(document_id.to_string());
        let draft = self.drafts.read(&key).unwrap_or_else(|e| {
            warn!(error = %e, key = %key, "Ignoring unreadable draft");
            None
        });

        let content = match resolve_draft(draft, remote.updated_at) {
            DraftResolution::UseDraft(draft) => {
                info!(
                    saved_at = draft.saved_at,
                    remote_updated_at = remote.updated_at,
                    "Restoring newer local draft"
                );
                draft.content
            }
            DraftResolution::UseRemote { stale_draft } => {
                if stale_draft {
                    debug!(key = %key, "Discarding stale draft");
                    if let Err(e) = self.drafts.remove(&key) {
                        warn!(error = %e, key = %key, "Could not remove stale draft");
                    }
                }
                let mut content = remote.content;
                content.header_title = remote.title;
                content.header_stand = remote.version;
                content
            }
        };

        self.document_id = Some(document_id.to_string());
        self.ids = IdGenerator::new(document_id);
        self.replace_document(content);
        self.set_status(StatusKind::Info, "Document loaded");
        info!(rows = self.state().rows.len(), "Opened document");
        Ok(())
    }

    /// Save to the remote store under the header title and version label.
    /// A failed save leaves the session as it was, ready to retry.
    #[instrument(skip(self, store))]
    pub fn save(&mut self, store: &mut dyn DocumentStore) -> Result<SaveReceipt, EditorError> {
        let now = self.clock.now_millis();
        let state = self.history.present();
        let receipt = match store.save(&state.header_title, &state.header_stand, state, now) {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(error = %e, "Failed to save document");
                self.set_status(StatusKind::Error, format!("Could not save document: {}", e));
                return Err(e.into());
            }
        };

        // The remote copy is now authoritative for both keys.
        let stale_keys = [self.draft_key(), DraftKey::Document(receipt.id.clone())];
        for key in &stale_keys {
            if let Err(e) = self.drafts.remove(key) {
                warn!(error = %e, key = %key, "Could not remove draft after save");
            }
        }
        self.draft_save.cancel();
        self.document_id = Some(receipt.id.clone());

        self.set_status(StatusKind::Info, "Document saved");
        info!(document_id = %receipt.id, "Saved document");
        Ok(receipt)
    }

    /// Start over from the initial template and forget the local draft.
    /// The session detaches from any remote document.
    pub fn reset(&mut self) {
        let key = self.draft_key();
        if let Err(e) = self.drafts.remove(&key) {
            warn!(error = %e, key = %key, "Could not remove draft on reset");
        }
        self.document_id = None;
        self.ids = IdGenerator::new(UNSAVED_ID_KEY);
        self.replace_document(DocumentState::initial());
        self.status = None;
        info!("Document reset");
    }

    // ---------------------------------------------------------------
    // Edits
    // ---------------------------------------------------------------

    /// Apply a mutation with an explicit history mode
    pub fn apply(
        &mut self,
        mutation: Mutation,
        mode: HistoryMode,
    ) -> Result<ApplyOutcome, EditorError> {
        let result = mutation.apply(self.history.present(), &mut self.ids)?;
        debug!(
            mutation = mutation.name(),
            mode = ?mode,
            changed = result.changed,
            "Applied mutation"
        );

        if !result.changed {
            return Ok(ApplyOutcome::default());
        }
        let change = self.history.set_value(mode, result.state);
        self.after_change(change);

        Ok(ApplyOutcome {
            changed: true,
            created_block: result.created_block,
        })
    }

    fn after_change(&mut self, change: StateChange) {
        let now = self.clock.now_millis();
        let state = self.history.present();
        self.paginator.invalidate(state, now);

        if let Some(gesture) = &self.resize {
            if state.row(&gesture.row_id).is_none() {
                self.resize = None;
            }
        }
        self.equalizers
            .retain(|row_id, _| state.row(row_id).map(|r| r.is_two_column()).unwrap_or(false));

        if change.persist {
            self.draft_save.trigger(now, ());
        }
    }

    pub fn add_block(
        &mut self,
        block_type: BlockType,
        after_block_id: Option<&str>,
        category: Option<&str>,
    ) -> Result<BlockId, EditorError> {
        let outcome = self.apply(
            Mutation::AddBlock {
                block_type,
                after_block_id: after_block_id.map(str::to_string),
                category: category.map(str::to_string),
            },
            HistoryMode::Push,
        )?;
        outcome.created_block.ok_or_else(|| {
            MutationError::InvalidStructure("no block was created".to_string()).into()
        })
    }

    pub fn update_block(
        &mut self,
        block_id: &str,
        content: BlockContent,
    ) -> Result<(), EditorError> {
        self.apply(
            Mutation::UpdateBlock {
                block_id: block_id.to_string(),
                content,
            },
            HistoryMode::Push,
        )?;
        Ok(())
    }

    /// Returns false when the delete was refused (last title block)
    pub fn delete_block(&mut self, block_id: &str) -> Result<bool, EditorError> {
        let outcome = self.apply(
            Mutation::DeleteBlock {
                block_id: block_id.to_string(),
            },
            HistoryMode::Push,
        )?;
        Ok(outcome.changed)
    }

    pub fn sort_content_boxes(&mut self) -> Result<(), EditorError> {
        self.apply(Mutation::SortContentBoxes, HistoryMode::Push)?;
        Ok(())
    }

    pub fn undo(&mut self) -> bool {
        let moved = self.history.undo();
        if moved {
            self.after_history_step();
        }
        moved
    }

    pub fn redo(&mut self) -> bool {
        let moved = self.history.redo();
        if moved {
            self.after_history_step();
        }
        moved
    }

    fn after_history_step(&mut self) {
        self.drag.cancel();
        self.resize = None;
        self.equalizers.clear();
        self.after_change(StateChange {
            mode: HistoryMode::Replace,
            persist: true,
        });
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // ---------------------------------------------------------------
    // Drag and drop
    // ---------------------------------------------------------------

    pub fn drag_state(&self) -> &DragState {
        self.drag.state()
    }

    pub fn pointer_down(&mut self, block_id: &str, position: Point) -> DragEffect {
        let state = self.history.present();
        let Some((row_idx, _)) = state.find_block(block_id) else {
            return DragEffect::Noop {
                reason: DragNoopReason::UnknownBlock,
            };
        };
        let row_id = state.rows[row_idx].id.clone();
        self.drag.pointer_down(block_id, &row_id, position)
    }

    pub fn pointer_move(&mut self, position: Point, rects: &[RowRect]) -> DragEffect {
        self.drag.pointer_move(position, rects)
    }

    /// Release the pointer; a completed drag is reflowed and pushed to history
    pub fn pointer_up(&mut self) -> Result<Option<ReflowKind>, EditorError> {
        let commit = match self.drag.pointer_up() {
            DragEffect::Committed(commit) => commit,
            _ => return Ok(None),
        };

        let outcome = apply_drop(
            &self.history.present().rows,
            &commit.block_id,
            &commit.target,
            &mut self.ids,
        )?;
        let Some(outcome) = outcome else {
            debug!(block_id = %commit.block_id, "Drop left layout unchanged");
            return Ok(None);
        };

        self.apply(Mutation::ReplaceRows { rows: outcome.rows }, HistoryMode::Push)?;
        info!(
            block_id = %commit.block_id,
            source_row_id = %commit.source_row_id,
            kind = ?outcome.kind,
            "Reflowed rows after drop"
        );
        Ok(Some(outcome.kind))
    }

    /// Abort the drag; document and history stay untouched
    pub fn cancel_drag(&mut self) -> DragEffect {
        self.drag.cancel()
    }

    // ---------------------------------------------------------------
    // Column ratio
    // ---------------------------------------------------------------

    fn two_column_row_ratio(&self, row_id: &str) -> Result<f64, EditorError> {
        let row = self
            .history
            .present()
            .row(row_id)
            .ok_or_else(|| MutationError::RowNotFound(row_id.to_string()))?;
        if !row.is_two_column() {
            return Err(MutationError::InvalidStructure(format!(
                "row {} has a single column",
                row_id
            ))
            .into());
        }
        Ok(row.column_ratio)
    }

    /// Pointer-down on a row's resize handle
    pub fn begin_column_resize(
        &mut self,
        row_id: &str,
        pointer_x: f64,
        row_width: f64,
    ) -> Result<(), EditorError> {
        let start_ratio = self.two_column_row_ratio(row_id)?;
        self.equalizers.remove(row_id);
        self.resize = Some(ResizeGesture::new(row_id, pointer_x, start_ratio, row_width));
        Ok(())
    }

    pub fn is_resizing(&self) -> bool {
        self.resize.is_some()
    }

    /// Pointer-move during a resize. The first write of a gesture records the
    /// pre-drag state as one undo step; later writes replace in place.
    pub fn update_column_resize(&mut self, pointer_x: f64) -> Result<Option<f64>, EditorError> {
        let Some(gesture) = &self.resize else {
            return Ok(None);
        };
        let ratio = gesture.ratio_at(pointer_x);
        let row_id = gesture.row_id.clone();
        let recorded = gesture.recorded;

        let current = self.two_column_row_ratio(&row_id)?;
        if !recorded && ratio == current {
            return Ok(Some(ratio));
        }

        let mode = if recorded {
            HistoryMode::Replace
        } else {
            HistoryMode::Push
        };
        self.apply(Mutation::SetColumnRatio { row_id, ratio }, mode)?;
        if let Some(gesture) = &mut self.resize {
            gesture.recorded = true;
        }
        Ok(Some(ratio))
    }

    /// Pointer-up: commit the final position (if given) and end the gesture
    pub fn end_column_resize(
        &mut self,
        pointer_x: Option<f64>,
    ) -> Result<Option<f64>, EditorError> {
        if let Some(x) = pointer_x {
            self.update_column_resize(x)?;
        }
        let Some(gesture) = self.resize.take() else {
            return Ok(None);
        };
        Ok(self.history.present().row(&gesture.row_id).map(|r| r.column_ratio))
    }

    /// Begin auto-equalizing a row. Returns false if a run for that row is already active.
    pub fn start_equalize(&mut self, row_id: &str) -> Result<bool, EditorError> {
        let ratio = self.two_column_row_ratio(row_id)?;
        if self.equalizers.contains_key(row_id) {
            return Ok(false);
        }
        self.equalizers.insert(
            row_id.to_string(),
            EqualizeRun::new(row_id, ratio, self.config.equalize.clone()),
        );
        debug!(row_id, ratio, "Auto-equalize started");
        Ok(true)
    }

    pub fn is_equalizing(&self, row_id: &str) -> bool {
        self.equalizers.contains_key(row_id)
    }

    /// Advance equalize runs by one animation frame, measuring rows that are due.
    /// Each run lands in history as one undo step.
    pub fn on_animation_frame(
        &mut self,
        provider: &dyn MeasurementProvider,
    ) -> Result<Vec<(RowId, EqualizeStep)>, EditorError> {
        let mut steps = Vec::new();
        let row_ids: Vec<RowId> = self.equalizers.keys().cloned().collect();

        for row_id in row_ids {
            let Some(run) = self.equalizers.get_mut(&row_id) else {
                continue;
            };
            if !run.on_frame() {
                continue;
            }
            let step = match provider.column_heights(&row_id) {
                Some((left, right)) => run.step(left, right),
                None => EqualizeStep::Done {
                    reason: EqualizeStop::Unmeasurable,
                },
            };

            match step {
                EqualizeStep::Apply { ratio } => {
                    let mode = if run.recorded() {
                        HistoryMode::Replace
                    } else {
                        HistoryMode::Push
                    };
                    let outcome = self.apply(
                        Mutation::SetColumnRatio {
                            row_id: row_id.clone(),
                            ratio,
                        },
                        mode,
                    )?;
                    let stored = self.history.present().row(&row_id).map(|r| r.column_ratio);
                    if let Some(run) = self.equalizers.get_mut(&row_id) {
                        if outcome.changed {
                            run.mark_recorded();
                        }
                        if let Some(stored) = stored {
                            run.sync_ratio(stored);
                        }
                    }
                }
                EqualizeStep::Done { reason } => {
                    debug!(row_id = %row_id, reason = ?reason, "Auto-equalize finished");
                    self.equalizers.remove(&row_id);
                }
            }
            steps.push((row_id, step));
        }

        Ok(steps)
    }

    // ---------------------------------------------------------------
    // Layout and deferred work
    // ---------------------------------------------------------------

    /// Layout observer callback for one row
    pub fn observe_row_height(&mut self, row_id: &str, height: f64) -> bool {
        let now = self.clock.now_millis();
        self.paginator.observe_row_height(row_id, height, now)
    }

    pub fn observe_footer_height(&mut self, variant: &str, height: f64) -> bool {
        let now = self.clock.now_millis();
        self.paginator.observe_footer_height(variant, height, now)
    }

    /// Refresh every cached height from a measurement provider
    pub fn measure(&mut self, provider: &dyn MeasurementProvider) {
        let now = self.clock.now_millis();
        self.paginator.measure(provider, self.history.present(), now);
    }

    /// Run debounced work whose quiet period has elapsed
    pub fn tick(&mut self) -> TickReport {
        let now = self.clock.now_millis();
        let mut report = TickReport::default();

        if self.draft_save.poll(now).is_some() {
            report.draft_saved = self.persist_draft(now);
        }
        if self.paginator.poll(self.history.present(), now).is_some() {
            report.layout_updated = true;
        }
        report
    }

    /// Write any pending draft immediately (e.g. before unload)
    pub fn flush_draft(&mut self) -> bool {
        if self.draft_save.flush().is_none() {
            return false;
        }
        let now = self.clock.now_millis();
        self.persist_draft(now)
    }

    pub fn draft_pending(&self) -> bool {
        self.draft_save.is_pending()
    }

    fn persist_draft(&mut self, now: i64) -> bool {
        let key = self.draft_key();
        let draft = Draft {
            content: self.history.present().clone(),
            saved_at: now,
        };
        match self.drafts.write(&key, &draft) {
            Ok(()) => {
                debug!(key = %key, saved_at = now, "Draft saved");
                true
            }
            Err(e) => {
                warn!(error = %e, key = %key, "Draft save failed; editing continues");
                false
            }
        }
    }

    /// Last computed page-break set, in document order
    pub fn page_breaks(&self) -> &[RowId] {
        &self.paginator.layout().breaks
    }

    /// Rows grouped into pages according to the last computed layout
    pub fn pages(&self) -> Vec<Vec<RowId>> {
        let layout = self.paginator.layout();
        group_pages(&self.history.present().row_ids(), &layout.break_set())
    }

    pub fn layout_settled(&self) -> bool {
        self.paginator.is_settled()
    }

    /// Settle pagination synchronously; the layout handed to the export
    /// collaborator must never be a stale one.
    pub fn export_pages(&mut self) -> &PageLayout {
        self.paginator.settle(self.history.present())
    }

    pub fn export_json(&self) -> Result<String, EditorError> {
        Ok(export_as_json(self.history.present(), self.clock.now_millis())?)
    }

    /// Replace the document with an imported file as one undoable step.
    /// Rejected files leave the document untouched.
    pub fn import_json(&mut self, input: &str) -> Result<(), EditorError> {
        let imported = match import_from_json(input, &mut self.ids) {
            Ok(state) => state,
            Err(e) => {
                self.set_status(StatusKind::Error, format!("Import failed: {}", e));
                return Err(e.into());
            }
        };
        let change = self.history.set_value(HistoryMode::Push, imported);
        self.after_change(change);
        self.set_status(StatusKind::Info, "Document imported");
        Ok(())
    }
}
