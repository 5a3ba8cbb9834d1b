//! # Document Mutations
//!
//! Structural edits on [`DocumentState`], expressed as whole-state
//! transformations: every mutation takes the previous state and produces a
//! new one. Consumers never observe an in-place edit.
//!
//! ## Self-healing
//!
//! - A row that loses its last block is removed.
//! - A document that loses its last row gets a default content box row.
//! - The last remaining `title` block cannot be deleted.
//!
//! None of these are errors. Errors are reserved for edits that address a
//! block or row that does not exist.

use crate::id_generator::IdGenerator;
use crate::model::{
    clamp_column_ratio, Block, BlockContent, BlockId, BlockType, DocumentState, Row, RowId,
    MAX_BLOCKS_PER_ROW,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Canonical content box order; unknown categories sort after these.
pub const CATEGORY_ORDER: [&str; 9] = [
    "definition",
    "indication",
    "contraindication",
    "diagnostics",
    "therapy",
    "procedure",
    "monitoring",
    "complications",
    "notes",
];

/// Category used when a content box is created without a hint
pub const DEFAULT_CATEGORY: &str = "definition";

/// Semantic edits on the document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Mutation {
    /// Insert a new single-block row after the row holding `after_block_id`
    #[serde(rename_all = "camelCase")]
    AddBlock {
        block_type: BlockType,
        after_block_id: Option<BlockId>,
        category: Option<String>,
    },

    /// Replace a block's content (atomic replacement, last write wins)
    #[serde(rename_all = "camelCase")]
    UpdateBlock {
        block_id: BlockId,
        content: BlockContent,
    },

    /// Remove a block, healing empty rows and empty documents
    #[serde(rename_all = "camelCase")]
    DeleteBlock { block_id: BlockId },

    /// Rebuild the row list with content boxes in canonical category order
    SortContentBoxes,

    #[serde(rename_all = "camelCase")]
    SetColumnRatio { row_id: RowId, ratio: f64 },

    #[serde(rename_all = "camelCase")]
    SetHeader {
        title: Option<String>,
        stand: Option<String>,
        logo: Option<Option<String>>,
    },

    /// Set (or clear, with `None`) the footer variant of a 1-based page
    SetFooterVariant { page: u32, variant: Option<String> },

    SetSignature { page: u32, data: Option<Value> },

    /// Swap in a row list computed elsewhere (drag-and-drop reflow)
    ReplaceRows { rows: Vec<Row> },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MutationError {
    #[error("Block not found: {0}")]
    BlockNotFound(String),

    #[error("Row not found: {0}")]
    RowNotFound(String),

    #[error("Invalid structure: {0}")]
    InvalidStructure(String),
}

/// Result of applying a mutation
#[derive(Debug, Clone, PartialEq)]
pub struct MutationResult {
    pub state: DocumentState,

    /// Id of the block created by `AddBlock`
    pub created_block: Option<BlockId>,

    /// False when the mutation left the document untouched (guarded delete)
    pub changed: bool,
}

impl MutationResult {
    /// `changed` reflects whether `next` differs from `state`
    fn compared(state: &DocumentState, next: DocumentState) -> Self {
        let changed = next != *state;
        Self {
            state: next,
            created_block: None,
            changed,
        }
    }

    fn unchanged(state: &DocumentState) -> Self {
        Self {
            state: state.clone(),
            created_block: None,
            changed: false,
        }
    }
}

impl Mutation {
    /// Apply the mutation to `state`, producing the next state
    pub fn apply(
        &self,
        state: &DocumentState,
        ids: &mut IdGenerator,
    ) -> Result<MutationResult, MutationError> {
        match self {
            Mutation::AddBlock {
                block_type,
                after_block_id,
                category,
            } => {
                let (next, block_id) = add_block(
                    state,
                    ids,
                    *block_type,
                    after_block_id.as_deref(),
                    category.as_deref(),
                );
                Ok(MutationResult {
                    state: next,
                    created_block: Some(block_id),
                    changed: true,
                })
            }

            Mutation::UpdateBlock { block_id, content } => {
                update_block(state, block_id, content.clone())
                    .map(|next| MutationResult::compared(state, next))
            }

            Mutation::DeleteBlock { block_id } => match delete_block(state, ids, block_id)? {
                Some(next) => Ok(MutationResult::compared(state, next)),
                None => Ok(MutationResult::unchanged(state)),
            },

            Mutation::SortContentBoxes => {
                let next = sort_content_boxes_by_category(state, ids);
                Ok(MutationResult::compared(state, next))
            }

            Mutation::SetColumnRatio { row_id, ratio } => {
                let mut next = state.clone();
                let row = next
                    .rows
                    .iter_mut()
                    .find(|r| &r.id == row_id)
                    .ok_or_else(|| MutationError::RowNotFound(row_id.clone()))?;
                row.column_ratio = clamp_column_ratio(*ratio);
                Ok(MutationResult::compared(state, next))
            }

            Mutation::SetHeader { title, stand, logo } => {
                let mut next = state.clone();
                if let Some(title) = title {
                    next.header_title = title.clone();
                }
                if let Some(stand) = stand {
                    next.header_stand = stand.clone();
                }
                if let Some(logo) = logo {
                    next.header_logo = logo.clone();
                }
                Ok(MutationResult::compared(state, next))
            }

            Mutation::SetFooterVariant { page, variant } => {
                let mut next = state.clone();
                match variant {
                    Some(variant) => {
                        next.footer_variants.insert(*page, variant.clone());
                    }
                    None => {
                        next.footer_variants.remove(page);
                    }
                }
                Ok(MutationResult::compared(state, next))
            }

            Mutation::SetSignature { page, data } => {
                let mut next = state.clone();
                match data {
                    Some(data) => {
                        next.signature_data.insert(*page, data.clone());
                    }
                    None => {
                        next.signature_data.remove(page);
                    }
                }
                Ok(MutationResult::compared(state, next))
            }

            Mutation::ReplaceRows { rows } => {
                if let Some(row) = rows.iter().find(|r| r.blocks.len() > MAX_BLOCKS_PER_ROW) {
                    return Err(MutationError::InvalidStructure(format!(
                        "row {} holds {} blocks",
                        row.id,
                        row.blocks.len()
                    )));
                }
                let mut next = state.clone();
                next.rows = rows.iter().filter(|r| !r.blocks.is_empty()).cloned().collect();
                ensure_not_empty(&mut next, ids);
                Ok(MutationResult::compared(state, next))
            }
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::AddBlock { .. } => "add_block",
            Mutation::UpdateBlock { .. } => "update_block",
            Mutation::DeleteBlock { .. } => "delete_block",
            Mutation::SortContentBoxes => "sort_content_boxes",
            Mutation::SetColumnRatio { .. } => "set_column_ratio",
            Mutation::SetHeader { .. } => "set_header",
            Mutation::SetFooterVariant { .. } => "set_footer_variant",
            Mutation::SetSignature { .. } => "set_signature",
            Mutation::ReplaceRows { .. } => "replace_rows",
        }
    }
}

/// Build a fresh block of `block_type` with its default payload
pub fn new_block(ids: &mut IdGenerator, block_type: BlockType, category: Option<&str>) -> Block {
    let id = ids.new_id();
    match block_type {
        BlockType::ContentBox => {
            let text_id = ids.new_id();
            Block::content_box(id, category.unwrap_or(DEFAULT_CATEGORY), text_id)
        }
        other => Block::empty(id, other),
    }
}

/// Insert a new single-block row after the row containing `after_block_id`,
/// or at the end when it is omitted or unknown.
pub fn add_block(
    state: &DocumentState,
    ids: &mut IdGenerator,
    block_type: BlockType,
    after_block_id: Option<&str>,
    category: Option<&str>,
) -> (DocumentState, BlockId) {
    // Only one title per document; extra titles become headings.
    let block_type = if block_type == BlockType::Title && state.title_count() > 0 {
        BlockType::Heading
    } else {
        block_type
    };

    let block = new_block(ids, block_type, category);
    let block_id = block.id.clone();
    let row = Row::single(ids.new_id(), block);

    let mut next = state.clone();
    let insert_at = after_block_id
        .and_then(|id| state.find_block(id))
        .map(|(row_idx, _)| row_idx + 1)
        .unwrap_or(next.rows.len());
    next.rows.insert(insert_at, row);

    debug!(
        block_id = %block_id,
        block_type = block_type.as_str(),
        index = insert_at,
        "Added block"
    );
    (next, block_id)
}

/// Replace a block's content wherever it lives, nested blocks included
pub fn update_block(
    state: &DocumentState,
    block_id: &str,
    content: BlockContent,
) -> Result<DocumentState, MutationError> {
    fn replace_in(blocks: &mut [Block], block_id: &str, content: &BlockContent) -> bool {
        for block in blocks {
            if block.id == block_id {
                block.content = content.clone();
                return true;
            }
            if let BlockContent::Nested(nested) = &mut block.content {
                if replace_in(&mut nested.blocks, block_id, content) {
                    return true;
                }
            }
        }
        false
    }

    let mut next = state.clone();
    let found = next
        .rows
        .iter_mut()
        .any(|row| replace_in(&mut row.blocks, block_id, &content));

    if found {
        Ok(next)
    } else {
        Err(MutationError::BlockNotFound(block_id.to_string()))
    }
}

/// Remove a top-level block.
///
/// Returns `Ok(None)` when the deletion guard refuses to remove the last title.
pub fn delete_block(
    state: &DocumentState,
    ids: &mut IdGenerator,
    block_id: &str,
) -> Result<Option<DocumentState>, MutationError> {
    let (row_idx, block_idx) = state
        .find_block(block_id)
        .ok_or_else(|| MutationError::BlockNotFound(block_id.to_string()))?;

    let block = &state.rows[row_idx].blocks[block_idx];
    if block.block_type == BlockType::Title && state.title_count() <= 1 {
        debug!(block_id, "Refusing to delete the last title block");
        return Ok(None);
    }

    let mut next = state.clone();
    next.rows[row_idx].blocks.remove(block_idx);
    if next.rows[row_idx].blocks.is_empty() {
        next.rows.remove(row_idx);
    }
    ensure_not_empty(&mut next, ids);

    Ok(Some(next))
}

/// Synthesize a default content box row if the document has no rows left
pub fn ensure_not_empty(state: &mut DocumentState, ids: &mut IdGenerator) {
    if state.rows.is_empty() {
        let block = new_block(ids, BlockType::ContentBox, None);
        debug!(block_id = %block.id, "Document emptied; inserting default content box");
        state.rows.push(Row::single(ids.new_id(), block));
    }
}

fn category_rank(category: Option<&str>) -> usize {
    category
        .and_then(|c| CATEGORY_ORDER.iter().position(|known| *known == c))
        .unwrap_or(CATEGORY_ORDER.len())
}

/// Rebuild the row list: content boxes first in canonical category order,
/// then every other block, each in its own single-column row.
///
/// Rows that keep exactly the same single block keep their id and ratio so
/// measured heights stay valid; split rows get fresh ids.
pub fn sort_content_boxes_by_category(
    state: &DocumentState,
    ids: &mut IdGenerator,
) -> DocumentState {
    let mut boxes: Vec<(&Row, &Block)> = Vec::new();
    let mut others: Vec<(&Row, &Block)> = Vec::new();

    for row in &state.rows {
        for block in &row.blocks {
            if block.block_type == BlockType::ContentBox {
                boxes.push((row, block));
            } else {
                others.push((row, block));
            }
        }
    }

    // Stable: boxes with equal rank keep document order.
    boxes.sort_by_key(|(_, block)| category_rank(block.category()));

    let mut next = state.clone();
    next.rows = boxes
        .into_iter()
        .chain(others)
        .map(|(row, block)| {
            if row.blocks.len() == 1 {
                Row::single(row.id.clone(), block.clone())
            } else {
                Row::single(ids.new_id(), block.clone())
            }
        })
        .collect();

    debug!(rows = next.rows.len(), "Sorted content boxes by category");
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MAX_COLUMN_RATIO;

    fn ids() -> IdGenerator {
        IdGenerator::from_seed("t".to_string())
    }

    fn text_row(row_id: &str, block_id: &str) -> Row {
        Row::single(row_id, Block::empty(block_id, BlockType::Text))
    }

    fn two_column(row_id: &str, left: &str, right: &str) -> Row {
        Row {
            id: row_id.to_string(),
            column_ratio: 0.5,
            blocks: vec![
                Block::empty(left, BlockType::Text),
                Block::empty(right, BlockType::Text),
            ],
        }
    }

    fn boxed(row_id: &str, block_id: &str, category: &str) -> Row {
        Row::single(row_id, Block::content_box(block_id, category, format!("{}-text", block_id)))
    }

    #[test]
    fn test_mutation_serialization() {
        let mutation = Mutation::UpdateBlock {
            block_id: "b-1".to_string(),
            content: BlockContent::Text("Hallo".to_string()),
        };

        let json = serde_json::to_string(&mutation).unwrap();
        assert!(json.contains("\"kind\":\"updateBlock\""));
        let deserialized: Mutation = serde_json::from_str(&json).unwrap();
        assert_eq!(mutation, deserialized);
    }

    #[test]
    fn test_add_block_after_target_row() {
        let mut state = DocumentState::empty();
        state.rows = vec![text_row("r1", "a"), text_row("r2", "b")];
        let mut ids = ids();

        let (next, block_id) = add_block(&state, &mut ids, BlockType::Table, Some("a"), None);

        assert_eq!(next.rows.len(), 3);
        assert_eq!(next.rows[1].blocks[0].id, block_id);
        assert_eq!(next.rows[1].blocks[0].block_type, BlockType::Table);
        assert_eq!(next.rows[1].blocks[0].content, BlockContent::empty());
        // Original untouched
        assert_eq!(state.rows.len(), 2);
    }

    #[test]
    fn test_add_block_unknown_anchor_appends() {
        let mut state = DocumentState::empty();
        state.rows = vec![text_row("r1", "a")];
        let mut ids = ids();

        let (next, block_id) = add_block(&state, &mut ids, BlockType::Text, Some("nope"), None);
        assert_eq!(next.rows.last().unwrap().blocks[0].id, block_id);
    }

    #[test]
    fn test_add_content_box_gets_nested_text_and_category() {
        let state = DocumentState::empty();
        let mut ids = ids();

        let (next, block_id) =
            add_block(&state, &mut ids, BlockType::ContentBox, None, Some("therapy"));
        let block = next.block(&block_id).unwrap();
        let nested = block.content.as_nested().unwrap();

        assert_eq!(nested.category.as_deref(), Some("therapy"));
        assert_eq!(nested.blocks.len(), 1);
        assert_eq!(nested.blocks[0].block_type, BlockType::Text);
    }

    #[test]
    fn test_second_title_becomes_heading() {
        let state = DocumentState::initial();
        let mut ids = ids();

        let (next, block_id) = add_block(&state, &mut ids, BlockType::Title, None, None);
        assert_eq!(next.block(&block_id).unwrap().block_type, BlockType::Heading);
        assert_eq!(next.title_count(), 1);
    }

    #[test]
    fn test_update_nested_block() {
        let state = DocumentState::initial();
        let next = update_block(
            &state,
            "block-definition-text",
            BlockContent::Text("<p>Definition</p>".to_string()),
        )
        .unwrap();

        let nested = next.block("block-definition").unwrap().content.as_nested().unwrap();
        assert_eq!(nested.blocks[0].content.as_text(), Some("<p>Definition</p>"));
    }

    #[test]
    fn test_update_missing_block_fails() {
        let state = DocumentState::initial();
        let result = update_block(&state, "ghost", BlockContent::empty());
        assert_eq!(result, Err(MutationError::BlockNotFound("ghost".to_string())));
    }

    #[test]
    fn test_delete_from_two_column_row_keeps_partner() {
        let mut state = DocumentState::empty();
        state.rows = vec![two_column("r1", "a", "b")];
        let mut ids = ids();

        let next = delete_block(&state, &mut ids, "a").unwrap().unwrap();
        assert_eq!(next.rows.len(), 1);
        assert_eq!(next.rows[0].id, "r1");
        assert_eq!(next.rows[0].blocks.len(), 1);
        assert_eq!(next.rows[0].blocks[0].id, "b");
    }

    #[test]
    fn test_delete_last_block_synthesizes_content_box() {
        let mut state = DocumentState::empty();
        state.rows = vec![text_row("r1", "a")];
        let mut ids = ids();

        let next = delete_block(&state, &mut ids, "a").unwrap().unwrap();
        assert_eq!(next.rows.len(), 1);
        assert_eq!(next.rows[0].blocks[0].block_type, BlockType::ContentBox);
    }

    #[test]
    fn test_delete_guard_keeps_last_title() {
        let state = DocumentState::initial();
        let mut ids = ids();

        let result = delete_block(&state, &mut ids, "block-title").unwrap();
        assert!(result.is_none());

        let applied = Mutation::DeleteBlock {
            block_id: "block-title".to_string(),
        }
        .apply(&state, &mut ids)
        .unwrap();
        assert!(!applied.changed);
        assert_eq!(applied.state, state);
    }

    #[test]
    fn test_sort_content_boxes() {
        let mut state = DocumentState::empty();
        state.rows = vec![
            text_row("r0", "intro"),
            boxed("r1", "therapy", "therapy"),
            boxed("r2", "custom", "something-new"),
            Row {
                id: "r3".to_string(),
                column_ratio: 0.4,
                blocks: vec![
                    Block::content_box("notes", "notes", "notes-text"),
                    Block::content_box("definition", "definition", "definition-text"),
                ],
            },
        ];
        let mut ids = ids();

        let next = sort_content_boxes_by_category(&state, &mut ids);
        let order: Vec<&str> = next.rows.iter().map(|r| r.blocks[0].id.as_str()).collect();

        assert_eq!(order, vec!["definition", "therapy", "notes", "custom", "intro"]);
        assert!(next.rows.iter().all(|r| r.blocks.len() == 1));
        // Untouched single rows keep their ids
        assert!(next.rows.iter().any(|r| r.id == "r1"));
        assert!(next.rows.iter().all(|r| r.id != "r3"));
    }

    #[test]
    fn test_set_column_ratio_is_clamped() {
        let mut state = DocumentState::empty();
        state.rows = vec![two_column("r1", "a", "b")];
        let mut ids = ids();

        let result = Mutation::SetColumnRatio {
            row_id: "r1".to_string(),
            ratio: 0.95,
        }
        .apply(&state, &mut ids)
        .unwrap();
        assert!((result.state.rows[0].column_ratio - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_ratio_clamped_onto_stored_value_is_unchanged() {
        let mut state = DocumentState::empty();
        let mut row = two_column("r1", "a", "b");
        row.column_ratio = MAX_COLUMN_RATIO;
        state.rows = vec![row];
        let mut ids = ids();

        let result = Mutation::SetColumnRatio {
            row_id: "r1".to_string(),
            ratio: 0.67,
        }
        .apply(&state, &mut ids)
        .unwrap();
        assert!(!result.changed);
        assert_eq!(result.state, state);
    }

    #[test]
    fn test_sorting_sorted_document_is_unchanged() {
        let state = DocumentState::initial();
        let mut ids = ids();
        let sorted = Mutation::SortContentBoxes.apply(&state, &mut ids).unwrap();
        assert!(sorted.changed);

        let again = Mutation::SortContentBoxes
            .apply(&sorted.state, &mut ids)
            .unwrap();
        assert!(!again.changed);
    }

    #[test]
    fn test_footer_variant_set_and_clear() {
        let state = DocumentState::initial();
        let mut ids = ids();

        let set = Mutation::SetFooterVariant {
            page: 3,
            variant: Some("signature".to_string()),
        }
        .apply(&state, &mut ids)
        .unwrap();
        assert_eq!(set.state.footer_variant(3), Some("signature"));

        let cleared = Mutation::SetFooterVariant {
            page: 3,
            variant: None,
        }
        .apply(&set.state, &mut ids)
        .unwrap();
        assert_eq!(cleared.state.footer_variant(3), None);
    }

    #[test]
    fn test_replace_rows_rejects_three_blocks() {
        let state = DocumentState::initial();
        let mut ids = ids();
        let mut row = two_column("r1", "a", "b");
        row.blocks.push(Block::empty("c", BlockType::Text));

        let result = Mutation::ReplaceRows { rows: vec![row] }.apply(&state, &mut ids);
        assert!(matches!(result, Err(MutationError::InvalidStructure(_))));
    }
}
