//! # Drag-and-Drop Reflow
//!
//! Turns a drop gesture into a new row list.
//!
//! ## Drop zones (per row)
//!
//! ```text
//!   ┌──────────── before ────────────┐   top ± edge
//!   │    left (1-block rows)  │ right│
//!   └──────────── after ─────────────┘   bottom ± edge
//! ```
//!
//! Left/right zones only exist for single-block rows and win over
//! before/after when the pointer is inside them.
//!
//! ## Commit
//!
//! 1. Remove the dragged block from its row (drop the row if it empties)
//! 2. before/after: insert a single-block row next to the target
//! 3. left/right: merge into the target if it holds exactly one block,
//!    otherwise fall back to an adjacent insert. The dragged block is never
//!    dropped.
//! 4. A drop that reproduces the original layout is a no-op

use crate::id_generator::IdGenerator;
use crate::model::{Row, RowId, MAX_BLOCKS_PER_ROW};
use crate::mutations::MutationError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Pointer position in page coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Collision data for one rendered row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowRect {
    pub row_id: RowId,
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
    pub block_count: usize,
}

/// Where a dragged block would land
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "rowId", rename_all = "camelCase")]
pub enum DropTarget {
    BeforeRow(RowId),
    AfterRow(RowId),
    MergeLeft(RowId),
    MergeRight(RowId),
    #[default]
    None,
}

impl DropTarget {
    pub fn row_id(&self) -> Option<&str> {
        match self {
            DropTarget::BeforeRow(id)
            | DropTarget::AfterRow(id)
            | DropTarget::MergeLeft(id)
            | DropTarget::MergeRight(id) => Some(id),
            DropTarget::None => None,
        }
    }
}

/// Resolve the pointer against every row's zones.
///
/// Left/right zones (inner band of single-block rows) take precedence over
/// the before/after strips; rows are checked in document order.
pub fn resolve_drop_target(pointer: Point, rects: &[RowRect], edge: f64) -> DropTarget {
    let within_x = |r: &RowRect| pointer.x >= r.left && pointer.x <= r.right;

    for rect in rects {
        if rect.block_count != 1 || !within_x(rect) {
            continue;
        }
        let inner_top = rect.top + edge;
        let inner_bottom = rect.bottom - edge;
        if pointer.y >= inner_top && pointer.y <= inner_bottom {
            let mid = (rect.left + rect.right) / 2.0;
            return if pointer.x < mid {
                DropTarget::MergeLeft(rect.row_id.clone())
            } else {
                DropTarget::MergeRight(rect.row_id.clone())
            };
        }
    }

    for rect in rects {
        if !within_x(rect) {
            continue;
        }
        if pointer.y >= rect.top - edge && pointer.y < rect.top + edge {
            return DropTarget::BeforeRow(rect.row_id.clone());
        }
        if pointer.y > rect.bottom - edge && pointer.y <= rect.bottom + edge {
            return DropTarget::AfterRow(rect.row_id.clone());
        }
    }

    DropTarget::None
}

/// How a committed drop rewrote the rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReflowKind {
    /// Placed in its own row before/after the target
    Moved,
    /// Joined the target row as its left/right column
    Merged,
    /// Target row was full; placed in its own row next to it instead
    MergeFallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReflowOutcome {
    pub rows: Vec<Row>,
    pub kind: ReflowKind,
}

/// Commit a drop. `Ok(None)` means nothing changed.
pub fn apply_drop(
    rows: &[Row],
    block_id: &str,
    target: &DropTarget,
    ids: &mut IdGenerator,
) -> Result<Option<ReflowOutcome>, MutationError> {
    let target_row_id = match target.row_id() {
        Some(id) => id,
        None => return Ok(None),
    };

    let (source_idx, block_idx) = rows
        .iter()
        .enumerate()
        .find_map(|(row_idx, row)| {
            row.blocks
                .iter()
                .position(|b| b.id == block_id)
                .map(|block_idx| (row_idx, block_idx))
        })
        .ok_or_else(|| MutationError::BlockNotFound(block_id.to_string()))?;

    if !rows.iter().any(|r| r.id == target_row_id) {
        return Err(MutationError::RowNotFound(target_row_id.to_string()));
    }

    let mut next = rows.to_vec();
    let block = next[source_idx].blocks.remove(block_idx);
    let source_removed = next[source_idx].blocks.is_empty();
    let source_row = if source_removed {
        Some(next.remove(source_idx))
    } else {
        None
    };

    let target_idx = match next.iter().position(|r| r.id == target_row_id) {
        Some(idx) => idx,
        // Dropped onto its own (now vanished) row
        None => return Ok(None),
    };

    // A block that was alone keeps its row identity when it moves.
    let mut fresh_row = |block| match &source_row {
        Some(row) => Row {
            id: row.id.clone(),
            column_ratio: row.column_ratio,
            blocks: vec![block],
        },
        None => Row::single(ids.new_id(), block),
    };

    let kind = match target {
        DropTarget::BeforeRow(_) => {
            next.insert(target_idx, fresh_row(block));
            ReflowKind::Moved
        }
        DropTarget::AfterRow(_) => {
            next.insert(target_idx + 1, fresh_row(block));
            ReflowKind::Moved
        }
        DropTarget::MergeLeft(_) | DropTarget::MergeRight(_) => {
            let merge_left = matches!(target, DropTarget::MergeLeft(_));
            if next[target_idx].blocks.len() < MAX_BLOCKS_PER_ROW {
                let row = &mut next[target_idx];
                if merge_left {
                    row.blocks.insert(0, block);
                } else {
                    row.blocks.push(block);
                }
                ReflowKind::Merged
            } else {
                let at = if merge_left { target_idx } else { target_idx + 1 };
                next.insert(at, fresh_row(block));
                ReflowKind::MergeFallback
            }
        }
        DropTarget::None => return Ok(None),
    };

    if next == rows {
        return Ok(None);
    }

    debug!(block_id, target = ?target, kind = ?kind, "Reflowed rows");
    Ok(Some(ReflowOutcome { rows: next, kind }))
}
