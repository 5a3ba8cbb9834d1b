//! Block drag lifecycle.
//!
//! ```text
//! Idle -> Armed -> Dragging -> Idle
//!    \------> Idle (release/cancel from Armed: a click, not a drag)
//! ```
//!
//! Everything held here is derived, uncommitted state. Cancelling at any
//! point leaves the document and its history untouched; only a release
//! while `Dragging` yields a [`DragCommit`] for the reflow engine.

use crate::model::{BlockId, RowId};
use crate::reflow::{resolve_drop_target, DropTarget, Point, RowRect};
use serde::{Deserialize, Serialize};

/// Default pointer travel before a press becomes a drag
pub const DEFAULT_DRAG_THRESHOLD: f64 = 8.0;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum DragState {
    #[default]
    Idle,
    #[serde(rename_all = "camelCase")]
    Armed {
        block_id: BlockId,
        source_row_id: RowId,
        origin: Point,
    },
    #[serde(rename_all = "camelCase")]
    Dragging {
        block_id: BlockId,
        source_row_id: RowId,
        origin: Point,
        current: Point,
        target: DropTarget,
    },
}

/// A finished drag, ready to be reflowed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragCommit {
    pub block_id: BlockId,
    pub source_row_id: RowId,
    pub target: DropTarget,
}

/// Why an event was ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DragNoopReason {
    IdleWithoutActiveDrag,
    DragAlreadyInProgress,
    /// Pressed on something that is not a top-level block
    UnknownBlock,
    ThresholdNotReached,
    TargetUnchanged,
}

/// Effect of one lifecycle step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "camelCase")]
pub enum DragEffect {
    Armed,
    Started { target: DropTarget },
    TargetChanged { target: DropTarget },
    Committed(DragCommit),
    /// Released before crossing the threshold
    Clicked,
    Cancelled,
    Noop { reason: DragNoopReason },
}

/// Per-editor drag state machine
#[derive(Debug, Clone, PartialEq)]
pub struct DragMachine {
    state: DragState,
    threshold: f64,
    edge: f64,
}

impl DragMachine {
    pub fn new(threshold: f64, edge: f64) -> Self {
        Self {
            state: DragState::Idle,
            threshold,
            edge,
        }
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// Drop target shown as hover feedback
    pub fn current_target(&self) -> Option<&DropTarget> {
        match &self.state {
            DragState::Dragging { target, .. } => Some(target),
            _ => None,
        }
    }

    pub fn pointer_down(
        &mut self,
        block_id: &str,
        source_row_id: &str,
        position: Point,
    ) -> DragEffect {
        if !matches!(self.state, DragState::Idle) {
            return DragEffect::Noop {
                reason: DragNoopReason::DragAlreadyInProgress,
            };
        }
        self.state = DragState::Armed {
            block_id: block_id.to_string(),
            source_row_id: source_row_id.to_string(),
            origin: position,
        };
        DragEffect::Armed
    }

    pub fn pointer_move(&mut self, position: Point, rects: &[RowRect]) -> DragEffect {
        match &mut self.state {
            DragState::Idle => DragEffect::Noop {
                reason: DragNoopReason::IdleWithoutActiveDrag,
            },
            DragState::Armed {
                block_id,
                source_row_id,
                origin,
            } => {
                // Strictly more than the threshold: plain clicks jitter a few pixels.
                if origin.distance_to(position) <= self.threshold {
                    return DragEffect::Noop {
                        reason: DragNoopReason::ThresholdNotReached,
                    };
                }
                let target = resolve_drop_target(position, rects, self.edge);
                self.state = DragState::Dragging {
                    block_id: std::mem::take(block_id),
                    source_row_id: std::mem::take(source_row_id),
                    origin: *origin,
                    current: position,
                    target: target.clone(),
                };
                DragEffect::Started { target }
            }
            DragState::Dragging {
                current, target, ..
            } => {
                *current = position;
                let resolved = resolve_drop_target(position, rects, self.edge);
                if *target == resolved {
                    DragEffect::Noop {
                        reason: DragNoopReason::TargetUnchanged,
                    }
                } else {
                    *target = resolved.clone();
                    DragEffect::TargetChanged { target: resolved }
                }
            }
        }
    }

    /// Release the pointer. Only a release while dragging commits.
    pub fn pointer_up(&mut self) -> DragEffect {
        match std::mem::take(&mut self.state) {
            DragState::Idle => DragEffect::Noop {
                reason: DragNoopReason::IdleWithoutActiveDrag,
            },
            DragState::Armed { .. } => DragEffect::Clicked,
            DragState::Dragging {
                block_id,
                source_row_id,
                target,
                ..
            } => DragEffect::Committed(DragCommit {
                block_id,
                source_row_id,
                target,
            }),
        }
    }

    /// Abort (pointer left the viewport, Escape, ...). Never commits.
    pub fn cancel(&mut self) -> DragEffect {
        match std::mem::take(&mut self.state) {
            DragState::Idle => DragEffect::Noop {
                reason: DragNoopReason::IdleWithoutActiveDrag,
            },
            _ => DragEffect::Cancelled,
        }
    }
}

impl Default for DragMachine {
    fn default() -> Self {
        Self::new(DEFAULT_DRAG_THRESHOLD, 16.0)
    }
}
