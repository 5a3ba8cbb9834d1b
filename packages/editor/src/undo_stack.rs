//! # History Store
//!
//! Undo/redo over whole-state snapshots.
//!
//! ## Design
//!
//! - `past` holds prior snapshots (oldest first), bounded by `capacity`
//! - `present` is the current state
//! - `future` holds undone snapshots (next redo first)
//! - Every update names its [`HistoryMode`] explicitly
//!
//! ```text
//! push:      past + [present], present = next, future = []
//! replace:   present = next
//! untracked: present = next, not scheduled for draft persistence
//! ```
//!
//! `replace` exists for continuous gestures (column drags, live resizes):
//! one gesture must not explode into dozens of undo steps.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of undo levels
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// How a state update affects the undo/redo stacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HistoryMode {
    /// Record the previous state as an undo step and clear redo
    #[default]
    Push,

    /// Overwrite the present in place; stacks untouched
    Replace,

    /// Overwrite the present in place and do not persist it as a draft.
    /// A later persisted update carries this change along with it.
    Untracked,
}

/// Outcome of a state update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub mode: HistoryMode,

    /// Whether the caller should schedule a draft save for the new present
    pub persist: bool,
}

/// Undo/redo history over snapshots of `T`
#[derive(Debug, Clone)]
pub struct History<T> {
    past: VecDeque<T>,
    present: T,
    future: VecDeque<T>,

    /// Maximum number of undo levels (0 = unlimited)
    capacity: usize,
}

impl<T: Clone> History<T> {
    /// Create a history with the default capacity (50)
    pub fn new(initial: T) -> Self {
        Self::with_capacity(initial, DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_capacity(initial: T, capacity: usize) -> Self {
        Self {
            past: VecDeque::new(),
            present: initial,
            future: VecDeque::new(),
            capacity,
        }
    }

    pub fn present(&self) -> &T {
        &self.present
    }

    /// Update the present with a function of the previous state
    pub fn set_state<F>(&mut self, mode: HistoryMode, update: F) -> StateChange
    where
        F: FnOnce(&T) -> T,
    {
        let next = update(&self.present);
        self.set_value(mode, next)
    }

    /// Update the present with a ready value
    pub fn set_value(&mut self, mode: HistoryMode, next: T) -> StateChange {
        match mode {
            HistoryMode::Push => {
                let previous = std::mem::replace(&mut self.present, next);
                self.push_past(previous);
                self.future.clear();
            }
            HistoryMode::Replace | HistoryMode::Untracked => {
                self.present = next;
            }
        }

        StateChange {
            mode,
            persist: mode != HistoryMode::Untracked,
        }
    }

    fn push_past(&mut self, state: T) {
        self.past.push_back(state);

        // Trim if exceeded capacity
        if self.capacity > 0 && self.past.len() > self.capacity {
            self.past.pop_front();
        }
    }

    /// Step back one snapshot; false when there is nothing to undo
    pub fn undo(&mut self) -> bool {
        match self.past.pop_back() {
            Some(previous) => {
                let current = std::mem::replace(&mut self.present, previous);
                self.future.push_front(current);
                true
            }
            None => false,
        }
    }

    /// Step forward one snapshot; false when there is nothing to redo
    pub fn redo(&mut self) -> bool {
        match self.future.pop_front() {
            Some(next) => {
                let current = std::mem::replace(&mut self.present, next);
                self.push_past(current);
                true
            }
            None => false,
        }
    }

    /// Drop all history and start over from `initial`
    pub fn reset(&mut self, initial: T) {
        self.past.clear();
        self.future.clear();
        self.present = initial;
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn undo_levels(&self) -> usize {
        self.past.len()
    }

    pub fn redo_levels(&self) -> usize {
        self.future.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Prior snapshots, oldest first
    pub fn past(&self) -> impl Iterator<Item = &T> {
        self.past.iter()
    }

    /// Undone snapshots, next redo first
    pub fn future(&self) -> impl Iterator<Item = &T> {
        self.future.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_creation() {
        let history = History::new(0);
        assert_eq!(history.undo_levels(), 0);
        assert_eq!(history.redo_levels(), 0);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert_eq!(history.capacity(), DEFAULT_HISTORY_CAPACITY);
    }

    #[test]
    fn test_push_undo_redo() {
        let mut history = History::new("a".to_string());

        history.set_state(HistoryMode::Push, |prev| format!("{}b", prev));
        assert_eq!(history.present(), "ab");
        assert_eq!(history.undo_levels(), 1);

        assert!(history.undo());
        assert_eq!(history.present(), "a");
        assert_eq!(history.redo_levels(), 1);

        assert!(history.redo());
        assert_eq!(history.present(), "ab");
        assert_eq!(history.redo_levels(), 0);
    }

    #[test]
    fn test_undo_redo_noop_when_empty() {
        let mut history = History::new(1);
        assert!(!history.undo());
        assert!(!history.redo());
        assert_eq!(*history.present(), 1);
    }

    #[test]
    fn test_new_push_clears_redo() {
        let mut history = History::new(0);
        history.set_value(HistoryMode::Push, 1);
        history.set_value(HistoryMode::Push, 2);
        history.undo();
        assert_eq!(history.redo_levels(), 1);

        history.set_value(HistoryMode::Push, 3);
        assert_eq!(history.redo_levels(), 0);
        assert_eq!(history.past().copied().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut history = History::with_capacity(0, 2);
        for i in 1..=3 {
            history.set_value(HistoryMode::Push, i);
        }
        assert_eq!(history.past().copied().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_replace_keeps_stacks() {
        let mut history = History::new(0);
        history.set_value(HistoryMode::Push, 1);
        history.set_value(HistoryMode::Push, 2);
        history.undo();

        for i in 10..20 {
            let change = history.set_value(HistoryMode::Replace, i);
            assert!(change.persist);
        }

        assert_eq!(history.undo_levels(), 1);
        assert_eq!(history.redo_levels(), 1);
        assert_eq!(*history.present(), 19);
    }

    #[test]
    fn test_untracked_is_not_persisted() {
        let mut history = History::new(0);
        history.set_value(HistoryMode::Push, 1);

        let change = history.set_value(HistoryMode::Untracked, 2);
        assert!(!change.persist);
        assert_eq!(history.undo_levels(), 1);
        assert_eq!(*history.present(), 2);

        // Undo skips back past the untracked value to the last pushed baseline.
        history.undo();
        assert_eq!(*history.present(), 0);
        assert_eq!(history.future().copied().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut history = History::new(0);
        history.set_value(HistoryMode::Push, 1);
        history.set_value(HistoryMode::Push, 2);
        history.undo();

        history.reset(42);
        assert_eq!(*history.present(), 42);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }
}
