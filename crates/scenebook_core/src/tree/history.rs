//! Bounded undo/redo history of committed trees.
//!
//! # Invariants
//! - Recording a new state clears the redo stack.
//! - At most `limit` undo states are retained; the oldest is dropped first.

use super::Document;
use std::collections::VecDeque;

/// Snapshot history for one editor.
#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<Document>,
    redo: Vec<Document>,
    limit: usize,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            limit,
        }
    }

    /// Records `previous` as the state to return to on undo.
    pub fn record(&mut self, previous: Document) {
        self.redo.clear();
        self.push_undo(previous);
    }

    /// Pops the last recorded state, pushing `current` onto the redo stack.
    pub fn undo(&mut self, current: &Document) -> Option<Document> {
        let previous = self.undo.pop_back()?;
        self.redo.push(current.clone());
        Some(previous)
    }

    /// Re-applies the last undone state, pushing `current` back onto undo.
    pub fn redo(&mut self, current: &Document) -> Option<Document> {
        let next = self.redo.pop()?;
        self.push_undo(current.clone());
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    fn push_undo(&mut self, state: Document) {
        if self.limit == 0 {
            return;
        }
        if self.undo.len() == self.limit {
            self.undo.pop_front();
        }
        self.undo.push_back(state);
    }
}
