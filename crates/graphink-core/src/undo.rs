//! Undo/redo history.

use crate::cell::CellId;
use crate::change::ChangeEntry;
use crate::model::GraphModel;

/// Default maximum number of edits kept on the undo stack.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// The reversible record of one committed transaction: the ordered entry
/// list produced between the outermost `begin_update`/`end_update` pair.
/// Atomic unit of undo and redo.
#[derive(Debug, Clone, PartialEq)]
pub struct UndoableEdit {
    entries: Vec<ChangeEntry>,
}

impl UndoableEdit {
    pub(crate) fn new(entries: Vec<ChangeEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ChangeEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cells touched by this edit, deduplicated, in first-touch order.
    /// Used for view invalidation and re-selection after undo/redo.
    pub fn touched(&self) -> Vec<CellId> {
        let mut seen = Vec::new();
        for entry in &self.entries {
            let cell = entry.cell();
            if !seen.contains(&cell) {
                seen.push(cell);
            }
        }
        seen
    }
}

/// Two bounded stacks of [`UndoableEdit`].
///
/// Recording a new edit clears the redo stack and trims the undo stack to
/// the configured limit, dropping the oldest edit.
#[derive(Debug, Default)]
pub struct UndoManager {
    undo: Vec<UndoableEdit>,
    redo: Vec<UndoableEdit>,
    limit: usize,
}

impl UndoManager {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            limit,
        }
    }

    /// Record a committed edit. Empty edits are never pushed.
    pub fn record(&mut self, edit: UndoableEdit) {
        if edit.is_empty() {
            return;
        }
        self.redo.clear();
        self.undo.push(edit);
        if self.undo.len() > self.limit {
            self.undo.remove(0);
        }
        log::debug!("recorded edit, undo depth {}", self.undo.len());
    }

    /// Revert the most recent edit against the model, entry by entry in
    /// reverse order, and move it to the redo stack. Returns the reverted
    /// edit, or `None` if the stack was empty.
    pub fn undo<'a>(&'a mut self, model: &mut GraphModel) -> Option<&'a UndoableEdit> {
        let edit = self.undo.pop()?;
        for entry in edit.entries().iter().rev() {
            entry.revert(model);
        }
        log::debug!("undid edit with {} change(s)", edit.entries().len());
        self.redo.push(edit);
        self.redo.last()
    }

    /// Re-apply the most recently undone edit in original order and move
    /// it back to the undo stack. Returns the edit, or `None` if the redo
    /// stack was empty.
    pub fn redo<'a>(&'a mut self, model: &mut GraphModel) -> Option<&'a UndoableEdit> {
        let edit = self.redo.pop()?;
        for entry in edit.entries() {
            entry.apply(model);
        }
        log::debug!("redid edit with {} change(s)", edit.entries().len());
        self.undo.push(edit);
        self.undo.last()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    /// Number of edits available to undo.
    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    /// Number of edits available to redo.
    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Drop all history. Pair with
    /// [`GraphModel::prune_detached`](crate::model::GraphModel::prune_detached)
    /// to release removed subtrees.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}
