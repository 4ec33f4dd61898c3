//! Ordered cell selection.

use crate::cell::CellId;
use crate::model::GraphModel;

/// The set of currently selected cells, in selection order.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    cells: Vec<CellId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cells(&self) -> &[CellId] {
        &self.cells
    }

    pub fn is_selected(&self, cell: CellId) -> bool {
        self.cells.contains(&cell)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Replace the selection. Returns true if it changed.
    pub fn set(&mut self, cells: Vec<CellId>) -> bool {
        if self.cells == cells {
            return false;
        }
        self.cells = cells;
        true
    }

    /// Add a cell if not already selected. Returns true if it changed.
    pub fn add(&mut self, cell: CellId) -> bool {
        if self.cells.contains(&cell) {
            return false;
        }
        self.cells.push(cell);
        true
    }

    /// Remove a cell. Returns true if it changed.
    pub fn remove(&mut self, cell: CellId) -> bool {
        let before = self.cells.len();
        self.cells.retain(|&c| c != cell);
        self.cells.len() != before
    }

    /// Toggle a cell's membership.
    pub fn toggle(&mut self, cell: CellId) {
        if !self.remove(cell) {
            self.cells.push(cell);
        }
    }

    /// Clear the selection. Returns true if it changed.
    pub fn clear(&mut self) -> bool {
        if self.cells.is_empty() {
            return false;
        }
        self.cells.clear();
        true
    }

    /// Drop cells no longer attached to the model. Returns true if any
    /// were dropped.
    pub fn repair(&mut self, model: &GraphModel) -> bool {
        let before = self.cells.len();
        self.cells.retain(|&c| model.contains(c));
        self.cells.len() != before
    }
}
