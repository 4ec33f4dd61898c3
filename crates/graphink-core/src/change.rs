//! Reversible change-log entries.
//!
//! Every primitive mutation the model performs is recorded as one
//! [`ChangeEntry`] capturing both the prior and the new state, so the
//! entry can re-apply or revert itself without consulting anything else.
//! Entries are produced by [`GraphModel`](crate::model::GraphModel),
//! collected into [`UndoableEdit`](crate::undo::UndoableEdit)s, and walked
//! by the view's invalidation pass.

use crate::cell::CellId;
use crate::geometry::Geometry;
use crate::model::GraphModel;
use serde::{Deserialize, Serialize};

/// Which end of an edge a terminal change refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminalEnd {
    Source,
    Target,
}

impl TerminalEnd {
    pub fn is_source(self) -> bool {
        self == TerminalEnd::Source
    }
}

/// A tree location: parent id plus index in its child list.
pub type ChildSlot = (CellId, usize);

/// One recorded primitive mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChangeEntry {
    /// The cell moved between tree locations. `from: None` is an add,
    /// `to: None` a remove (the subtree travels with the cell).
    Child {
        cell: CellId,
        from: Option<ChildSlot>,
        to: Option<ChildSlot>,
    },
    /// One terminal reference of an edge changed.
    Terminal {
        edge: CellId,
        end: TerminalEnd,
        previous: Option<CellId>,
        terminal: Option<CellId>,
    },
    Geometry {
        cell: CellId,
        previous: Option<Geometry>,
        geometry: Option<Geometry>,
    },
    Style {
        cell: CellId,
        previous: String,
        style: String,
    },
    Value {
        cell: CellId,
        previous: Option<serde_json::Value>,
        value: Option<serde_json::Value>,
    },
    Visible {
        cell: CellId,
        previous: bool,
        visible: bool,
    },
    Collapsed {
        cell: CellId,
        previous: bool,
        collapsed: bool,
    },
    /// The model root was swapped.
    Root { previous: CellId, root: CellId },
}

impl ChangeEntry {
    /// The cell this entry touches (for invalidation and re-selection).
    pub fn cell(&self) -> CellId {
        match self {
            ChangeEntry::Child { cell, .. }
            | ChangeEntry::Geometry { cell, .. }
            | ChangeEntry::Style { cell, .. }
            | ChangeEntry::Value { cell, .. }
            | ChangeEntry::Visible { cell, .. }
            | ChangeEntry::Collapsed { cell, .. } => *cell,
            ChangeEntry::Terminal { edge, .. } => *edge,
            ChangeEntry::Root { root, .. } => *root,
        }
    }

    /// Re-apply the "after" state. Used when the entry is first executed
    /// and on redo; never re-logs.
    pub(crate) fn apply(&self, model: &mut GraphModel) {
        match self {
            ChangeEntry::Child { cell, to, .. } => model.relocate(*cell, *to),
            ChangeEntry::Terminal {
                edge, end, terminal, ..
            } => model.set_terminal_raw(*edge, *end, *terminal),
            ChangeEntry::Geometry { cell, geometry, .. } => {
                model.set_geometry_raw(*cell, geometry.clone())
            }
            ChangeEntry::Style { cell, style, .. } => model.set_style_raw(*cell, style.clone()),
            ChangeEntry::Value { cell, value, .. } => model.set_value_raw(*cell, value.clone()),
            ChangeEntry::Visible { cell, visible, .. } => model.set_visible_raw(*cell, *visible),
            ChangeEntry::Collapsed {
                cell, collapsed, ..
            } => model.set_collapsed_raw(*cell, *collapsed),
            ChangeEntry::Root { root, .. } => model.set_root_raw(*root),
        }
    }

    /// Restore the "before" state. Used on undo; never re-logs.
    pub(crate) fn revert(&self, model: &mut GraphModel) {
        match self {
            ChangeEntry::Child { cell, from, .. } => model.relocate(*cell, *from),
            ChangeEntry::Terminal {
                edge, end, previous, ..
            } => model.set_terminal_raw(*edge, *end, *previous),
            ChangeEntry::Geometry { cell, previous, .. } => {
                model.set_geometry_raw(*cell, previous.clone())
            }
            ChangeEntry::Style { cell, previous, .. } => {
                model.set_style_raw(*cell, previous.clone())
            }
            ChangeEntry::Value { cell, previous, .. } => {
                model.set_value_raw(*cell, previous.clone())
            }
            ChangeEntry::Visible { cell, previous, .. } => {
                model.set_visible_raw(*cell, *previous)
            }
            ChangeEntry::Collapsed { cell, previous, .. } => {
                model.set_collapsed_raw(*cell, *previous)
            }
            ChangeEntry::Root { previous, .. } => model.set_root_raw(*previous),
        }
    }

    /// True for changes that move or resize subtrees, where descendants'
    /// derived state depends on this cell.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ChangeEntry::Child { .. }
                | ChangeEntry::Geometry { .. }
                | ChangeEntry::Root { .. }
                | ChangeEntry::Visible { .. }
                | ChangeEntry::Collapsed { .. }
        )
    }
}
