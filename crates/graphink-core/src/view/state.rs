//! Derived visual state for a cell.

use crate::cell::{CellId, CellKind};
use crate::style::ResolvedStyle;
use kurbo::{Point, Rect};

/// The resolved visual state of one cell: absolute scene-coordinate
/// bounds, the effective style, and (for edges) the routed point list.
///
/// States are rebuildable caches owned by the view; they stay valid until
/// the next change affecting the cell, an ancestor's transform, or (for
/// edges) either terminal. External readers treat them as read-only
/// snapshots and look cells up by `cell` id rather than holding
/// references.
#[derive(Debug, Clone, PartialEq)]
pub struct CellState {
    /// The cell this state derives from.
    pub cell: CellId,
    pub kind: CellKind,
    /// Absolute bounds in scene coordinates. For edges, the bounding box
    /// of the routed points.
    pub bounds: Rect,
    /// Routed absolute points; empty for vertices and groups.
    pub absolute_points: Vec<Point>,
    /// Effective style after resolution.
    pub style: ResolvedStyle,
    /// Cached label placement, if the cell has a value to label.
    pub label_bounds: Option<Rect>,
}

impl CellState {
    /// Center of the state in scene coordinates. For edges this is the
    /// midpoint of the route's bounding box.
    pub fn center(&self) -> Point {
        self.bounds.center()
    }

    pub fn is_edge(&self) -> bool {
        self.kind == CellKind::Edge
    }
}
