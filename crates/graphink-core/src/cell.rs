//! Cell: the graph's node, edge, and group entity.

use crate::geometry::Geometry;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for cells.
pub type CellId = Uuid;

/// What role a cell plays in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellKind {
    Vertex,
    Edge,
    /// Non-terminal container (the root, layers, and grouped cells).
    Group,
}

/// A node in the graph hierarchy.
///
/// Cells form a tree through `parent`/`children` (ownership, order
/// significant). Edges additionally carry non-owning `source`/`target`
/// references that may point anywhere in the model or be `None`
/// ("dangling"). All relationship fields are maintained exclusively by
/// [`GraphModel`](crate::model::GraphModel); reads go through the
/// accessors below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub(crate) id: CellId,
    pub(crate) kind: CellKind,
    /// Opaque value payload (typically the label).
    pub(crate) value: Option<serde_json::Value>,
    pub(crate) geometry: Option<Geometry>,
    /// Raw style string, resolved by the view's style resolver.
    pub(crate) style: String,
    pub(crate) visible: bool,
    pub(crate) collapsed: bool,
    pub(crate) connectable: bool,
    pub(crate) parent: Option<CellId>,
    pub(crate) children: Vec<CellId>,
    pub(crate) source: Option<CellId>,
    pub(crate) target: Option<CellId>,
}

impl Cell {
    fn new(kind: CellKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            value: None,
            geometry: None,
            style: String::new(),
            visible: true,
            collapsed: false,
            connectable: matches!(kind, CellKind::Vertex),
            parent: None,
            children: Vec::new(),
            source: None,
            target: None,
        }
    }

    /// Create a vertex with the given geometry.
    pub fn vertex(geometry: Geometry) -> Self {
        let mut cell = Self::new(CellKind::Vertex);
        cell.geometry = Some(geometry);
        cell
    }

    /// Create an edge with no terminals.
    pub fn edge() -> Self {
        let mut cell = Self::new(CellKind::Edge);
        cell.geometry = Some(Geometry::for_edge());
        cell
    }

    /// Create an empty group container.
    pub fn group() -> Self {
        Self::new(CellKind::Group)
    }

    /// Set the style string.
    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    /// Set the value payload.
    pub fn with_value(mut self, value: serde_json::Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Replace the geometry.
    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Preset both edge terminals; only meaningful for edges.
    pub fn between(mut self, source: CellId, target: CellId) -> Self {
        self.source = Some(source);
        self.target = Some(target);
        self
    }

    /// Mark the cell as not accepting edge connections.
    pub fn not_connectable(mut self) -> Self {
        self.connectable = false;
        self
    }

    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn kind(&self) -> CellKind {
        self.kind
    }

    pub fn is_vertex(&self) -> bool {
        self.kind == CellKind::Vertex
    }

    pub fn is_edge(&self) -> bool {
        self.kind == CellKind::Edge
    }

    pub fn is_group(&self) -> bool {
        self.kind == CellKind::Group
    }

    pub fn value(&self) -> Option<&serde_json::Value> {
        self.value.as_ref()
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    pub fn style(&self) -> &str {
        &self.style
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    pub fn is_connectable(&self) -> bool {
        self.connectable
    }

    pub fn parent(&self) -> Option<CellId> {
        self.parent
    }

    pub fn children(&self) -> &[CellId] {
        &self.children
    }

    pub fn source(&self) -> Option<CellId> {
        self.source
    }

    pub fn target(&self) -> Option<CellId> {
        self.target
    }

    /// One edge terminal by end.
    pub fn terminal(&self, source: bool) -> Option<CellId> {
        if source { self.source } else { self.target }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Geometry;

    #[test]
    fn test_vertex_defaults() {
        let cell = Cell::vertex(Geometry::new(0.0, 0.0, 80.0, 30.0));
        assert!(cell.is_vertex());
        assert!(cell.is_visible());
        assert!(cell.is_connectable());
        assert!(!cell.is_collapsed());
        assert!(cell.children().is_empty());
    }

    #[test]
    fn test_edge_terminals() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let edge = Cell::edge().between(a, b);
        assert!(edge.is_edge());
        assert_eq!(edge.terminal(true), Some(a));
        assert_eq!(edge.terminal(false), Some(b));
    }

    #[test]
    fn test_group_is_not_connectable() {
        let group = Cell::group();
        assert!(group.is_group());
        assert!(!group.is_connectable());
    }
}
