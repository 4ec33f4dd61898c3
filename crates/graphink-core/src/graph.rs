//! The editor facade: model, view, history, and selection wired together.
//!
//! [`Graph`] owns the commit pipeline. Every mutation goes through one
//! transaction; at the outermost commit the change entries invalidate the
//! view, a single validate pass recomputes the affected states, the edit
//! is recorded for undo, and the resulting redraw batch accumulates until
//! the embedder drains it with [`Graph::take_redraw`].

use crate::cell::{Cell, CellId};
use crate::error::{ModelError, ModelResult};
use crate::event::{Event, EventSource};
use crate::geometry::{Geometry, GeometryPolicy};
use crate::model::GraphModel;
use crate::routing::RouterRegistry;
use crate::selection::Selection;
use crate::style::Stylesheet;
use crate::undo::{UndoManager, UndoableEdit, DEFAULT_HISTORY_LIMIT};
use crate::view::{world_origin, GraphView, RedrawBatch};
use kurbo::{Point, Rect, Vec2};

/// Per-instance configuration, passed at construction. Extension points
/// (stylesheet, routers) are injected here rather than subclassed in.
pub struct GraphConfig {
    pub geometry_policy: GeometryPolicy,
    pub history_limit: usize,
    /// Style applied to vertices inserted without an explicit style.
    pub default_vertex_style: String,
    /// Style applied to edges inserted without an explicit style.
    pub default_edge_style: String,
    pub stylesheet: Stylesheet,
    pub routers: RouterRegistry,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            geometry_policy: GeometryPolicy::default(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            default_vertex_style: String::new(),
            default_edge_style: String::new(),
            stylesheet: Stylesheet::new(),
            routers: RouterRegistry::new(),
        }
    }
}

/// Events fired by the facade.
#[derive(Debug)]
pub enum GraphEvent {
    Undo { cells: Vec<CellId> },
    Redo { cells: Vec<CellId> },
    SelectionChanged { cells: Vec<CellId> },
}

/// Discriminants for [`GraphEvent`] listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphEventKind {
    Undo,
    Redo,
    SelectionChanged,
}

impl Event for GraphEvent {
    type Kind = GraphEventKind;

    fn kind(&self) -> GraphEventKind {
        match self {
            GraphEvent::Undo { .. } => GraphEventKind::Undo,
            GraphEvent::Redo { .. } => GraphEventKind::Redo,
            GraphEvent::SelectionChanged { .. } => GraphEventKind::SelectionChanged,
        }
    }
}

/// An interactive diagram: transactional model, derived view, undo
/// history, and selection.
#[derive(Debug)]
pub struct Graph {
    model: GraphModel,
    view: GraphView,
    history: UndoManager,
    selection: Selection,
    default_vertex_style: String,
    default_edge_style: String,
    events: EventSource<GraphEvent>,
    pending_redraw: RedrawBatch,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            model: GraphModel::with_policy(config.geometry_policy),
            view: GraphView::with_parts(Box::new(config.stylesheet), config.routers),
            history: UndoManager::with_limit(config.history_limit),
            selection: Selection::new(),
            default_vertex_style: config.default_vertex_style,
            default_edge_style: config.default_edge_style,
            events: EventSource::new(),
            pending_redraw: RedrawBatch::default(),
        }
    }

    pub fn model(&self) -> &GraphModel {
        &self.model
    }

    pub fn view(&self) -> &GraphView {
        &self.view
    }

    pub fn events(&self) -> &EventSource<GraphEvent> {
        &self.events
    }

    pub fn default_parent(&self) -> CellId {
        self.model.default_parent()
    }

    // ----- transactions ----------------------------------------------------

    /// Open a transaction on the model. Pairs with [`Graph::end_update`];
    /// pairs may nest.
    pub fn begin_update(&mut self) {
        self.model.begin_update();
    }

    /// Close a transaction level. At the outermost commit this runs the
    /// full pipeline: invalidate, validate, record for undo, repair
    /// selection.
    pub fn end_update(&mut self) {
        if let Some(edit) = self.model.end_update() {
            self.absorb(edit);
        }
    }

    /// Run a batch of model mutations as one transaction.
    pub fn update<T>(
        &mut self,
        f: impl FnOnce(&mut GraphModel) -> ModelResult<T>,
    ) -> ModelResult<T> {
        self.begin_update();
        let result = f(&mut self.model);
        self.end_update();
        result
    }

    fn absorb(&mut self, edit: UndoableEdit) {
        self.view.invalidate(&self.model, edit.entries());
        let batch = self.view.validate(&self.model);
        self.pending_redraw.merge(batch);
        self.history.record(edit);
        self.repair_selection();
    }

    /// Drain the redraw batch accumulated since the last call. The
    /// embedder hands this to its renderer once per frame.
    pub fn take_redraw(&mut self) -> RedrawBatch {
        std::mem::take(&mut self.pending_redraw)
    }

    /// Recompute any pending view state outside a commit (e.g. after
    /// registering a router) and accumulate the result.
    pub fn refresh(&mut self) {
        let batch = self.view.validate(&self.model);
        self.pending_redraw.merge(batch);
    }

    // ----- convenience constructors ---------------------------------------

    /// Insert a vertex. `style` falls back to the configured default.
    pub fn insert_vertex(
        &mut self,
        parent: Option<CellId>,
        geometry: Geometry,
        style: Option<&str>,
        value: Option<serde_json::Value>,
    ) -> ModelResult<CellId> {
        let style = style.unwrap_or(&self.default_vertex_style).to_string();
        let mut cell = Cell::vertex(geometry).with_style(style);
        if let Some(value) = value {
            cell = cell.with_value(value);
        }
        self.update(move |m| m.add(parent, cell, None))
    }

    /// Insert an edge between two connectable cells.
    pub fn insert_edge(
        &mut self,
        parent: Option<CellId>,
        source: CellId,
        target: CellId,
        style: Option<&str>,
        value: Option<serde_json::Value>,
    ) -> ModelResult<CellId> {
        for terminal in [source, target] {
            let cell = self
                .model
                .cell(terminal)
                .ok_or(ModelError::UnknownCell(terminal))?;
            if !cell.is_connectable() {
                return Err(ModelError::NotConnectable(terminal));
            }
        }
        let style = style.unwrap_or(&self.default_edge_style).to_string();
        let mut cell = Cell::edge().between(source, target).with_style(style);
        if let Some(value) = value {
            cell = cell.with_value(value);
        }
        self.update(move |m| m.add(parent, cell, None))
    }

    /// Remove cells (with their subtrees) as one transaction. Cells that
    /// were already removed as part of an earlier subtree are skipped.
    pub fn remove_cells(&mut self, cells: &[CellId]) -> ModelResult<()> {
        let cells = cells.to_vec();
        self.update(move |m| {
            for cell in cells {
                if m.contains(cell) {
                    m.remove(cell)?;
                }
            }
            Ok(())
        })
    }

    /// Remove the selected cells.
    pub fn remove_selected(&mut self) -> ModelResult<()> {
        let cells = self.selection.cells().to_vec();
        self.remove_cells(&cells)
    }

    /// Translate cells by a world-coordinate delta as one transaction.
    pub fn move_cells(&mut self, cells: &[CellId], delta: Vec2) -> ModelResult<()> {
        let cells = cells.to_vec();
        self.update(move |m| {
            for cell in cells {
                let Some(geo) = m.cell(cell).and_then(|c| c.geometry()).cloned() else {
                    continue;
                };
                m.set_geometry(cell, Some(geo.translated(delta)))?;
            }
            Ok(())
        })
    }

    /// Set a cell's bounds from a world-coordinate rectangle.
    pub fn resize_cell(&mut self, cell: CellId, world_rect: Rect) -> ModelResult<()> {
        let origin = self
            .model
            .parent(cell)
            .map(|p| world_origin(&self.model, p))
            .unwrap_or(Point::ZERO);
        let local = world_rect - Vec2::new(origin.x, origin.y);
        let geometry = self
            .model
            .cell(cell)
            .and_then(|c| c.geometry())
            .map(|g| g.with_rect(local))
            .unwrap_or_else(|| Geometry::new(local.x0, local.y0, local.width(), local.height()));
        self.update(move |m| m.set_geometry(cell, Some(geometry)))
    }

    /// Move a cell to a new position in its parent's child list.
    pub fn order_cell(&mut self, cell: CellId, index: usize) -> ModelResult<()> {
        let parent = self
            .model
            .parent(cell)
            .ok_or(ModelError::UnknownCell(cell))?;
        self.update(move |m| m.reparent(cell, parent, Some(index)))
    }

    /// Replace a cell's style string.
    pub fn set_cell_style(&mut self, cell: CellId, style: impl Into<String>) -> ModelResult<()> {
        let style = style.into();
        self.update(move |m| m.set_style(cell, style))
    }

    /// Group cells under a new container sized to their union, keeping
    /// every member's absolute position. One transaction.
    pub fn group_cells(&mut self, cells: &[CellId]) -> ModelResult<CellId> {
        let first = cells.first().ok_or(ModelError::UnknownCell(CellId::nil()))?;
        let parent = self
            .model
            .parent(*first)
            .ok_or(ModelError::UnknownCell(*first))?;

        // Union of the members' world bounds.
        let mut union: Option<Rect> = None;
        let mut world_rects = Vec::with_capacity(cells.len());
        for &cell in cells {
            let origin = world_origin(&self.model, cell);
            let size = self
                .model
                .cell(cell)
                .and_then(|c| c.geometry())
                .map(|g| (g.width(), g.height()))
                .unwrap_or((0.0, 0.0));
            let rect = Rect::from_origin_size(origin, kurbo::Size::new(size.0, size.1));
            world_rects.push((cell, rect));
            union = Some(match union {
                Some(u) => u.union(rect),
                None => rect,
            });
        }
        let union = union.ok_or(ModelError::UnknownCell(*first))?;
        let parent_origin = world_origin(&self.model, parent);
        let group_geo = Geometry::new(
            union.x0 - parent_origin.x,
            union.y0 - parent_origin.y,
            union.width(),
            union.height(),
        );

        self.update(move |m| {
            let group = m.add(Some(parent), Cell::group().with_geometry(group_geo), None)?;
            for (cell, world) in world_rects {
                m.reparent(cell, group, None)?;
                let local = Rect::from_origin_size(
                    Point::new(world.x0 - union.x0, world.y0 - union.y0),
                    world.size(),
                );
                if let Some(geo) = m.cell(cell).and_then(|c| c.geometry()).cloned() {
                    m.set_geometry(cell, Some(geo.with_rect(local)))?;
                }
            }
            Ok(group)
        })
    }

    /// Dissolve a group, returning its children to the group's parent
    /// with their absolute positions preserved. One transaction.
    pub fn ungroup_cell(&mut self, group: CellId) -> ModelResult<Vec<CellId>> {
        let parent = self
            .model
            .parent(group)
            .ok_or(ModelError::UnknownCell(group))?;
        let group_origin = world_origin(&self.model, group);
        let parent_origin = world_origin(&self.model, parent);
        let offset = Vec2::new(
            group_origin.x - parent_origin.x,
            group_origin.y - parent_origin.y,
        );
        let children: Vec<CellId> = self.model.children(group).to_vec();

        self.update(move |m| {
            for &cell in &children {
                m.reparent(cell, parent, None)?;
                if let Some(geo) = m.cell(cell).and_then(|c| c.geometry()).cloned() {
                    m.set_geometry(cell, Some(geo.translated(offset)))?;
                }
            }
            m.remove(group)?;
            Ok(children)
        })
    }

    // ----- history ---------------------------------------------------------

    /// Revert the most recent committed transaction. Returns false if
    /// there was nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(edit) = self.history.undo(&mut self.model) else {
            return false;
        };
        let entries = edit.entries().to_vec();
        let touched = edit.touched();
        self.view.invalidate(&self.model, &entries);
        let batch = self.view.validate(&self.model);
        self.pending_redraw.merge(batch);
        self.repair_selection();
        self.events.fire(&GraphEvent::Undo { cells: touched });
        true
    }

    /// Re-apply the most recently undone transaction. Returns false if
    /// there was nothing to redo.
    pub fn redo(&mut self) -> bool {
        let Some(edit) = self.history.redo(&mut self.model) else {
            return false;
        };
        let entries = edit.entries().to_vec();
        let touched = edit.touched();
        self.view.invalidate(&self.model, &entries);
        let batch = self.view.validate(&self.model);
        self.pending_redraw.merge(batch);
        self.repair_selection();
        self.events.fire(&GraphEvent::Redo { cells: touched });
        true
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history(&self) -> &UndoManager {
        &self.history
    }

    // ----- view passthrough ------------------------------------------------

    pub fn set_scale(&mut self, scale: f64) {
        self.view.set_scale(scale);
        self.refresh();
    }

    pub fn set_translate(&mut self, translate: Vec2) {
        self.view.set_translate(translate);
        self.refresh();
    }

    pub fn set_current_root(&mut self, root: Option<CellId>) {
        self.view.set_current_root(root);
        self.refresh();
    }

    /// Front-most cell under a scene point.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> Option<CellId> {
        self.view.hit_test(&self.model, point, tolerance)
    }

    /// Cells whose states intersect a scene rectangle (rubber-band
    /// selection).
    pub fn cells_in_rect(&self, rect: Rect) -> Vec<CellId> {
        self.model
            .pre_order()
            .filter_map(|cell| {
                let state = self.view.state(cell.id())?;
                let hit = if state.is_edge() {
                    state
                        .absolute_points
                        .iter()
                        .any(|p| rect.contains(*p))
                } else {
                    rect.intersect(state.bounds).area() > 0.0
                };
                hit.then_some(cell.id())
            })
            .collect()
    }

    // ----- selection -------------------------------------------------------

    pub fn selection(&self) -> &[CellId] {
        self.selection.cells()
    }

    pub fn is_selected(&self, cell: CellId) -> bool {
        self.selection.is_selected(cell)
    }

    /// Select a single cell, replacing the current selection.
    pub fn select(&mut self, cell: CellId) {
        if self.selection.set(vec![cell]) {
            self.fire_selection_changed();
        }
    }

    pub fn set_selection(&mut self, cells: Vec<CellId>) {
        if self.selection.set(cells) {
            self.fire_selection_changed();
        }
    }

    pub fn add_to_selection(&mut self, cell: CellId) {
        if self.selection.add(cell) {
            self.fire_selection_changed();
        }
    }

    pub fn toggle_selection(&mut self, cell: CellId) {
        self.selection.toggle(cell);
        self.fire_selection_changed();
    }

    pub fn clear_selection(&mut self) {
        if self.selection.clear() {
            self.fire_selection_changed();
        }
    }

    fn repair_selection(&mut self) {
        if self.selection.repair(&self.model) {
            self.fire_selection_changed();
        }
    }

    fn fire_selection_changed(&mut self) {
        self.events.fire(&GraphEvent::SelectionChanged {
            cells: self.selection.cells().to_vec(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Handled;
    use std::cell::Cell as StdCell;
    use std::rc::Rc;

    fn geometry(x: f64, y: f64) -> Geometry {
        Geometry::new(x, y, 80.0, 30.0)
    }

    #[test]
    fn test_insert_commit_undo_redo_scenario() {
        let mut graph = Graph::new();

        graph.begin_update();
        let a = graph.insert_vertex(None, geometry(0.0, 0.0), None, None).unwrap();
        let b = graph
            .insert_vertex(None, geometry(200.0, 150.0), None, None)
            .unwrap();
        let e = graph.insert_edge(None, a, b, None, None).unwrap();
        graph.end_update();

        // One transaction, one edit: the edge resolved against both
        // terminal states.
        let state = graph.view().state(e).unwrap();
        assert_eq!(state.absolute_points.len(), 2);
        let committed = graph.model().to_document();

        assert!(graph.undo());
        assert_eq!(
            graph.model().children(graph.default_parent()).len(),
            0,
            "undo restores the empty default parent"
        );
        assert!(graph.view().state(e).is_none());

        assert!(graph.redo());
        assert_eq!(graph.model().to_document().cells, committed.cells);
        assert!(graph.view().state(e).is_some());
    }

    #[test]
    fn test_single_undo_covers_whole_transaction() {
        let mut graph = Graph::new();
        let p1 = graph
            .update(|m| m.add(None, Cell::group(), None))
            .unwrap();
        let p2 = graph
            .update(|m| m.add(None, Cell::group(), None))
            .unwrap();
        let a = graph
            .insert_vertex(Some(p1), geometry(0.0, 0.0), None, None)
            .unwrap();

        graph.update(|m| {
            m.reparent(a, p2, None)?;
            m.set_geometry(a, Some(Geometry::new(0.0, 0.0, 160.0, 60.0)))
        })
        .unwrap();

        assert!(graph.undo());
        assert_eq!(graph.model().parent(a), Some(p1));
        let geo = graph.model().cell(a).unwrap().geometry().unwrap();
        assert_eq!((geo.width(), geo.height()), (80.0, 30.0));
    }

    #[test]
    fn test_take_redraw_accumulates_and_drains() {
        let mut graph = Graph::new();
        let a = graph.insert_vertex(None, geometry(0.0, 0.0), None, None).unwrap();
        let batch = graph.take_redraw();
        assert!(batch.updated.contains(&a));
        assert!(graph.take_redraw().is_empty());
    }

    #[test]
    fn test_removal_repairs_selection() {
        let mut graph = Graph::new();
        let a = graph.insert_vertex(None, geometry(0.0, 0.0), None, None).unwrap();
        let b = graph.insert_vertex(None, geometry(100.0, 0.0), None, None).unwrap();
        graph.set_selection(vec![a, b]);

        let fired = Rc::new(StdCell::new(0));
        let fired2 = Rc::clone(&fired);
        graph
            .events()
            .add_listener(GraphEventKind::SelectionChanged, move |_| {
                fired2.set(fired2.get() + 1);
                Ok(Handled::Continue)
            });

        graph.remove_cells(&[a]).unwrap();
        assert_eq!(graph.selection(), &[b]);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_move_cells_updates_edge_route() {
        let mut graph = Graph::new();
        let a = graph.insert_vertex(None, geometry(0.0, 0.0), None, None).unwrap();
        let b = graph.insert_vertex(None, geometry(200.0, 0.0), None, None).unwrap();
        let e = graph.insert_edge(None, a, b, None, None).unwrap();
        let before = graph.view().state(e).unwrap().absolute_points.clone();

        graph.move_cells(&[b], Vec2::new(0.0, 300.0)).unwrap();
        let after = graph.view().state(e).unwrap().absolute_points.clone();
        assert_ne!(before, after);

        // A single undo puts the route back.
        assert!(graph.undo());
        assert_eq!(graph.view().state(e).unwrap().absolute_points, before);
    }

    #[test]
    fn test_resize_cell_world_rect() {
        let mut graph = Graph::new();
        let group = graph
            .update(|m| {
                m.add(
                    None,
                    Cell::group().with_geometry(Geometry::new(100.0, 100.0, 300.0, 300.0)),
                    None,
                )
            })
            .unwrap();
        let a = graph
            .insert_vertex(Some(group), geometry(10.0, 10.0), None, None)
            .unwrap();

        graph
            .resize_cell(a, Rect::new(150.0, 150.0, 250.0, 200.0))
            .unwrap();
        let geo = graph.model().cell(a).unwrap().geometry().unwrap();
        // Stored relative to the parent group at (100,100).
        assert_eq!((geo.x(), geo.y()), (50.0, 50.0));
        assert_eq!((geo.width(), geo.height()), (100.0, 50.0));
    }

    #[test]
    fn test_group_and_ungroup_preserve_world_positions() {
        let mut graph = Graph::new();
        let a = graph.insert_vertex(None, geometry(100.0, 100.0), None, None).unwrap();
        let b = graph.insert_vertex(None, geometry(300.0, 200.0), None, None).unwrap();

        let group = graph.group_cells(&[a, b]).unwrap();
        assert_eq!(graph.model().parent(a), Some(group));
        let state_a = graph.view().state(a).unwrap();
        assert_eq!(state_a.bounds.origin(), Point::new(100.0, 100.0));
        let group_state = graph.view().state(group).unwrap();
        assert_eq!(group_state.bounds, Rect::new(100.0, 100.0, 380.0, 230.0));

        let children = graph.ungroup_cell(group).unwrap();
        assert_eq!(children, vec![a, b]);
        assert!(!graph.model().contains(group));
        let state_a = graph.view().state(a).unwrap();
        assert_eq!(state_a.bounds.origin(), Point::new(100.0, 100.0));
    }

    #[test]
    fn test_insert_edge_rejects_unconnectable_terminal(){
        let mut graph = Graph::new();
        let a = graph.insert_vertex(None, geometry(0.0, 0.0), None, None).unwrap();
        let group = graph
            .update(|m| m.add(None, Cell::group(), None))
            .unwrap();
        assert!(matches!(
            graph.insert_edge(None, a, group, None, None),
            Err(ModelError::NotConnectable(_))
        ));
    }

    #[test]
    fn test_default_styles_applied() {
        let config = GraphConfig {
            default_vertex_style: "rounded=1".to_string(),
            ..GraphConfig::default()
        };
        let mut graph = Graph::with_config(config);
        let a = graph.insert_vertex(None, geometry(0.0, 0.0), None, None).unwrap();
        assert!(graph.view().state(a).unwrap().style.flag(crate::style::keys::ROUNDED, false));
    }

    #[test]
    fn test_order_cell_reorders_siblings() {
        let mut graph = Graph::new();
        let a = graph.insert_vertex(None, geometry(0.0, 0.0), None, None).unwrap();
        let b = graph.insert_vertex(None, geometry(10.0, 0.0), None, None).unwrap();
        let parent = graph.default_parent();
        assert_eq!(graph.model().children(parent), &[a, b]);

        graph.order_cell(a, 1).unwrap();
        assert_eq!(graph.model().children(parent), &[b, a]);

        assert!(graph.undo());
        assert_eq!(graph.model().children(parent), &[a, b]);
    }
}
