//! Transactional graph model.
//!
//! The model owns the cell hierarchy and is the only place cells mutate.
//! Every mutating operation runs inside a transaction: callers either
//! bracket a batch with [`GraphModel::begin_update`]/[`GraphModel::end_update`]
//! (pairs may nest), or the operation opens an implicit transaction around
//! itself. Each primitive validates, applies, appends a reversible
//! [`ChangeEntry`], and fires a fine-grained `Execute` event; only the
//! outermost `end_update` flushes the accumulated log as one
//! [`UndoableEdit`] and fires a single aggregate `Change` event.

use crate::cell::{Cell, CellId};
use crate::change::{ChangeEntry, ChildSlot, TerminalEnd};
use crate::error::{ModelError, ModelResult};
use crate::event::{Event, EventSource};
use crate::geometry::{Geometry, GeometryPolicy};
use crate::undo::UndoableEdit;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Events fired by the model.
#[derive(Debug)]
pub enum ModelEvent {
    /// A transaction level was opened.
    BeginUpdate { level: u32 },
    /// A transaction level was closed.
    EndUpdate { level: u32 },
    /// One primitive mutation was executed (fires inside the transaction).
    Execute { entry: ChangeEntry },
    /// An outermost transaction committed with a non-empty log.
    Change { entries: Vec<ChangeEntry> },
}

/// Discriminants for [`ModelEvent`] listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelEventKind {
    BeginUpdate,
    EndUpdate,
    Execute,
    Change,
}

impl Event for ModelEvent {
    type Kind = ModelEventKind;

    fn kind(&self) -> ModelEventKind {
        match self {
            ModelEvent::BeginUpdate { .. } => ModelEventKind::BeginUpdate,
            ModelEvent::EndUpdate { .. } => ModelEventKind::EndUpdate,
            ModelEvent::Execute { .. } => ModelEventKind::Execute,
            ModelEvent::Change { .. } => ModelEventKind::Change,
        }
    }
}

/// Serializable snapshot of the full cell tree, in pre-order.
///
/// This is the persistence boundary: an external codec gets every cell
/// with all mutable attributes and is free to define its own wire format
/// around it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDocument {
    pub root: CellId,
    pub cells: Vec<Cell>,
}

/// The transactional graph model.
pub struct GraphModel {
    /// Cell arena. Holds attached cells plus subtrees detached by remove
    /// operations that are still reachable from undo history.
    cells: HashMap<CellId, Cell>,
    root: CellId,
    /// Explicit default-parent override; falls back to the first layer.
    default_parent: Option<CellId>,
    policy: GeometryPolicy,
    update_level: u32,
    current_edit: Vec<ChangeEntry>,
    /// Non-owning back-index: terminal cell id -> edges referencing it.
    /// Covers attached edges only; maintained incrementally.
    edges_by_terminal: HashMap<CellId, HashSet<CellId>>,
    events: EventSource<ModelEvent>,
}

impl Default for GraphModel {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphModel {
    /// Create a model with a root group and one default layer.
    pub fn new() -> Self {
        Self::with_policy(GeometryPolicy::default())
    }

    pub fn with_policy(policy: GeometryPolicy) -> Self {
        let mut root = Cell::group();
        let mut layer = Cell::group();
        let root_id = root.id;
        let layer_id = layer.id;
        root.children.push(layer_id);
        layer.parent = Some(root_id);

        let mut cells = HashMap::new();
        cells.insert(root_id, root);
        cells.insert(layer_id, layer);

        Self {
            cells,
            root: root_id,
            default_parent: None,
            policy,
            update_level: 0,
            current_edit: Vec::new(),
            edges_by_terminal: HashMap::new(),
            events: EventSource::new(),
        }
    }

    // ----- queries ---------------------------------------------------------

    pub fn root(&self) -> CellId {
        self.root
    }

    /// The parent used when `add` is called without one: the explicit
    /// override if it is still attached, else the first child of the root.
    pub fn default_parent(&self) -> CellId {
        self.default_parent
            .filter(|id| self.contains(*id))
            .or_else(|| {
                self.cells
                    .get(&self.root)
                    .and_then(|r| r.children.first().copied())
            })
            .unwrap_or(self.root)
    }

    pub fn set_default_parent(&mut self, parent: Option<CellId>) {
        self.default_parent = parent;
    }

    /// Look up a cell by id. Also finds detached cells held for undo.
    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(&id)
    }

    /// True if the cell is attached: reachable from the root by parents.
    pub fn contains(&self, id: CellId) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            if c == self.root {
                return true;
            }
            current = self.cells.get(&c).and_then(|cell| cell.parent);
        }
        false
    }

    /// True if `ancestor` is `cell` or one of its ancestors.
    pub fn is_ancestor(&self, ancestor: CellId, cell: CellId) -> bool {
        let mut current = Some(cell);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.cells.get(&c).and_then(|cell| cell.parent);
        }
        false
    }

    pub fn parent(&self, id: CellId) -> Option<CellId> {
        self.cells.get(&id).and_then(|c| c.parent)
    }

    pub fn children(&self, id: CellId) -> &[CellId] {
        self.cells.get(&id).map(|c| c.children.as_slice()).unwrap_or(&[])
    }

    /// Position of a cell in its parent's child list.
    pub fn child_slot(&self, id: CellId) -> Option<ChildSlot> {
        let parent = self.parent(id)?;
        let index = self
            .cells
            .get(&parent)?
            .children
            .iter()
            .position(|&c| c == id)?;
        Some((parent, index))
    }

    /// Pre-order subtree ids, including `cell` itself.
    pub fn descendant_ids(&self, cell: CellId) -> Vec<CellId> {
        let mut out = Vec::new();
        let mut stack = vec![cell];
        while let Some(id) = stack.pop() {
            if let Some(c) = self.cells.get(&id) {
                out.push(id);
                for &child in c.children.iter().rev() {
                    stack.push(child);
                }
            }
        }
        out
    }

    /// Attached edges whose source or target is the given cell.
    pub fn edges_with_terminal(&self, id: CellId) -> impl Iterator<Item = CellId> + '_ {
        self.edges_by_terminal
            .get(&id)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Pre-order walk of the attached tree.
    pub fn pre_order(&self) -> PreOrder<'_> {
        PreOrder {
            model: self,
            stack: vec![self.root],
        }
    }

    pub fn events(&self) -> &EventSource<ModelEvent> {
        &self.events
    }

    // ----- transactions ----------------------------------------------------

    /// Open a transaction level. Pairs with [`GraphModel::end_update`] and
    /// may nest; only the outermost pair commits.
    pub fn begin_update(&mut self) {
        self.update_level += 1;
        self.events
            .fire(&ModelEvent::BeginUpdate { level: self.update_level });
    }

    /// Close one transaction level. At the outermost level, flushes the
    /// change log: fires a single `Change` event with every entry and
    /// returns them wrapped as an [`UndoableEdit`] for history recording.
    /// Inner levels, and outermost levels with an empty log, return `None`.
    pub fn end_update(&mut self) -> Option<UndoableEdit> {
        if self.update_level == 0 {
            log::warn!("end_update without matching begin_update");
            return None;
        }
        self.update_level -= 1;
        self.events
            .fire(&ModelEvent::EndUpdate { level: self.update_level });
        if self.update_level == 0 && !self.current_edit.is_empty() {
            let entries = std::mem::take(&mut self.current_edit);
            log::debug!("committing transaction with {} change(s)", entries.len());
            self.events.fire(&ModelEvent::Change {
                entries: entries.clone(),
            });
            Some(UndoableEdit::new(entries))
        } else {
            None
        }
    }

    /// Current transaction nesting depth.
    pub fn update_level(&self) -> u32 {
        self.update_level
    }

    fn execute(&mut self, entry: ChangeEntry) {
        entry.apply(self);
        self.events.fire(&ModelEvent::Execute {
            entry: entry.clone(),
        });
        self.current_edit.push(entry);
    }

    // ----- mutations -------------------------------------------------------

    /// Insert a new cell under `parent` (default parent when `None`) at
    /// `index` (append when `None`). Preset edge terminals must already be
    /// in the model.
    pub fn add(
        &mut self,
        parent: Option<CellId>,
        mut cell: Cell,
        index: Option<usize>,
    ) -> ModelResult<CellId> {
        let parent = parent.unwrap_or_else(|| self.default_parent());
        self.require_attached(parent)?;
        let id = cell.id;
        if self.cells.contains_key(&id) {
            return Err(ModelError::DuplicateCell(id));
        }
        if let Some(geo) = cell.geometry.take() {
            cell.geometry = Some(self.checked_geometry(geo)?);
        }
        for terminal in [cell.source, cell.target].into_iter().flatten() {
            self.require_attached(terminal)?;
        }
        let index = index.unwrap_or_else(|| self.children(parent).len());

        self.begin_update();
        self.cells.insert(id, cell);
        self.execute(ChangeEntry::Child {
            cell: id,
            from: None,
            to: Some((parent, index)),
        });
        self.end_update();
        Ok(id)
    }

    /// Move an attached cell (with its subtree) to a new parent and index.
    pub fn reparent(
        &mut self,
        cell: CellId,
        parent: CellId,
        index: Option<usize>,
    ) -> ModelResult<()> {
        self.require_attached(cell)?;
        self.require_attached(parent)?;
        if self.is_ancestor(cell, parent) {
            return Err(ModelError::WouldCycle { cell, parent });
        }
        let from = self.child_slot(cell);
        let index = index.unwrap_or_else(|| self.children(parent).len());

        self.begin_update();
        self.execute(ChangeEntry::Child {
            cell,
            from,
            to: Some((parent, index)),
        });
        self.end_update();
        Ok(())
    }

    /// Remove a cell and its subtree. Every remaining edge whose source or
    /// target pointed into the removed subtree is left dangling: the
    /// terminal reference is cleared and recorded as its own entry so undo
    /// restores it exactly.
    pub fn remove(&mut self, cell: CellId) -> ModelResult<()> {
        self.require_attached(cell)?;
        if cell == self.root {
            return Err(ModelError::RootRemoval);
        }

        let members = self.descendant_ids(cell);
        let subtree: HashSet<CellId> = members.iter().copied().collect();
        let mut severed: Vec<(CellId, TerminalEnd, CellId)> = Vec::new();
        for &member in &members {
            let Some(edges) = self.edges_by_terminal.get(&member) else {
                continue;
            };
            let mut external: Vec<CellId> = edges
                .iter()
                .copied()
                .filter(|e| !subtree.contains(e))
                .collect();
            external.sort();
            for edge in external {
                let Some(c) = self.cells.get(&edge) else { continue };
                if c.source == Some(member) {
                    severed.push((edge, TerminalEnd::Source, member));
                }
                if c.target == Some(member) {
                    severed.push((edge, TerminalEnd::Target, member));
                }
            }
        }
        let from = self.child_slot(cell);

        self.begin_update();
        for (edge, end, previous) in severed {
            self.execute(ChangeEntry::Terminal {
                edge,
                end,
                previous: Some(previous),
                terminal: None,
            });
        }
        self.execute(ChangeEntry::Child {
            cell,
            from,
            to: None,
        });
        self.end_update();
        Ok(())
    }

    /// Replace a cell's geometry, subject to the configured policy.
    pub fn set_geometry(&mut self, cell: CellId, geometry: Option<Geometry>) -> ModelResult<()> {
        self.require_attached(cell)?;
        let geometry = geometry.map(|g| self.checked_geometry(g)).transpose()?;
        let previous = self.cells.get(&cell).and_then(|c| c.geometry.clone());

        self.begin_update();
        self.execute(ChangeEntry::Geometry {
            cell,
            previous,
            geometry,
        });
        self.end_update();
        Ok(())
    }

    pub fn set_style(&mut self, cell: CellId, style: impl Into<String>) -> ModelResult<()> {
        self.require_attached(cell)?;
        let style = style.into();
        let previous = self
            .cells
            .get(&cell)
            .map(|c| c.style.clone())
            .unwrap_or_default();

        self.begin_update();
        self.execute(ChangeEntry::Style {
            cell,
            previous,
            style,
        });
        self.end_update();
        Ok(())
    }

    pub fn set_value(
        &mut self,
        cell: CellId,
        value: Option<serde_json::Value>,
    ) -> ModelResult<()> {
        self.require_attached(cell)?;
        let previous = self.cells.get(&cell).and_then(|c| c.value.clone());

        self.begin_update();
        self.execute(ChangeEntry::Value {
            cell,
            previous,
            value,
        });
        self.end_update();
        Ok(())
    }

    /// Point one end of an edge at a new terminal (or clear it).
    pub fn set_terminal(
        &mut self,
        edge: CellId,
        end: TerminalEnd,
        terminal: Option<CellId>,
    ) -> ModelResult<()> {
        self.require_attached(edge)?;
        let cell = self.cells.get(&edge).ok_or(ModelError::UnknownCell(edge))?;
        if !cell.is_edge() {
            return Err(ModelError::NotAnEdge(edge));
        }
        let previous = cell.terminal(end.is_source());
        if let Some(t) = terminal {
            self.require_attached(t)?;
        }

        self.begin_update();
        self.execute(ChangeEntry::Terminal {
            edge,
            end,
            previous,
            terminal,
        });
        self.end_update();
        Ok(())
    }

    pub fn set_visible(&mut self, cell: CellId, visible: bool) -> ModelResult<()> {
        self.require_attached(cell)?;
        let previous = self.cells.get(&cell).map(|c| c.visible).unwrap_or(true);

        self.begin_update();
        self.execute(ChangeEntry::Visible {
            cell,
            previous,
            visible,
        });
        self.end_update();
        Ok(())
    }

    pub fn set_collapsed(&mut self, cell: CellId, collapsed: bool) -> ModelResult<()> {
        self.require_attached(cell)?;
        let previous = self.cells.get(&cell).map(|c| c.collapsed).unwrap_or(false);

        self.begin_update();
        self.execute(ChangeEntry::Collapsed {
            cell,
            previous,
            collapsed,
        });
        self.end_update();
        Ok(())
    }

    /// Swap in a new root cell. The previous tree stays in the arena for
    /// undo.
    pub fn set_root(&mut self, cell: Cell) -> ModelResult<CellId> {
        let id = cell.id;
        if self.cells.contains_key(&id) {
            return Err(ModelError::DuplicateCell(id));
        }
        let previous = self.root;
        self.cells.insert(id, cell);

        self.begin_update();
        self.execute(ChangeEntry::Root { previous, root: id });
        self.end_update();
        Ok(id)
    }

    /// Drop arena entries no longer reachable from the attached tree.
    /// Only safe once undo history referencing them has been cleared.
    pub fn prune_detached(&mut self) {
        let attached: HashSet<CellId> = self.pre_order().map(|c| c.id).collect();
        self.cells.retain(|id, _| attached.contains(id));
        self.rebuild_terminal_index();
    }

    // ----- persistence -----------------------------------------------------

    /// Snapshot the attached tree in pre-order.
    pub fn to_document(&self) -> GraphDocument {
        GraphDocument {
            root: self.root,
            cells: self.pre_order().cloned().collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_document())
    }

    /// Rebuild a model from a document snapshot.
    pub fn from_document(doc: GraphDocument) -> ModelResult<Self> {
        let mut cells = HashMap::new();
        for cell in doc.cells {
            cells.insert(cell.id, cell);
        }
        if !cells.contains_key(&doc.root) {
            return Err(ModelError::Serialization(
                "document root is not among its cells".to_string(),
            ));
        }
        let mut model = Self {
            cells,
            root: doc.root,
            default_parent: None,
            policy: GeometryPolicy::default(),
            update_level: 0,
            current_edit: Vec::new(),
            edges_by_terminal: HashMap::new(),
            events: EventSource::new(),
        };
        model.rebuild_terminal_index();
        Ok(model)
    }

    pub fn from_json(json: &str) -> ModelResult<Self> {
        let doc: GraphDocument = serde_json::from_str(json)
            .map_err(|e| ModelError::Serialization(e.to_string()))?;
        Self::from_document(doc)
    }

    // ----- internals -------------------------------------------------------

    fn require_attached(&self, id: CellId) -> ModelResult<()> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(ModelError::UnknownCell(id))
        }
    }

    fn checked_geometry(&self, geometry: Geometry) -> ModelResult<Geometry> {
        if !geometry.has_negative_extent() {
            return Ok(geometry);
        }
        match self.policy {
            GeometryPolicy::Clamp => Ok(geometry.clamped()),
            GeometryPolicy::Reject => Err(ModelError::InvalidGeometry {
                width: geometry.width(),
                height: geometry.height(),
            }),
        }
    }

    /// Detach a cell from its current slot and attach it at `dest`.
    /// The terminal back-index follows the subtree's attachment.
    pub(crate) fn relocate(&mut self, cell: CellId, dest: Option<ChildSlot>) {
        let subtree_edges = self.subtree_edges(cell);
        if self.contains(cell) {
            for &edge in &subtree_edges {
                self.unregister_edge_terminals(edge);
            }
        }
        if let Some(parent) = self.cells.get(&cell).and_then(|c| c.parent) {
            if let Some(pc) = self.cells.get_mut(&parent) {
                pc.children.retain(|&c| c != cell);
            }
        }
        if let Some(c) = self.cells.get_mut(&cell) {
            c.parent = None;
        }
        if let Some((parent, index)) = dest {
            if let Some(pc) = self.cells.get_mut(&parent) {
                let index = index.min(pc.children.len());
                pc.children.insert(index, cell);
            }
            if let Some(c) = self.cells.get_mut(&cell) {
                c.parent = Some(parent);
            }
            if self.contains(cell) {
                for &edge in &subtree_edges {
                    self.register_edge_terminals(edge);
                }
            }
        }
    }

    pub(crate) fn set_terminal_raw(
        &mut self,
        edge: CellId,
        end: TerminalEnd,
        terminal: Option<CellId>,
    ) {
        let attached = self.contains(edge);
        if attached {
            self.unregister_edge_terminals(edge);
        }
        if let Some(c) = self.cells.get_mut(&edge) {
            match end {
                TerminalEnd::Source => c.source = terminal,
                TerminalEnd::Target => c.target = terminal,
            }
        }
        if attached {
            self.register_edge_terminals(edge);
        }
    }

    pub(crate) fn set_geometry_raw(&mut self, cell: CellId, geometry: Option<Geometry>) {
        if let Some(c) = self.cells.get_mut(&cell) {
            c.geometry = geometry;
        }
    }

    pub(crate) fn set_style_raw(&mut self, cell: CellId, style: String) {
        if let Some(c) = self.cells.get_mut(&cell) {
            c.style = style;
        }
    }

    pub(crate) fn set_value_raw(&mut self, cell: CellId, value: Option<serde_json::Value>) {
        if let Some(c) = self.cells.get_mut(&cell) {
            c.value = value;
        }
    }

    pub(crate) fn set_visible_raw(&mut self, cell: CellId, visible: bool) {
        if let Some(c) = self.cells.get_mut(&cell) {
            c.visible = visible;
        }
    }

    pub(crate) fn set_collapsed_raw(&mut self, cell: CellId, collapsed: bool) {
        if let Some(c) = self.cells.get_mut(&cell) {
            c.collapsed = collapsed;
        }
    }

    pub(crate) fn set_root_raw(&mut self, root: CellId) {
        self.root = root;
        self.default_parent = None;
        self.rebuild_terminal_index();
    }

    fn subtree_edges(&self, cell: CellId) -> Vec<CellId> {
        self.descendant_ids(cell)
            .into_iter()
            .filter(|id| self.cells.get(id).is_some_and(|c| c.is_edge()))
            .collect()
    }

    fn register_edge_terminals(&mut self, edge: CellId) {
        let Some(c) = self.cells.get(&edge) else { return };
        for terminal in [c.source, c.target].into_iter().flatten() {
            self.edges_by_terminal
                .entry(terminal)
                .or_default()
                .insert(edge);
        }
    }

    fn unregister_edge_terminals(&mut self, edge: CellId) {
        let Some(c) = self.cells.get(&edge) else { return };
        for terminal in [c.source, c.target].into_iter().flatten() {
            if let Some(set) = self.edges_by_terminal.get_mut(&terminal) {
                set.remove(&edge);
                if set.is_empty() {
                    self.edges_by_terminal.remove(&terminal);
                }
            }
        }
    }

    fn rebuild_terminal_index(&mut self) {
        self.edges_by_terminal.clear();
        let edges: Vec<CellId> = self
            .pre_order()
            .filter(|c| c.is_edge())
            .map(|c| c.id)
            .collect();
        for edge in edges {
            self.register_edge_terminals(edge);
        }
    }
}

impl std::fmt::Debug for GraphModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphModel")
            .field("cells", &self.cells.len())
            .field("root", &self.root)
            .field("update_level", &self.update_level)
            .finish()
    }
}

/// Pre-order iterator over the attached cell tree.
pub struct PreOrder<'a> {
    model: &'a GraphModel,
    stack: Vec<CellId>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a Cell;

    fn next(&mut self) -> Option<&'a Cell> {
        while let Some(id) = self.stack.pop() {
            if let Some(cell) = self.model.cells.get(&id) {
                for &child in cell.children.iter().rev() {
                    self.stack.push(child);
                }
                return Some(cell);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Handled;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn vertex_at(x: f64, y: f64) -> Cell {
        Cell::vertex(Geometry::new(x, y, 80.0, 30.0))
    }

    #[test]
    fn test_new_model_has_root_and_layer() {
        let model = GraphModel::new();
        let root = model.root();
        assert_eq!(model.children(root).len(), 1);
        assert_eq!(model.default_parent(), model.children(root)[0]);
        assert!(model.contains(model.default_parent()));
    }

    #[test]
    fn test_add_vertex_under_default_parent() {
        let mut model = GraphModel::new();
        let id = model.add(None, vertex_at(0.0, 0.0), None).unwrap();
        assert!(model.contains(id));
        assert_eq!(model.parent(id), Some(model.default_parent()));
        assert_eq!(model.child_slot(id), Some((model.default_parent(), 0)));
    }

    #[test]
    fn test_duplicate_add_rejected() {
        let mut model = GraphModel::new();
        let cell = vertex_at(0.0, 0.0);
        let copy = cell.clone();
        model.add(None, cell, None).unwrap();
        assert!(matches!(
            model.add(None, copy, None),
            Err(ModelError::DuplicateCell(_))
        ));
    }

    #[test]
    fn test_implicit_transaction_fires_single_change() {
        let mut model = GraphModel::new();
        let changes = Rc::new(RefCell::new(Vec::new()));
        let changes2 = Rc::clone(&changes);
        model
            .events()
            .add_listener(ModelEventKind::Change, move |event| {
                if let ModelEvent::Change { entries } = event {
                    changes2.borrow_mut().push(entries.len());
                }
                Ok(Handled::Continue)
            });

        model.add(None, vertex_at(0.0, 0.0), None).unwrap();
        assert_eq!(*changes.borrow(), vec![1]);
    }

    #[test]
    fn test_nested_updates_fire_once_at_outermost() {
        let mut model = GraphModel::new();
        let changes = Rc::new(RefCell::new(Vec::new()));
        let changes2 = Rc::clone(&changes);
        model
            .events()
            .add_listener(ModelEventKind::Change, move |event| {
                if let ModelEvent::Change { entries } = event {
                    changes2.borrow_mut().push(entries.len());
                }
                Ok(Handled::Continue)
            });

        model.begin_update();
        let a = model.add(None, vertex_at(0.0, 0.0), None).unwrap();
        model.begin_update();
        model.add(None, vertex_at(200.0, 150.0), None).unwrap();
        assert!(model.end_update().is_none());
        model.set_style(a, "fillColor=#ff0000").unwrap();
        assert!(changes.borrow().is_empty());
        let edit = model.end_update().expect("outermost end commits");

        assert_eq!(*changes.borrow(), vec![3]);
        assert_eq!(edit.entries().len(), 3);
    }

    #[test]
    fn test_execute_fires_per_primitive() {
        let mut model = GraphModel::new();
        let count = Rc::new(std::cell::Cell::new(0));
        let count2 = Rc::clone(&count);
        model
            .events()
            .add_listener(ModelEventKind::Execute, move |_| {
                count2.set(count2.get() + 1);
                Ok(Handled::Continue)
            });

        model.begin_update();
        let a = model.add(None, vertex_at(0.0, 0.0), None).unwrap();
        model.set_visible(a, false).unwrap();
        model.end_update();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_cycle_rejected() {
        let mut model = GraphModel::new();
        let outer = model.add(None, Cell::group(), None).unwrap();
        let inner = model.add(Some(outer), Cell::group(), None).unwrap();
        let leaf = model.add(Some(inner), vertex_at(0.0, 0.0), None).unwrap();

        assert!(matches!(
            model.reparent(outer, inner, None),
            Err(ModelError::WouldCycle { .. })
        ));
        assert!(matches!(
            model.reparent(outer, leaf, None),
            Err(ModelError::WouldCycle { .. })
        ));
        // A rejected mutation leaves no log behind.
        model.begin_update();
        let _ = model.reparent(outer, inner, None);
        assert!(model.end_update().is_none());
    }

    #[test]
    fn test_reparent_records_old_and_new_slot() {
        let mut model = GraphModel::new();
        let p1 = model.add(None, Cell::group(), None).unwrap();
        let p2 = model.add(None, Cell::group(), None).unwrap();
        let a = model.add(Some(p1), vertex_at(0.0, 0.0), None).unwrap();

        model.begin_update();
        model.reparent(a, p2, None).unwrap();
        let edit = model.end_update().unwrap();

        assert_eq!(model.parent(a), Some(p2));
        match &edit.entries()[0] {
            ChangeEntry::Child { from, to, .. } => {
                assert_eq!(*from, Some((p1, 0)));
                assert_eq!(*to, Some((p2, 0)));
            }
            other => panic!("expected child entry, got {other:?}"),
        }
    }

    #[test]
    fn test_geometry_clamp_policy() {
        let mut model = GraphModel::new();
        let a = model.add(None, vertex_at(0.0, 0.0), None).unwrap();
        model
            .set_geometry(a, Some(Geometry::new(10.0, 10.0, -20.0, 30.0)))
            .unwrap();
        let geo = model.cell(a).unwrap().geometry().unwrap();
        assert_eq!(geo.width(), 0.0);
        assert_eq!(geo.height(), 30.0);
    }

    #[test]
    fn test_geometry_reject_policy() {
        let mut model = GraphModel::with_policy(GeometryPolicy::Reject);
        let a = model.add(None, vertex_at(0.0, 0.0), None).unwrap();
        assert!(matches!(
            model.set_geometry(a, Some(Geometry::new(0.0, 0.0, -1.0, 1.0))),
            Err(ModelError::InvalidGeometry { .. })
        ));
        // Unchanged on rejection.
        assert_eq!(model.cell(a).unwrap().geometry().unwrap().width(), 80.0);
    }

    #[test]
    fn test_set_terminal_requires_edge() {
        let mut model = GraphModel::new();
        let a = model.add(None, vertex_at(0.0, 0.0), None).unwrap();
        let b = model.add(None, vertex_at(200.0, 0.0), None).unwrap();
        assert!(matches!(
            model.set_terminal(a, TerminalEnd::Source, Some(b)),
            Err(ModelError::NotAnEdge(_))
        ));
    }

    #[test]
    fn test_terminal_back_index_tracks_changes() {
        let mut model = GraphModel::new();
        let a = model.add(None, vertex_at(0.0, 0.0), None).unwrap();
        let b = model.add(None, vertex_at(200.0, 0.0), None).unwrap();
        let e = model.add(None, Cell::edge().between(a, b), None).unwrap();

        assert_eq!(model.edges_with_terminal(a).collect::<Vec<_>>(), vec![e]);
        model.set_terminal(e, TerminalEnd::Source, None).unwrap();
        assert_eq!(model.edges_with_terminal(a).count(), 0);
        assert_eq!(model.edges_with_terminal(b).collect::<Vec<_>>(), vec![e]);
    }

    #[test]
    fn test_remove_cascade_severs_external_edges() {
        let mut model = GraphModel::new();
        let a = model.add(None, vertex_at(0.0, 0.0), None).unwrap();
        let b = model.add(None, vertex_at(200.0, 0.0), None).unwrap();
        let c = model.add(None, vertex_at(400.0, 0.0), None).unwrap();
        let e1 = model.add(None, Cell::edge().between(a, b), None).unwrap();
        let e2 = model.add(None, Cell::edge().between(b, c), None).unwrap();

        model.begin_update();
        model.remove(b).unwrap();
        let edit = model.end_update().unwrap();

        // One terminal entry per affected edge, plus the child removal.
        let terminal_entries: Vec<_> = edit
            .entries()
            .iter()
            .filter(|e| matches!(e, ChangeEntry::Terminal { .. }))
            .collect();
        assert_eq!(terminal_entries.len(), 2);
        assert_eq!(edit.entries().len(), 3);

        assert!(!model.contains(b));
        assert_eq!(model.cell(e1).unwrap().target(), None);
        assert_eq!(model.cell(e2).unwrap().source(), None);
        // Still connected at the surviving ends.
        assert_eq!(model.cell(e1).unwrap().source(), Some(a));
        assert_eq!(model.cell(e2).unwrap().target(), Some(c));
    }

    #[test]
    fn test_remove_detaches_whole_subtree() {
        let mut model = GraphModel::new();
        let group = model.add(None, Cell::group(), None).unwrap();
        let child = model.add(Some(group), vertex_at(0.0, 0.0), None).unwrap();
        let grandchild = model.add(Some(child), vertex_at(0.0, 0.0), None).unwrap();

        model.remove(group).unwrap();
        assert!(!model.contains(group));
        assert!(!model.contains(child));
        assert!(!model.contains(grandchild));
        // Held in the arena for undo.
        assert!(model.cell(grandchild).is_some());
    }

    #[test]
    fn test_root_cannot_be_removed() {
        let mut model = GraphModel::new();
        let root = model.root();
        assert!(matches!(model.remove(root), Err(ModelError::RootRemoval)));
    }

    #[test]
    fn test_pre_order_walk() {
        let mut model = GraphModel::new();
        let g = model.add(None, Cell::group(), None).unwrap();
        let a = model.add(Some(g), vertex_at(0.0, 0.0), None).unwrap();
        let b = model.add(Some(g), vertex_at(100.0, 0.0), None).unwrap();
        let c = model.add(None, vertex_at(200.0, 0.0), None).unwrap();

        let order: Vec<CellId> = model.pre_order().map(|cell| cell.id()).collect();
        let layer = model.default_parent();
        assert_eq!(order, vec![model.root(), layer, g, a, b, c]);
    }

    #[test]
    fn test_document_round_trip() {
        let mut model = GraphModel::new();
        let a = model.add(None, vertex_at(0.0, 0.0), None).unwrap();
        let b = model.add(None, vertex_at(200.0, 150.0), None).unwrap();
        model
            .add(None, Cell::edge().between(a, b).with_style("edgeStyle=orthogonal"), None)
            .unwrap();
        model.set_value(a, Some(serde_json::json!("Start"))).unwrap();

        let json = model.to_json().unwrap();
        let restored = GraphModel::from_json(&json).unwrap();
        assert_eq!(model.to_document().cells, restored.to_document().cells);
        // The back-index is rebuilt on load.
        assert_eq!(restored.edges_with_terminal(a).count(), 1);
    }

    #[test]
    fn test_prune_detached() {
        let mut model = GraphModel::new();
        let a = model.add(None, vertex_at(0.0, 0.0), None).unwrap();
        model.remove(a).unwrap();
        assert!(model.cell(a).is_some());
        model.prune_detached();
        assert!(model.cell(a).is_none());
    }
}
