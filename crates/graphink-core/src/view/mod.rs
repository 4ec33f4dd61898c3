//! Incremental derivation of visual state from the model.
//!
//! The view keeps a cache of [`CellState`] per cell and recomputes only
//! what a committed change invalidated. The flow after each commit is:
//! [`GraphView::invalidate`] walks the change entries and marks affected
//! states, then one [`GraphView::validate`] pass recomputes exactly the
//! marked set and reports a single batched [`RedrawBatch`] for the
//! renderer, never one redraw per entry.

mod state;

pub use state::CellState;

use crate::cell::{CellId, CellKind};
use crate::change::ChangeEntry;
use crate::event::{Event, EventSource};
use crate::model::GraphModel;
use crate::routing::RouterRegistry;
use crate::style::{StyleResolver, Stylesheet};
use kurbo::{Point, Rect, Size, Vec2};
use std::collections::{HashMap, HashSet};

/// Distance tolerance for edge hit-testing, in scene pixels.
pub const EDGE_HIT_TOLERANCE: f64 = 4.0;

/// Events fired by the view.
#[derive(Debug)]
pub enum ViewEvent {
    /// A validate pass completed. One event per pass, regardless of how
    /// many states were recomputed.
    Validate {
        updated: Vec<CellId>,
        removed: Vec<CellId>,
    },
    ScaleChanged { scale: f64 },
    TranslateChanged { translate: Vec2 },
    CurrentRootChanged { root: Option<CellId> },
}

/// Discriminants for [`ViewEvent`] listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewEventKind {
    Validate,
    ScaleChanged,
    TranslateChanged,
    CurrentRootChanged,
}

impl Event for ViewEvent {
    type Kind = ViewEventKind;

    fn kind(&self) -> ViewEventKind {
        match self {
            ViewEvent::Validate { .. } => ViewEventKind::Validate,
            ViewEvent::ScaleChanged { .. } => ViewEventKind::ScaleChanged,
            ViewEvent::TranslateChanged { .. } => ViewEventKind::TranslateChanged,
            ViewEvent::CurrentRootChanged { .. } => ViewEventKind::CurrentRootChanged,
        }
    }
}

/// The outcome of one validate pass, handed to the renderer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RedrawBatch {
    /// Cells whose state was (re)computed this pass.
    pub updated: Vec<CellId>,
    /// Cells whose state was dropped (hidden, collapsed away, removed).
    pub removed: Vec<CellId>,
}

impl RedrawBatch {
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.removed.is_empty()
    }

    /// Fold another batch into this one.
    pub fn merge(&mut self, other: RedrawBatch) {
        self.updated.extend(other.updated);
        self.removed.extend(other.removed);
    }
}

/// Derives and caches [`CellState`] for the visible cell set.
pub struct GraphView {
    states: HashMap<CellId, CellState>,
    invalid: HashSet<CellId>,
    scale: f64,
    translate: Vec2,
    /// Drill-down root; `None` means the model root.
    current_root: Option<CellId>,
    resolver: Box<dyn StyleResolver>,
    routers: RouterRegistry,
    events: EventSource<ViewEvent>,
}

impl Default for GraphView {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphView {
    /// Create a view with the default stylesheet and routers.
    pub fn new() -> Self {
        Self::with_parts(Box::new(Stylesheet::new()), RouterRegistry::new())
    }

    /// Create a view with an injected style resolver and router set.
    pub fn with_parts(resolver: Box<dyn StyleResolver>, routers: RouterRegistry) -> Self {
        Self {
            states: HashMap::new(),
            invalid: HashSet::new(),
            scale: 1.0,
            translate: Vec2::ZERO,
            current_root: None,
            resolver,
            routers,
            events: EventSource::new(),
        }
    }

    pub fn events(&self) -> &EventSource<ViewEvent> {
        &self.events
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Change the zoom factor. Every cached state depends on it.
    pub fn set_scale(&mut self, scale: f64) {
        if scale != self.scale {
            self.scale = scale;
            self.invalidate_all();
            self.events.fire(&ViewEvent::ScaleChanged { scale });
        }
    }

    pub fn translate(&self) -> Vec2 {
        self.translate
    }

    pub fn set_translate(&mut self, translate: Vec2) {
        if translate != self.translate {
            self.translate = translate;
            self.invalidate_all();
            self.events.fire(&ViewEvent::TranslateChanged { translate });
        }
    }

    pub fn current_root(&self) -> Option<CellId> {
        self.current_root
    }

    /// Drill into (or out of) a subtree. Clears the whole cache.
    pub fn set_current_root(&mut self, root: Option<CellId>) {
        if root != self.current_root {
            self.current_root = root;
            self.states.clear();
            self.invalid.clear();
            self.events.fire(&ViewEvent::CurrentRootChanged { root });
        }
    }

    pub fn routers_mut(&mut self) -> &mut RouterRegistry {
        &mut self.routers
    }

    /// Cached state lookup; never computes.
    pub fn state(&self, cell: CellId) -> Option<&CellState> {
        self.states.get(&cell)
    }

    /// All cached states.
    pub fn states(&self) -> impl Iterator<Item = &CellState> {
        self.states.values()
    }

    /// State lookup that computes on demand if the cached state is absent
    /// or invalid. Returns `None` for cells that are not displayable,
    /// even while a stale cached state awaits the next validate sweep.
    pub fn resolve(&mut self, model: &GraphModel, cell: CellId) -> Option<&CellState> {
        let mut visited = HashSet::new();
        let mut updated = Vec::new();
        let mut computing = HashSet::new();
        self.ensure_state(model, cell, &mut visited, &mut updated, &mut computing)?;
        self.states.get(&cell)
    }

    pub fn is_invalid(&self, cell: CellId) -> bool {
        self.invalid.contains(&cell)
    }

    // ----- invalidation ----------------------------------------------------

    /// Mark every state affected by a committed change list.
    ///
    /// Structural and geometric changes invalidate the whole subtree (the
    /// descendants' absolute positions depend on the ancestor) plus every
    /// edge connected to it. A terminal change conservatively invalidates
    /// every edge referencing either the old or the new terminal, not
    /// just the changed edge. Correctness over precision.
    pub fn invalidate(&mut self, model: &GraphModel, entries: &[ChangeEntry]) {
        for entry in entries {
            match entry {
                ChangeEntry::Child { cell, .. }
                | ChangeEntry::Geometry { cell, .. }
                | ChangeEntry::Visible { cell, .. }
                | ChangeEntry::Collapsed { cell, .. } => {
                    self.invalidate_subtree(model, *cell);
                }
                ChangeEntry::Terminal {
                    edge,
                    previous,
                    terminal,
                    ..
                } => {
                    self.invalid.insert(*edge);
                    for t in [previous, terminal].into_iter().flatten() {
                        let edges: Vec<CellId> = model.edges_with_terminal(*t).collect();
                        self.invalid.extend(edges);
                    }
                }
                ChangeEntry::Style { cell, .. } | ChangeEntry::Value { cell, .. } => {
                    self.invalid.insert(*cell);
                }
                ChangeEntry::Root { .. } => {
                    self.states.clear();
                    self.invalid.clear();
                }
            }
        }
    }

    /// Mark one cell, its descendants, and transitively every edge
    /// connected to any of them.
    pub fn invalidate_subtree(&mut self, model: &GraphModel, cell: CellId) {
        let mut stack = vec![cell];
        let mut seen = HashSet::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            self.invalid.insert(id);
            stack.extend(model.children(id).iter().copied());
            stack.extend(model.edges_with_terminal(id));
        }
    }

    /// Mark every cached state invalid (scale or translate changed).
    pub fn invalidate_all(&mut self) {
        self.invalid.extend(self.states.keys().copied());
    }

    // ----- validation ------------------------------------------------------

    /// Depth-first pass recomputing every marked state under the current
    /// root. Terminals are resolved before their edges, including
    /// terminals outside the traversed subtree. Fires one aggregate
    /// `Validate` event and returns the batch for the renderer.
    pub fn validate(&mut self, model: &GraphModel) -> RedrawBatch {
        let root = self.current_root.unwrap_or_else(|| model.root());
        let mut visited = HashSet::new();
        let mut updated = Vec::new();
        let mut computing = HashSet::new();

        // The traversal root itself gets no state; its children do.
        let children: Vec<CellId> = model.children(root).to_vec();
        for child in children {
            self.validate_tree(model, child, &mut visited, &mut updated, &mut computing);
        }

        let removed: Vec<CellId> = self
            .states
            .keys()
            .copied()
            .filter(|id| !visited.contains(id))
            .collect();
        for id in &removed {
            self.states.remove(id);
        }
        self.invalid.clear();

        log::debug!(
            "validate pass: {} updated, {} removed",
            updated.len(),
            removed.len()
        );
        let batch = RedrawBatch { updated, removed };
        self.events.fire(&ViewEvent::Validate {
            updated: batch.updated.clone(),
            removed: batch.removed.clone(),
        });
        batch
    }

    fn validate_tree(
        &mut self,
        model: &GraphModel,
        id: CellId,
        visited: &mut HashSet<CellId>,
        updated: &mut Vec<CellId>,
        computing: &mut HashSet<CellId>,
    ) {
        let Some(cell) = model.cell(id) else { return };
        if !cell.is_visible() {
            return;
        }
        self.ensure_state(model, id, visited, updated, computing);
        if !cell.is_collapsed() {
            for &child in cell.children() {
                self.validate_tree(model, child, visited, updated, computing);
            }
        }
    }

    /// Return the scene bounds of a cell's state, computing it first if
    /// it is missing or marked invalid.
    fn ensure_state(
        &mut self,
        model: &GraphModel,
        id: CellId,
        visited: &mut HashSet<CellId>,
        updated: &mut Vec<CellId>,
        computing: &mut HashSet<CellId>,
    ) -> Option<Rect> {
        if !self.invalid.contains(&id) {
            if let Some(state) = self.states.get(&id) {
                visited.insert(id);
                return Some(state.bounds);
            }
        }
        // Guard against edge-to-edge terminal cycles.
        if !computing.insert(id) {
            return None;
        }
        let state = self.compute_state(model, id, visited, updated, computing);
        computing.remove(&id);

        match state {
            Some(state) => {
                let bounds = state.bounds;
                self.states.insert(id, state);
                self.invalid.remove(&id);
                visited.insert(id);
                updated.push(id);
                Some(bounds)
            }
            // Stale states of no-longer-displayable cells are swept (and
            // reported as removed) at the end of the validate pass.
            None => None,
        }
    }

    fn compute_state(
        &mut self,
        model: &GraphModel,
        id: CellId,
        visited: &mut HashSet<CellId>,
        updated: &mut Vec<CellId>,
        computing: &mut HashSet<CellId>,
    ) -> Option<CellState> {
        let cell = model.cell(id)?;
        if !self.displayable(model, id) {
            return None;
        }
        match cell.kind() {
            CellKind::Vertex | CellKind::Group => {
                let geo = cell.geometry()?;
                let position = world_origin(model, id);
                let bounds = Rect::from_origin_size(
                    self.to_scene(position),
                    Size::new(geo.width() * self.scale, geo.height() * self.scale),
                );
                let style = self.resolver.resolve(cell.kind(), cell.style());
                let label_bounds = cell.value().map(|_| bounds);
                Some(CellState {
                    cell: id,
                    kind: cell.kind(),
                    bounds,
                    absolute_points: Vec::new(),
                    style,
                    label_bounds,
                })
            }
            CellKind::Edge => {
                let (waypoints, fixed_source, fixed_target) = match cell.geometry() {
                    Some(geo) => (
                        geo.points.iter().map(|p| self.to_scene(*p)).collect(),
                        geo.terminal_point(true).map(|p| self.to_scene(p)),
                        geo.terminal_point(false).map(|p| self.to_scene(p)),
                    ),
                    None => (Vec::new(), None, None),
                };
                let waypoints: Vec<Point> = waypoints;

                let source_rect = cell
                    .source()
                    .and_then(|t| self.ensure_state(model, t, visited, updated, computing));
                let target_rect = cell
                    .target()
                    .and_then(|t| self.ensure_state(model, t, visited, updated, computing));

                // Preliminary endpoints used as perimeter references.
                let source_prelim = source_rect.map(|r| r.center()).or(fixed_source)?;
                let target_prelim = target_rect.map(|r| r.center()).or(fixed_target)?;

                let source_ref = waypoints.first().copied().unwrap_or(target_prelim);
                let target_ref = waypoints.last().copied().unwrap_or(source_prelim);

                let source_anchor = match source_rect {
                    Some(rect) => rectangle_perimeter(rect, source_ref),
                    None => source_prelim,
                };
                let target_anchor = match target_rect {
                    Some(rect) => rectangle_perimeter(rect, target_ref),
                    None => target_prelim,
                };

                let style = self.resolver.resolve(cell.kind(), cell.style());
                let points =
                    self.routers
                        .route(style.edge_style(), source_anchor, target_anchor, &waypoints);
                let bounds = points_bounds(&points)?;
                let label_bounds = cell
                    .value()
                    .and_then(|_| polyline_midpoint(&points))
                    .map(|p| Rect::from_center_size(p, Size::ZERO));
                Some(CellState {
                    cell: id,
                    kind: CellKind::Edge,
                    bounds,
                    absolute_points: points,
                    style,
                    label_bounds,
                })
            }
        }
    }

    /// A cell is displayable when it is attached, visible, and no
    /// ancestor is hidden or collapsed.
    fn displayable(&self, model: &GraphModel, id: CellId) -> bool {
        if !model.contains(id) {
            return false;
        }
        let Some(cell) = model.cell(id) else {
            return false;
        };
        if !cell.is_visible() {
            return false;
        }
        let mut current = cell.parent();
        while let Some(p) = current {
            let Some(ancestor) = model.cell(p) else {
                return false;
            };
            if !ancestor.is_visible() || ancestor.is_collapsed() {
                return false;
            }
            current = ancestor.parent();
        }
        true
    }

    /// World (model) coordinates to scene coordinates.
    pub fn to_scene(&self, p: Point) -> Point {
        Point::new(
            (self.translate.x + p.x) * self.scale,
            (self.translate.y + p.y) * self.scale,
        )
    }

    /// Scene coordinates back to world (model) coordinates.
    pub fn to_world(&self, p: Point) -> Point {
        Point::new(
            p.x / self.scale - self.translate.x,
            p.y / self.scale - self.translate.y,
        )
    }

    // ----- hit testing -----------------------------------------------------

    /// Front-most cell whose state is under the given scene point.
    /// Vertices hit inside their bounds; edges within `tolerance` of the
    /// routed polyline.
    pub fn hit_test(&self, model: &GraphModel, point: Point, tolerance: f64) -> Option<CellId> {
        let order: Vec<CellId> = model.pre_order().map(|c| c.id()).collect();
        for id in order.into_iter().rev() {
            let Some(state) = self.states.get(&id) else {
                continue;
            };
            let hit = if state.is_edge() {
                point_to_polyline_dist(point, &state.absolute_points) <= tolerance
            } else {
                state.bounds.inflate(tolerance, tolerance).contains(point)
            };
            if hit {
                return Some(id);
            }
        }
        None
    }
}

impl std::fmt::Debug for GraphView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphView")
            .field("states", &self.states.len())
            .field("invalid", &self.invalid.len())
            .field("scale", &self.scale)
            .field("translate", &self.translate)
            .finish()
    }
}

/// Absolute (unscaled) top-left of a cell, composed from its ancestors.
/// Relative geometry positions the cell at fractions of the parent size.
pub(crate) fn world_origin(model: &GraphModel, id: CellId) -> Point {
    let Some(cell) = model.cell(id) else {
        return Point::ZERO;
    };
    let base = cell
        .parent()
        .map(|p| world_origin(model, p))
        .unwrap_or(Point::ZERO);
    let Some(geo) = cell.geometry() else {
        return base;
    };
    if geo.relative {
        let parent_geo = cell.parent().and_then(|p| model.cell(p)).and_then(|c| c.geometry());
        let (pw, ph) = parent_geo.map(|g| (g.width(), g.height())).unwrap_or((0.0, 0.0));
        let offset = geo.offset.unwrap_or(Vec2::ZERO);
        Point::new(
            base.x + pw * geo.x() + offset.x,
            base.y + ph * geo.y() + offset.y,
        )
    } else {
        Point::new(base.x + geo.x(), base.y + geo.y())
    }
}

/// Intersection of the ray from the rectangle center toward `toward`
/// with the rectangle border. Falls back to the center for degenerate
/// directions.
pub fn rectangle_perimeter(bounds: Rect, toward: Point) -> Point {
    let center = bounds.center();
    let dx = toward.x - center.x;
    let dy = toward.y - center.y;
    if dx.abs() < f64::EPSILON && dy.abs() < f64::EPSILON {
        return center;
    }
    let tx = if dx.abs() < f64::EPSILON {
        f64::INFINITY
    } else {
        (bounds.width() / 2.0) / dx.abs()
    };
    let ty = if dy.abs() < f64::EPSILON {
        f64::INFINITY
    } else {
        (bounds.height() / 2.0) / dy.abs()
    };
    let t = tx.min(ty);
    Point::new(center.x + t * dx, center.y + t * dy)
}

/// Bounding box of a point list.
fn points_bounds(points: &[Point]) -> Option<Rect> {
    let first = points.first()?;
    let mut bounds = Rect::from_points(*first, *first);
    for p in &points[1..] {
        bounds = bounds.union_pt(*p);
    }
    Some(bounds)
}

/// Point at the middle of a polyline's middle segment.
fn polyline_midpoint(points: &[Point]) -> Option<Point> {
    if points.len() < 2 {
        return points.first().copied();
    }
    let mid = points.len() / 2;
    let (a, b) = (points[mid - 1], points[mid]);
    Some(Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0))
}

/// Distance from a point to a line segment (a→b).
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = Vec2::new(b.x - a.x, b.y - a.y);
    let pv = Vec2::new(point.x - a.x, point.y - a.y);
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let proj = Point::new(a.x + t * seg.x, a.y + t * seg.y);
    ((point.x - proj.x).powi(2) + (point.y - proj.y).powi(2)).sqrt()
}

/// Minimum distance from a point to a polyline.
pub fn point_to_polyline_dist(point: Point, points: &[Point]) -> f64 {
    points
        .windows(2)
        .map(|w| point_to_segment_dist(point, w[0], w[1]))
        .fold(f64::INFINITY, f64::min)
}
