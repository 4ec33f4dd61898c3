//! Interactive gesture previews.
//!
//! A gesture (move, resize, connect, rubber-band) previews its effect
//! while the pointer is down without touching the transactional log.
//! Completing the gesture commits one real transaction through the
//! [`Graph`] facade; cancelling (an explicit abort or loss of pointer
//! capture) drops the preview and leaves the model and history untouched.
//! Positions are scene coordinates throughout.

use crate::cell::CellId;
use crate::error::ModelResult;
use crate::graph::Graph;
use kurbo::{Point, Rect, Vec2};

/// Preview state for the gesture in progress. The renderer draws this as
/// an overlay; none of it is model state.
#[derive(Debug, Clone, PartialEq)]
pub enum GesturePreview {
    /// Cells dragged by a scene-coordinate delta.
    Move { cells: Vec<CellId>, delta: Vec2 },
    /// A cell resized toward the pointer, anchored at the opposite corner.
    Resize { cell: CellId, anchor: Point, rect: Rect },
    /// An edge being drawn from a source cell.
    Connect {
        source: CellId,
        current: Point,
        target: Option<CellId>,
    },
    /// Rubber-band selection rectangle.
    RubberBand { rect: Rect },
}

/// What a completed gesture did.
#[derive(Debug, Clone, PartialEq)]
pub enum GestureOutcome {
    /// Nothing was active, or the gesture resolved to a no-op (e.g. a
    /// connect released over empty space).
    None,
    Moved(Vec<CellId>),
    Resized(CellId),
    /// The new edge.
    Connected(CellId),
    Selected(Vec<CellId>),
}

#[derive(Debug, Clone, Default, PartialEq)]
enum GestureState {
    #[default]
    Idle,
    Active {
        start: Point,
        preview: GesturePreview,
    },
}

/// Drives one pointer gesture at a time.
#[derive(Debug, Clone, Default)]
pub struct GestureHandler {
    state: GestureState,
}

impl GestureHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state, GestureState::Idle)
    }

    /// The preview to draw as an overlay, if a gesture is in progress.
    pub fn preview(&self) -> Option<&GesturePreview> {
        match &self.state {
            GestureState::Idle => None,
            GestureState::Active { preview, .. } => Some(preview),
        }
    }

    pub fn begin_move(&mut self, start: Point, cells: Vec<CellId>) {
        self.state = GestureState::Active {
            start,
            preview: GesturePreview::Move {
                cells,
                delta: Vec2::ZERO,
            },
        };
    }

    /// `anchor` is the corner that stays fixed while the pointer drags
    /// the opposite one.
    pub fn begin_resize(&mut self, start: Point, cell: CellId, anchor: Point) {
        self.state = GestureState::Active {
            start,
            preview: GesturePreview::Resize {
                cell,
                anchor,
                rect: Rect::from_points(anchor, start),
            },
        };
    }

    pub fn begin_connect(&mut self, start: Point, source: CellId) {
        self.state = GestureState::Active {
            start,
            preview: GesturePreview::Connect {
                source,
                current: start,
                target: None,
            },
        };
    }

    pub fn begin_rubber_band(&mut self, start: Point) {
        self.state = GestureState::Active {
            start,
            preview: GesturePreview::RubberBand {
                rect: Rect::from_points(start, start),
            },
        };
    }

    /// Track the pointer. For a connect gesture the prospective target is
    /// re-hit-tested against the graph.
    pub fn update(&mut self, graph: &Graph, current: Point) {
        let GestureState::Active { start, preview } = &mut self.state else {
            return;
        };
        match preview {
            GesturePreview::Move { delta, .. } => {
                *delta = current - *start;
            }
            GesturePreview::Resize { anchor, rect, .. } => {
                *rect = Rect::from_points(*anchor, current);
            }
            GesturePreview::Connect {
                source,
                current: pos,
                target,
            } => {
                *pos = current;
                *target = graph
                    .hit_test(current, 0.0)
                    .filter(|t| t != source)
                    .filter(|t| {
                        graph
                            .model()
                            .cell(*t)
                            .is_some_and(|c| c.is_connectable())
                    });
            }
            GesturePreview::RubberBand { rect } => {
                *rect = Rect::from_points(*start, current);
            }
        }
    }

    /// Abort the gesture. No change entry was or will be emitted.
    /// Returns true if a gesture was active.
    pub fn cancel(&mut self) -> bool {
        let was_active = self.is_active();
        self.state = GestureState::Idle;
        was_active
    }

    /// Commit the gesture as a single transaction and return what
    /// happened. The handler is idle afterwards whether or not the
    /// commit succeeded.
    pub fn complete(&mut self, graph: &mut Graph) -> ModelResult<GestureOutcome> {
        let state = std::mem::take(&mut self.state);
        let GestureState::Active { preview, .. } = state else {
            return Ok(GestureOutcome::None);
        };
        match preview {
            GesturePreview::Move { cells, delta } => {
                let scale = graph.view().scale();
                let world_delta = Vec2::new(delta.x / scale, delta.y / scale);
                graph.move_cells(&cells, world_delta)?;
                Ok(GestureOutcome::Moved(cells))
            }
            GesturePreview::Resize { cell, rect, .. } => {
                let world = Rect::from_points(
                    graph.view().to_world(Point::new(rect.x0, rect.y0)),
                    graph.view().to_world(Point::new(rect.x1, rect.y1)),
                );
                graph.resize_cell(cell, world)?;
                Ok(GestureOutcome::Resized(cell))
            }
            GesturePreview::Connect { source, target, .. } => match target {
                Some(target) => {
                    let edge = graph.insert_edge(None, source, target, None, None)?;
                    Ok(GestureOutcome::Connected(edge))
                }
                None => Ok(GestureOutcome::None),
            },
            GesturePreview::RubberBand { rect } => {
                let cells = graph.cells_in_rect(rect);
                graph.set_selection(cells.clone());
                Ok(GestureOutcome::Selected(cells))
            }
        }
    }
}
