//! GraphInk Core Library
//!
//! Transactional graph model, change-log undo, and incremental view
//! state derivation for the GraphInk diagram editor. Rendering, platform
//! event normalization, and persistence formats live behind the narrow
//! interfaces exposed here.

pub mod cell;
pub mod change;
pub mod error;
pub mod event;
pub mod geometry;
pub mod graph;
pub mod input;
pub mod interaction;
pub mod model;
pub mod routing;
pub mod selection;
pub mod style;
pub mod undo;
pub mod view;

pub use cell::{Cell, CellId, CellKind};
pub use change::{ChangeEntry, TerminalEnd};
pub use error::{ModelError, ModelResult};
pub use event::{Dispatch, Event, EventSource, Handled, ListenerId};
pub use geometry::{Geometry, GeometryPolicy};
pub use graph::{Graph, GraphConfig, GraphEvent, GraphEventKind};
pub use input::{InputState, KeyEvent, Modifiers, MouseButton, PointerEvent};
pub use interaction::{GestureHandler, GestureOutcome, GesturePreview};
pub use model::{GraphDocument, GraphModel, ModelEvent, ModelEventKind};
pub use routing::{DirectRouter, EdgeRouter, OrthogonalRouter, RouterRegistry};
pub use selection::Selection;
pub use style::{ResolvedStyle, RgbaColor, StyleMap, StyleResolver, Stylesheet};
pub use undo::{UndoManager, UndoableEdit};
pub use view::{CellState, GraphView, RedrawBatch, ViewEvent, ViewEventKind};
