//! Headless renderer that retains the scene in memory.
//!
//! Used by tests and tooling to observe exactly what a real backend
//! would have been asked to draw.

use crate::renderer::{RenderContext, RenderResult, Renderer};
use crate::scene::{SceneCell, SceneUpdate};
use graphink_core::CellId;
use std::collections::HashMap;

/// One recorded operation, in application order.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneOp {
    Upsert(CellId),
    Remove(CellId),
    Reset,
}

/// A [`Renderer`] that applies updates to an in-memory scene map and
/// records every operation.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    scene: HashMap<CellId, SceneCell>,
    ops: Vec<SceneOp>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The retained scene as last applied.
    pub fn cell(&self, id: CellId) -> Option<&SceneCell> {
        self.scene.get(&id)
    }

    pub fn cell_count(&self) -> usize {
        self.scene.len()
    }

    /// Every operation applied so far.
    pub fn ops(&self) -> &[SceneOp] {
        &self.ops
    }
}

impl Renderer for RecordingRenderer {
    fn apply(&mut self, _context: &RenderContext, update: &SceneUpdate) -> RenderResult<()> {
        for cell in &update.updated {
            self.scene.insert(cell.id, cell.clone());
            self.ops.push(SceneOp::Upsert(cell.id));
        }
        for &id in &update.removed {
            self.scene.remove(&id);
            self.ops.push(SceneOp::Remove(id));
        }
        Ok(())
    }

    fn reset(&mut self) -> RenderResult<()> {
        self.scene.clear();
        self.ops.push(SceneOp::Reset);
        Ok(())
    }
}
