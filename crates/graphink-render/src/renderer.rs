//! Renderer trait abstraction.

use crate::scene::SceneUpdate;
use kurbo::Size;
use peniko::Color;
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Initialization failed: {0}")]
    InitFailed(String),
    #[error("Render failed: {0}")]
    RenderFailed(String),
    #[error("Surface error: {0}")]
    Surface(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// Context for applying scene updates.
pub struct RenderContext {
    /// Viewport size in physical pixels.
    pub viewport_size: Size,
    /// Device pixel ratio (for HiDPI).
    pub scale_factor: f64,
    /// Background color.
    pub background_color: Color,
}

impl RenderContext {
    pub fn new(viewport_size: Size) -> Self {
        Self {
            viewport_size,
            scale_factor: 1.0,
            background_color: Color::from_rgba8(250, 250, 250, 255),
        }
    }

    /// Set the scale factor for HiDPI.
    pub fn with_scale_factor(mut self, scale_factor: f64) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    /// Set the background color.
    pub fn with_background(mut self, color: Color) -> Self {
        self.background_color = color;
        self
    }
}

/// A drawing backend consuming batched scene updates.
///
/// The view layer produces one [`SceneUpdate`] per committed transaction
/// (or view change); implementations keep whatever retained scene
/// structure they need and redraw from it.
pub trait Renderer {
    /// Apply one batched update: upsert every cell in `updated`, drop
    /// every cell in `removed`.
    fn apply(&mut self, context: &RenderContext, update: &SceneUpdate) -> RenderResult<()>;

    /// Drop the whole retained scene.
    fn reset(&mut self) -> RenderResult<()>;
}
