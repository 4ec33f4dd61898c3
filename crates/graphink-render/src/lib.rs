//! GraphInk Render Library
//!
//! Renderer abstraction for GraphInk: batched scene updates produced by
//! the core's view layer, the backend trait that consumes them, and a
//! headless recording implementation for tests and tooling.

mod recording;
mod renderer;
mod scene;

pub use recording::{RecordingRenderer, SceneOp};
pub use renderer::{RenderContext, RenderResult, Renderer, RendererError};
pub use scene::{SceneCell, SceneUpdate};
