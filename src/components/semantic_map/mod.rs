mod component;
mod engine;
mod render;
mod state;

pub use component::SemanticMapCanvas;
pub use engine::{CanvasEngine, CanvasEngineFactory, SharedView, ViewRegistry};
