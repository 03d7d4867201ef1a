//! Rendering module
//!
//! 2D drawing through the [`Canvas`] abstraction, driven by the [`Renderer`]
//! system.

mod canvas;
mod system;

pub use canvas::{Canvas, CommandBuffer, DrawCommand, PathSegment, PathStyle};
pub use system::Renderer;
