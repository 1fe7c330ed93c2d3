//! Desktop backend: a software renderer for the engine's node graph, fed to
//! the default output device through cpal.

pub mod dsp;
pub mod graph;
pub mod render;

pub use graph::NativeGraph;
pub use render::Renderer;
