pub mod ambient;
pub mod automation;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod graph;
pub mod recording;
pub mod synth;
pub mod tone;
pub mod tracker;

pub use ambient::{AmbientLayer, PitchWobble, AMBIENT_LAYERS};
pub use automation::{Automation, ParamEvent};
pub use catalog::{Effect, UnknownEffect};
pub use config::EngineConfig;
pub use engine::SoundEngine;
pub use error::GraphError;
pub use graph::{AudioGraph, ContextState, FilterKind, Param, ResumeFuture, Waveform};
pub use recording::RecordingGraph;
pub use tone::{NoiseSpec, SweepSpec, ToneSpec, Voice};
pub use tracker::{ResourceTracker, Teardown};
