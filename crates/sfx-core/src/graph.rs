//! The seam between the engine and a platform audio API.
//!
//! The engine never renders samples itself. It creates nodes, wires them,
//! installs parameter automation with absolute target times, and tells
//! sources when to start and stop. A backend (WebAudio in the browser, a
//! software renderer on desktop, an in-memory recorder in tests) turns that
//! description into sound on its own real-time path.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::automation::ParamEvent;
use crate::error::GraphError;

/// Basic oscillator shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

/// Biquad response used by filter nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterKind {
    Lowpass,
    Highpass,
    Bandpass,
}

/// Automatable node inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Param {
    /// Gain node multiplier.
    Gain,
    /// Oscillator pitch or filter cutoff/centre, in Hz.
    Frequency,
    /// Filter resonance.
    Q,
    /// Delay line length, in seconds.
    DelayTime,
    /// Constant-source output value.
    Offset,
}

/// Run state of the underlying audio context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextState {
    /// Acquired but not rendering, typically until a user gesture.
    Suspended,
    Running,
    Closed,
}

/// Completion of a [`AudioGraph::resume`] request.
pub type ResumeFuture = Pin<Box<dyn Future<Output = Result<(), GraphError>>>>;

/// A platform audio graph.
///
/// All methods are called from a single control thread. Times are absolute
/// values on the graph's own clock ([`current_time`](Self::current_time)),
/// so anything scheduled in one burst keeps its relative offsets no matter
/// how long the caller takes to issue it.
pub trait AudioGraph {
    /// Handle to a node owned by this graph.
    type Node: Clone + fmt::Debug;

    /// Acquire the platform's real-time output.
    fn acquire() -> Result<Self, GraphError>
    where
        Self: Sized;

    fn state(&self) -> ContextState;

    /// Ask a suspended context to start rendering. The returned future
    /// resolves when the platform has complied, which may be much later.
    fn resume(&mut self) -> ResumeFuture;

    /// Graph clock in seconds.
    fn current_time(&self) -> f64;

    fn sample_rate(&self) -> f32;

    /// The physical output.
    fn destination(&self) -> Self::Node;

    fn create_oscillator(
        &mut self,
        waveform: Waveform,
        frequency: f32,
    ) -> Result<Self::Node, GraphError>;

    /// One-shot buffer source playing `samples` once at the graph's sample rate.
    fn create_noise(&mut self, samples: &[f32]) -> Result<Self::Node, GraphError>;

    fn create_constant(&mut self, offset: f32) -> Result<Self::Node, GraphError>;

    fn create_gain(&mut self, gain: f32) -> Result<Self::Node, GraphError>;

    fn create_filter(
        &mut self,
        kind: FilterKind,
        frequency: f32,
        q: f32,
    ) -> Result<Self::Node, GraphError>;

    fn create_delay(&mut self, max_delay: f64, delay: f64) -> Result<Self::Node, GraphError>;

    /// Route `from`'s output into `to`'s input.
    fn connect(&mut self, from: &Self::Node, to: &Self::Node) -> Result<(), GraphError>;

    /// Route `from`'s output into a parameter of `to`, summed with the
    /// parameter's own value.
    fn connect_param(
        &mut self,
        from: &Self::Node,
        to: &Self::Node,
        param: Param,
    ) -> Result<(), GraphError>;

    /// Set a parameter's intrinsic value immediately.
    fn set_param(&mut self, node: &Self::Node, param: Param, value: f32)
        -> Result<(), GraphError>;

    /// Read a parameter's intrinsic value at the current time.
    fn param_value(&self, node: &Self::Node, param: Param) -> Result<f32, GraphError>;

    /// Append an automation event to a parameter's timeline.
    fn schedule(
        &mut self,
        node: &Self::Node,
        param: Param,
        event: ParamEvent,
    ) -> Result<(), GraphError>;

    fn start(&mut self, node: &Self::Node, when: f64) -> Result<(), GraphError>;

    /// Stop a source at `when`. Stopping twice yields
    /// [`GraphError::AlreadyReleased`].
    fn stop(&mut self, node: &Self::Node, when: f64) -> Result<(), GraphError>;

    /// Remove every outgoing connection of `node`. Disconnecting twice
    /// yields [`GraphError::AlreadyReleased`].
    fn disconnect(&mut self, node: &Self::Node) -> Result<(), GraphError>;

    /// Hint that a one-shot node is no longer needed after `when`.
    ///
    /// Garbage-collected platforms ignore this.
    fn schedule_release(&mut self, _node: &Self::Node, _when: f64) {}
}
