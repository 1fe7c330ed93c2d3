//! In-memory [`AudioGraph`] that records what the engine asks for.
//!
//! Nothing is rendered. The clock only moves when [`RecordingGraph::advance`]
//! is called, and sources whose stop time has passed are reclaimed the way a
//! real platform would. Used as the headless backend and in tests.

use std::future;

use fnv::FnvHashMap;

use crate::automation::{Automation, ParamEvent};
use crate::error::GraphError;
use crate::graph::{AudioGraph, ContextState, FilterKind, Param, ResumeFuture, Waveform};

/// Opaque handle to a recorded node (0 = destination).
pub type NodeId = u32;

pub const DEFAULT_SAMPLE_RATE: f32 = 44_100.0;

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Destination,
    Oscillator(Waveform),
    Noise { samples: usize },
    Constant,
    Gain,
    Filter(FilterKind),
    Delay { max_delay: f64 },
}

impl NodeKind {
    pub fn is_source(&self) -> bool {
        matches!(
            self,
            NodeKind::Oscillator(_) | NodeKind::Noise { .. } | NodeKind::Constant
        )
    }
}

#[derive(Clone, Debug)]
pub struct RecordedNode {
    pub kind: NodeKind,
    pub created_at: f64,
    pub params: FnvHashMap<Param, Automation>,
    pub outputs: Vec<NodeId>,
    pub param_outputs: Vec<(NodeId, Param)>,
    pub start: Option<f64>,
    pub stop: Option<f64>,
    pub release_at: Option<f64>,
    /// Stopped or reclaimed; no longer producing sound.
    pub released: bool,
    pub disconnected: bool,
}

impl RecordedNode {
    fn new(kind: NodeKind, created_at: f64, params: &[(Param, f32)]) -> Self {
        Self {
            kind,
            created_at,
            params: params
                .iter()
                .map(|&(p, v)| (p, Automation::new(v)))
                .collect(),
            outputs: Vec::new(),
            param_outputs: Vec::new(),
            start: None,
            stop: None,
            release_at: None,
            released: false,
            disconnected: false,
        }
    }

    /// Intrinsic value of `param` when the node was created.
    pub fn initial(&self, param: Param) -> Option<f32> {
        self.params.get(&param).map(|a| a.value_at(self.created_at))
    }
}

/// Node ids index straight into the node table, so reclaimed nodes are only
/// flagged and never removed: the table grows by every node ever created.
/// Fine for tests and short headless sessions; a long-running host should
/// render through a real backend instead.
pub struct RecordingGraph {
    nodes: Vec<RecordedNode>,
    now: f64,
    sample_rate: f32,
    state: ContextState,
}

impl Default for RecordingGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingGraph {
    /// A running graph at time zero.
    pub fn new() -> Self {
        Self {
            nodes: vec![RecordedNode::new(NodeKind::Destination, 0.0, &[])],
            now: 0.0,
            sample_rate: DEFAULT_SAMPLE_RATE,
            state: ContextState::Running,
        }
    }

    /// A graph that, like a browser context created before any user
    /// gesture, does not advance until resumed.
    pub fn suspended() -> Self {
        Self {
            state: ContextState::Suspended,
            ..Self::new()
        }
    }

    /// Move the clock forward and reclaim everything that has finished.
    pub fn advance(&mut self, seconds: f64) {
        if self.state != ContextState::Running {
            return;
        }
        self.now += seconds.max(0.0);
        let now = self.now;
        for node in &mut self.nodes {
            if node.released {
                continue;
            }
            let ended = node.stop.is_some_and(|t| t <= now);
            let expired = node.release_at.is_some_and(|t| t <= now);
            if ended || expired {
                Self::reclaim(node);
            }
        }
    }

    /// Drop a node as the platform would after it finished, regardless of
    /// what the engine still believes about it.
    pub fn release(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(id as usize) {
            Self::reclaim(node);
        }
    }

    pub fn close(&mut self) {
        self.state = ContextState::Closed;
    }

    pub fn node(&self, id: NodeId) -> Option<&RecordedNode> {
        self.nodes.get(id as usize)
    }

    /// All nodes ever created, destination included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &RecordedNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (i as NodeId, n))
    }

    pub fn oscillators(&self) -> Vec<(NodeId, &RecordedNode)> {
        self.nodes()
            .filter(|(_, n)| matches!(n.kind, NodeKind::Oscillator(_)))
            .collect()
    }

    pub fn noise_sources(&self) -> Vec<(NodeId, &RecordedNode)> {
        self.nodes()
            .filter(|(_, n)| matches!(n.kind, NodeKind::Noise { .. }))
            .collect()
    }

    /// Sources that are still able to make sound.
    pub fn live_sources(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.kind.is_source() && !n.released)
            .count()
    }

    fn reclaim(node: &mut RecordedNode) {
        node.released = true;
        node.disconnected = true;
        node.outputs.clear();
        node.param_outputs.clear();
    }

    fn add(&mut self, kind: NodeKind, params: &[(Param, f32)]) -> Result<NodeId, GraphError> {
        if self.state == ContextState::Closed {
            return Err(GraphError::InvalidState("context closed"));
        }
        if let Some(&(param, value)) = params.iter().find(|(_, v)| !v.is_finite()) {
            return Err(GraphError::InvalidParam { param, value });
        }
        let id = self.nodes.len() as NodeId;
        self.nodes.push(RecordedNode::new(kind, self.now, params));
        Ok(id)
    }

    fn get(&self, id: NodeId) -> Result<&RecordedNode, GraphError> {
        self.nodes.get(id as usize).ok_or(GraphError::UnknownNode)
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut RecordedNode, GraphError> {
        self.nodes.get_mut(id as usize).ok_or(GraphError::UnknownNode)
    }

    fn automation_mut(&mut self, id: NodeId, param: Param) -> Result<&mut Automation, GraphError> {
        self.get_mut(id)?
            .params
            .get_mut(&param)
            .ok_or(GraphError::InvalidParam {
                param,
                value: f32::NAN,
            })
    }

    fn wire_check(&self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        let src = self.get(from)?;
        let dst = self.get(to)?;
        if (src.released && src.disconnected) || (dst.released && dst.disconnected) {
            return Err(GraphError::AlreadyReleased);
        }
        Ok(())
    }
}

impl AudioGraph for RecordingGraph {
    type Node = NodeId;

    fn acquire() -> Result<Self, GraphError> {
        Ok(Self::new())
    }

    fn state(&self) -> ContextState {
        self.state
    }

    fn resume(&mut self) -> ResumeFuture {
        let result = match self.state {
            ContextState::Closed => Err(GraphError::InvalidState("context closed")),
            _ => {
                self.state = ContextState::Running;
                Ok(())
            }
        };
        Box::pin(future::ready(result))
    }

    fn current_time(&self) -> f64 {
        self.now
    }

    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn destination(&self) -> NodeId {
        0
    }

    fn create_oscillator(&mut self, waveform: Waveform, frequency: f32) -> Result<NodeId, GraphError> {
        self.add(NodeKind::Oscillator(waveform), &[(Param::Frequency, frequency)])
    }

    fn create_noise(&mut self, samples: &[f32]) -> Result<NodeId, GraphError> {
        self.add(
            NodeKind::Noise {
                samples: samples.len(),
            },
            &[],
        )
    }

    fn create_constant(&mut self, offset: f32) -> Result<NodeId, GraphError> {
        self.add(NodeKind::Constant, &[(Param::Offset, offset)])
    }

    fn create_gain(&mut self, gain: f32) -> Result<NodeId, GraphError> {
        self.add(NodeKind::Gain, &[(Param::Gain, gain)])
    }

    fn create_filter(&mut self, kind: FilterKind, frequency: f32, q: f32) -> Result<NodeId, GraphError> {
        self.add(
            NodeKind::Filter(kind),
            &[(Param::Frequency, frequency), (Param::Q, q)],
        )
    }

    fn create_delay(&mut self, max_delay: f64, delay: f64) -> Result<NodeId, GraphError> {
        if !(max_delay > 0.0) || delay < 0.0 || delay > max_delay {
            return Err(GraphError::InvalidParam {
                param: Param::DelayTime,
                value: delay as f32,
            });
        }
        self.add(
            NodeKind::Delay { max_delay },
            &[(Param::DelayTime, delay as f32)],
        )
    }

    fn connect(&mut self, from: &NodeId, to: &NodeId) -> Result<(), GraphError> {
        self.wire_check(*from, *to)?;
        let src = self.get_mut(*from)?;
        src.outputs.push(*to);
        src.disconnected = false;
        Ok(())
    }

    fn connect_param(&mut self, from: &NodeId, to: &NodeId, param: Param) -> Result<(), GraphError> {
        self.wire_check(*from, *to)?;
        if !self.get(*to)?.params.contains_key(&param) {
            return Err(GraphError::InvalidParam {
                param,
                value: f32::NAN,
            });
        }
        let src = self.get_mut(*from)?;
        src.param_outputs.push((*to, param));
        src.disconnected = false;
        Ok(())
    }

    fn set_param(&mut self, node: &NodeId, param: Param, value: f32) -> Result<(), GraphError> {
        if !value.is_finite() {
            return Err(GraphError::InvalidParam { param, value });
        }
        self.automation_mut(*node, param)?.set_value(value);
        Ok(())
    }

    fn param_value(&self, node: &NodeId, param: Param) -> Result<f32, GraphError> {
        self.get(*node)?
            .params
            .get(&param)
            .map(|a| a.value_at(self.now))
            .ok_or(GraphError::InvalidParam {
                param,
                value: f32::NAN,
            })
    }

    fn schedule(&mut self, node: &NodeId, param: Param, event: ParamEvent) -> Result<(), GraphError> {
        self.automation_mut(*node, param)?.push(param, event)
    }

    fn start(&mut self, node: &NodeId, when: f64) -> Result<(), GraphError> {
        let n = self.get_mut(*node)?;
        if !n.kind.is_source() {
            return Err(GraphError::InvalidState("not a source"));
        }
        if n.start.is_some() {
            return Err(GraphError::InvalidState("source already started"));
        }
        n.start = Some(when);
        Ok(())
    }

    fn stop(&mut self, node: &NodeId, when: f64) -> Result<(), GraphError> {
        let now = self.now;
        let n = self.get_mut(*node)?;
        if !n.kind.is_source() {
            return Err(GraphError::InvalidState("not a source"));
        }
        if n.released || n.stop.is_some() {
            return Err(GraphError::AlreadyReleased);
        }
        if n.start.is_none() {
            return Err(GraphError::InvalidState("source never started"));
        }
        n.stop = Some(when);
        if when <= now {
            n.released = true;
        }
        Ok(())
    }

    fn disconnect(&mut self, node: &NodeId) -> Result<(), GraphError> {
        let n = self.get_mut(*node)?;
        if n.disconnected {
            return Err(GraphError::AlreadyReleased);
        }
        n.outputs.clear();
        n.param_outputs.clear();
        n.disconnected = true;
        Ok(())
    }

    fn schedule_release(&mut self, node: &NodeId, when: f64) {
        if let Some(n) = self.nodes.get_mut(*node as usize) {
            n.release_at = Some(when);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopping_twice_reports_already_released() {
        let mut g = RecordingGraph::new();
        let osc = g.create_oscillator(Waveform::Sine, 220.0).unwrap();
        g.start(&osc, 0.0).unwrap();
        assert_eq!(g.stop(&osc, 0.0), Ok(()));
        assert_eq!(g.stop(&osc, 0.0), Err(GraphError::AlreadyReleased));
    }

    #[test]
    fn disconnecting_twice_reports_already_released() {
        let mut g = RecordingGraph::new();
        let gain = g.create_gain(1.0).unwrap();
        let dst = g.destination();
        g.connect(&gain, &dst).unwrap();
        assert_eq!(g.disconnect(&gain), Ok(()));
        assert!(g.node(gain).unwrap().outputs.is_empty());
        assert_eq!(g.disconnect(&gain), Err(GraphError::AlreadyReleased));
    }

    #[test]
    fn advance_reclaims_finished_sources() {
        let mut g = RecordingGraph::new();
        let osc = g.create_oscillator(Waveform::Sine, 220.0).unwrap();
        g.start(&osc, 0.0).unwrap();
        g.stop(&osc, 0.5).unwrap();
        assert_eq!(g.live_sources(), 1);
        g.advance(0.25);
        assert_eq!(g.live_sources(), 1);
        g.advance(0.25);
        assert_eq!(g.live_sources(), 0);
        assert_eq!(g.disconnect(&osc), Err(GraphError::AlreadyReleased));
    }

    #[test]
    fn reclaimed_nodes_stay_inspectable() {
        let mut g = RecordingGraph::new();
        let osc = g.create_oscillator(Waveform::Sine, 220.0).unwrap();
        g.start(&osc, 0.0).unwrap();
        g.stop(&osc, 0.1).unwrap();
        g.advance(1.0);
        assert_eq!(g.node_count(), 2);
        let node = g.node(osc).unwrap();
        assert!(node.released);
        assert_eq!(node.stop, Some(0.1));
    }

    #[test]
    fn suspended_clock_does_not_move_until_resumed() {
        let mut g = RecordingGraph::suspended();
        g.advance(1.0);
        assert_eq!(g.current_time(), 0.0);
        pollster::block_on(g.resume()).unwrap();
        assert_eq!(g.state(), ContextState::Running);
        g.advance(1.0);
        assert_eq!(g.current_time(), 1.0);
    }

    #[test]
    fn stop_before_start_is_a_state_error() {
        let mut g = RecordingGraph::new();
        let c = g.create_constant(0.1).unwrap();
        assert!(matches!(g.stop(&c, 0.0), Err(GraphError::InvalidState(_))));
    }

    #[test]
    fn unknown_params_are_rejected() {
        let mut g = RecordingGraph::new();
        let gain = g.create_gain(1.0).unwrap();
        assert!(matches!(
            g.set_param(&gain, Param::Frequency, 10.0),
            Err(GraphError::InvalidParam { .. })
        ));
        assert!(matches!(g.set_param(&99, Param::Gain, 1.0), Err(GraphError::UnknownNode)));
    }

    #[test]
    fn non_finite_initial_values_are_rejected() {
        let mut g = RecordingGraph::new();
        assert!(g.create_oscillator(Waveform::Sine, f32::NAN).is_err());
        assert!(g.create_gain(f32::INFINITY).is_err());
        assert_eq!(g.node_count(), 1);
    }

    #[test]
    fn delay_longer_than_max_is_rejected() {
        let mut g = RecordingGraph::new();
        assert!(g.create_delay(1.0, 2.0).is_err());
        assert!(g.create_delay(1.0, 0.3).is_ok());
    }
}
