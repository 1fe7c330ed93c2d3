//! Software renderer for the engine's node graph.
//!
//! Every sample, nodes are evaluated in dependency order. Edges into a
//! delay line are left out of that order: the delay emits what it stored
//! earlier and only takes its input after the pass, which is what lets the
//! reverb feedback loop exist at all.
//!
//! The order is rebuilt by [`Renderer::commit`] on the control thread after
//! new edges appear. Adding, disconnecting and reclaiming nodes keep the
//! existing order valid, so the output callback never has to sort.

use fnv::{FnvHashMap, FnvHashSet};
use smallvec::SmallVec;

use sfx_core::{Automation, FilterKind, GraphError, Param, ParamEvent, Waveform};

use crate::dsp::{wave_sample, Biquad, DelayLine};

pub type NodeId = u32;

/// Reclaim finished nodes every this many samples.
const PRUNE_INTERVAL: u64 = 512;

#[derive(Debug, Clone)]
enum Kind {
    Destination,
    Oscillator { waveform: Waveform, phase: f64 },
    Buffer { samples: Vec<f32>, cursor: usize },
    Constant,
    Gain,
    Filter(Biquad),
    Delay(DelayLine),
}

impl Kind {
    fn is_source(&self) -> bool {
        matches!(
            self,
            Kind::Oscillator { .. } | Kind::Buffer { .. } | Kind::Constant
        )
    }
}

#[derive(Debug, Clone)]
struct Node {
    kind: Kind,
    params: SmallVec<[(Param, Automation); 2]>,
    inputs: Vec<NodeId>,
    param_inputs: Vec<(NodeId, Param)>,
    start: Option<f64>,
    stop: Option<f64>,
    release_at: Option<f64>,
    disconnected: bool,
    out: f32,
}

impl Node {
    fn new(kind: Kind, params: &[(Param, f32)]) -> Self {
        Self {
            kind,
            params: params.iter().map(|&(p, v)| (p, Automation::new(v))).collect(),
            inputs: Vec::new(),
            param_inputs: Vec::new(),
            start: None,
            stop: None,
            release_at: None,
            disconnected: false,
            out: 0.0,
        }
    }

    fn automation(&self, param: Param) -> Option<&Automation> {
        self.params.iter().find(|(p, _)| *p == param).map(|(_, a)| a)
    }

    fn automation_mut(&mut self, param: Param) -> Option<&mut Automation> {
        self.params.iter_mut().find(|(p, _)| *p == param).map(|(_, a)| a)
    }

    fn playing(&self, t: f64) -> bool {
        self.start.is_some_and(|s| s <= t) && self.stop.map_or(true, |s| t < s)
    }

    fn finished(&self, t: f64) -> bool {
        (self.kind.is_source() && self.stop.is_some_and(|s| s <= t))
            || self.release_at.is_some_and(|r| r <= t)
            || (self.disconnected && !matches!(self.kind, Kind::Destination))
    }
}

/// The node graph plus its clock. Shared between the control thread and
/// the output stream callback.
pub struct Renderer {
    nodes: FnvHashMap<NodeId, Node>,
    next_id: NodeId,
    sample_rate: f32,
    frame: u64,
    running: bool,
    order: Vec<NodeId>,
    delays: Vec<NodeId>,
    dirty: bool,
}

impl Renderer {
    pub fn new(sample_rate: f32) -> Self {
        let mut nodes = FnvHashMap::default();
        nodes.insert(0, Node::new(Kind::Destination, &[]));
        Self {
            nodes,
            next_id: 1,
            sample_rate,
            frame: 0,
            running: false,
            order: vec![0],
            delays: Vec::new(),
            dirty: false,
        }
    }

    pub fn destination(&self) -> NodeId {
        0
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn time(&self) -> f64 {
        self.frame as f64 / self.sample_rate as f64
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    /// Live nodes, destination included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // ---------------- Construction ----------------

    fn add(&mut self, kind: Kind, params: &[(Param, f32)]) -> Result<NodeId, GraphError> {
        if let Some(&(param, value)) = params.iter().find(|(_, v)| !v.is_finite()) {
            return Err(GraphError::InvalidParam { param, value });
        }
        let id = self.next_id;
        self.next_id += 1;
        // No edges yet, so it can go anywhere in the order.
        if matches!(kind, Kind::Delay(_)) {
            self.delays.push(id);
        }
        self.order.push(id);
        self.nodes.insert(id, Node::new(kind, params));
        Ok(id)
    }

    pub fn add_oscillator(&mut self, waveform: Waveform, frequency: f32) -> Result<NodeId, GraphError> {
        self.add(
            Kind::Oscillator { waveform, phase: 0.0 },
            &[(Param::Frequency, frequency)],
        )
    }

    pub fn add_buffer(&mut self, samples: &[f32]) -> Result<NodeId, GraphError> {
        self.add(
            Kind::Buffer {
                samples: samples.to_vec(),
                cursor: 0,
            },
            &[],
        )
    }

    pub fn add_constant(&mut self, offset: f32) -> Result<NodeId, GraphError> {
        self.add(Kind::Constant, &[(Param::Offset, offset)])
    }

    pub fn add_gain(&mut self, gain: f32) -> Result<NodeId, GraphError> {
        self.add(Kind::Gain, &[(Param::Gain, gain)])
    }

    pub fn add_filter(&mut self, kind: FilterKind, frequency: f32, q: f32) -> Result<NodeId, GraphError> {
        self.add(
            Kind::Filter(Biquad::new(kind)),
            &[(Param::Frequency, frequency), (Param::Q, q)],
        )
    }

    pub fn add_delay(&mut self, max_delay: f64, delay: f64) -> Result<NodeId, GraphError> {
        if !(max_delay > 0.0) || delay < 0.0 || delay > max_delay {
            return Err(GraphError::InvalidParam {
                param: Param::DelayTime,
                value: delay as f32,
            });
        }
        let line = DelayLine::new(max_delay, self.sample_rate);
        self.add(Kind::Delay(line), &[(Param::DelayTime, delay as f32)])
    }

    /// Ids are never reused, so a missing id below `next_id` was reclaimed.
    fn get(&self, id: NodeId) -> Result<&Node, GraphError> {
        match self.nodes.get(&id) {
            Some(n) => Ok(n),
            None if id < self.next_id => Err(GraphError::AlreadyReleased),
            None => Err(GraphError::UnknownNode),
        }
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut Node, GraphError> {
        let next_id = self.next_id;
        match self.nodes.get_mut(&id) {
            Some(n) => Ok(n),
            None if id < next_id => Err(GraphError::AlreadyReleased),
            None => Err(GraphError::UnknownNode),
        }
    }

    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        self.get(from)?;
        self.get_mut(to)?.inputs.push(from);
        self.dirty = true;
        Ok(())
    }

    pub fn connect_param(&mut self, from: NodeId, to: NodeId, param: Param) -> Result<(), GraphError> {
        self.get(from)?;
        let target = self.get_mut(to)?;
        if target.automation(param).is_none() {
            return Err(GraphError::InvalidParam {
                param,
                value: f32::NAN,
            });
        }
        target.param_inputs.push((from, param));
        self.dirty = true;
        Ok(())
    }

    /// Drop every outgoing edge of `id`. The node is reclaimed at the next
    /// prune.
    pub fn disconnect(&mut self, id: NodeId) -> Result<(), GraphError> {
        let node = self.get_mut(id)?;
        if node.disconnected {
            return Err(GraphError::AlreadyReleased);
        }
        node.disconnected = true;
        for n in self.nodes.values_mut() {
            n.inputs.retain(|&i| i != id);
            n.param_inputs.retain(|&(i, _)| i != id);
        }
        Ok(())
    }

    pub fn set_param(&mut self, id: NodeId, param: Param, value: f32) -> Result<(), GraphError> {
        if !value.is_finite() {
            return Err(GraphError::InvalidParam { param, value });
        }
        self.get_mut(id)?
            .automation_mut(param)
            .ok_or(GraphError::InvalidParam { param, value })?
            .set_value(value);
        Ok(())
    }

    pub fn param_value(&self, id: NodeId, param: Param) -> Result<f32, GraphError> {
        let t = self.time();
        self.get(id)?
            .automation(param)
            .map(|a| a.value_at(t))
            .ok_or(GraphError::InvalidParam {
                param,
                value: f32::NAN,
            })
    }

    pub fn schedule(&mut self, id: NodeId, param: Param, event: ParamEvent) -> Result<(), GraphError> {
        self.get_mut(id)?
            .automation_mut(param)
            .ok_or(GraphError::InvalidParam {
                param,
                value: event.value(),
            })?
            .push(param, event)
    }

    pub fn start(&mut self, id: NodeId, when: f64) -> Result<(), GraphError> {
        let node = self.get_mut(id)?;
        if !node.kind.is_source() {
            return Err(GraphError::InvalidState("not a source"));
        }
        if node.start.is_some() {
            return Err(GraphError::InvalidState("source already started"));
        }
        node.start = Some(when.max(0.0));
        Ok(())
    }

    pub fn stop(&mut self, id: NodeId, when: f64) -> Result<(), GraphError> {
        let node = self.get_mut(id)?;
        if !node.kind.is_source() {
            return Err(GraphError::InvalidState("not a source"));
        }
        if node.stop.is_some() {
            return Err(GraphError::AlreadyReleased);
        }
        if node.start.is_none() {
            return Err(GraphError::InvalidState("source never started"));
        }
        node.stop = Some(when);
        Ok(())
    }

    pub fn release_at(&mut self, id: NodeId, when: f64) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.release_at = Some(when);
        }
    }

    // ---------------- Rendering ----------------

    /// Rebuild the evaluation order if edges were added since the last call.
    pub fn commit(&mut self) {
        if self.dirty {
            self.sort();
        }
    }

    pub fn needs_sort(&self) -> bool {
        self.dirty
    }

    /// Kahn's algorithm over audio and parameter edges, skipping edges into
    /// delay lines. Nodes caught in a delay-free cycle go last and read
    /// their inputs one sample late.
    fn sort(&mut self) {
        let mut ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        ids.sort_unstable();

        let mut indegree: FnvHashMap<NodeId, usize> = ids.iter().map(|&id| (id, 0)).collect();
        let mut dependents: FnvHashMap<NodeId, Vec<NodeId>> = FnvHashMap::default();
        for &id in &ids {
            let node = &self.nodes[&id];
            let audio = match node.kind {
                Kind::Delay(_) => &[][..],
                _ => &node.inputs[..],
            };
            let deps = audio
                .iter()
                .copied()
                .chain(node.param_inputs.iter().map(|&(src, _)| src));
            for src in deps {
                if self.nodes.contains_key(&src) {
                    *indegree.entry(id).or_default() += 1;
                    dependents.entry(src).or_default().push(id);
                }
            }
        }

        let mut order = Vec::with_capacity(ids.len());
        let mut ready: Vec<NodeId> = ids.iter().copied().filter(|id| indegree[id] == 0).collect();
        ready.reverse();
        while let Some(id) = ready.pop() {
            order.push(id);
            if let Some(next) = dependents.get(&id) {
                for dep in next {
                    if let Some(d) = indegree.get_mut(dep) {
                        *d -= 1;
                        if *d == 0 {
                            ready.push(*dep);
                        }
                    }
                }
            }
        }
        if order.len() < ids.len() {
            let placed: FnvHashSet<NodeId> = order.iter().copied().collect();
            order.extend(ids.iter().copied().filter(|id| !placed.contains(id)));
        }

        self.delays = ids
            .iter()
            .copied()
            .filter(|id| matches!(self.nodes[id].kind, Kind::Delay(_)))
            .collect();
        self.order = order;
        self.dirty = false;
    }

    fn input_sum(&self, inputs: &[NodeId]) -> f32 {
        inputs
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .map(|n| n.out)
            .sum()
    }

    fn param_at(&self, node: &Node, param: Param, t: f64) -> f32 {
        let base = node.automation(param).map_or(0.0, |a| a.value_at(t));
        let modulation: f32 = node
            .param_inputs
            .iter()
            .filter(|(_, p)| *p == param)
            .filter_map(|(src, _)| self.nodes.get(src))
            .map(|n| n.out)
            .sum();
        base + modulation
    }

    /// Render one mono sample and advance the clock. Silent while suspended.
    pub fn next_sample(&mut self) -> f32 {
        if !self.running {
            return 0.0;
        }
        // Only reached when the renderer is driven without commit().
        self.commit();
        let t = self.time();
        let sr = self.sample_rate;

        for i in 0..self.order.len() {
            let id = self.order[i];
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            let input = self.input_sum(&node.inputs);
            let playing = node.playing(t);
            let (p0, p1) = match node.kind {
                Kind::Oscillator { .. } => (self.param_at(node, Param::Frequency, t), 0.0),
                Kind::Constant => (self.param_at(node, Param::Offset, t), 0.0),
                Kind::Gain => (self.param_at(node, Param::Gain, t), 0.0),
                Kind::Filter(_) => (
                    self.param_at(node, Param::Frequency, t),
                    self.param_at(node, Param::Q, t),
                ),
                Kind::Delay(_) => (self.param_at(node, Param::DelayTime, t), 0.0),
                _ => (0.0, 0.0),
            };

            let Some(node) = self.nodes.get_mut(&id) else {
                continue;
            };
            node.out = match &mut node.kind {
                Kind::Destination => input,
                Kind::Oscillator { waveform, phase } => {
                    if playing {
                        let v = wave_sample(*waveform, *phase);
                        *phase = (*phase + p0 as f64 / sr as f64).rem_euclid(1.0);
                        v
                    } else {
                        0.0
                    }
                }
                Kind::Buffer { samples, cursor } => {
                    if playing && *cursor < samples.len() {
                        *cursor += 1;
                        samples[*cursor - 1]
                    } else {
                        0.0
                    }
                }
                Kind::Constant => {
                    if playing {
                        p0
                    } else {
                        0.0
                    }
                }
                Kind::Gain => input * p0,
                Kind::Filter(biquad) => biquad.process(input, p0, p1, sr),
                Kind::Delay(line) => line.read(p0, sr),
            };
        }

        for i in 0..self.delays.len() {
            let id = self.delays[i];
            let input = match self.nodes.get(&id) {
                Some(node) => self.input_sum(&node.inputs),
                None => continue,
            };
            if let Some(Node {
                kind: Kind::Delay(line),
                ..
            }) = self.nodes.get_mut(&id)
            {
                line.write(input);
            }
        }

        let out = self.nodes.get(&0).map_or(0.0, |n| n.out);
        self.frame += 1;
        if self.frame % PRUNE_INTERVAL == 0 {
            self.prune();
        }
        out.clamp(-1.0, 1.0)
    }

    /// Fill `out` with consecutive samples.
    pub fn render(&mut self, out: &mut [f32]) {
        for s in out.iter_mut() {
            *s = self.next_sample();
        }
    }

    /// Remove nodes that can no longer contribute and every edge from them.
    pub fn prune(&mut self) {
        let t = self.time();
        let dead: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.finished(t))
            .map(|(&id, _)| id)
            .collect();
        if dead.is_empty() {
            return;
        }
        for id in &dead {
            self.nodes.remove(id);
        }
        let dead: FnvHashSet<NodeId> = dead.into_iter().collect();
        for n in self.nodes.values_mut() {
            n.inputs.retain(|i| !dead.contains(i));
            n.param_inputs.retain(|(i, _)| !dead.contains(i));
        }
        self.order.retain(|i| !dead.contains(i));
        self.delays.retain(|i| !dead.contains(i));
        log::trace!("[render] reclaimed {} nodes", dead.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 1000.0;

    fn running() -> Renderer {
        let mut r = Renderer::new(SR);
        r.set_running(true);
        r
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn constant_through_gain_reaches_destination() {
        let mut r = running();
        let c = r.add_constant(0.5).unwrap();
        let g = r.add_gain(0.4).unwrap();
        r.connect(c, g).unwrap();
        r.connect(g, 0).unwrap();
        r.start(c, 0.0).unwrap();
        let mut buf = [0.0; 4];
        r.render(&mut buf);
        for s in buf {
            assert!((s - 0.2).abs() < 1e-6);
        }
    }

    #[test]
    fn suspended_renderer_is_silent_and_frozen() {
        let mut r = Renderer::new(SR);
        let c = r.add_constant(1.0).unwrap();
        r.connect(c, 0).unwrap();
        r.start(c, 0.0).unwrap();
        assert_eq!(r.next_sample(), 0.0);
        assert_eq!(r.time(), 0.0);
    }

    #[test]
    fn sources_respect_start_and_stop_times() {
        let mut r = running();
        let c = r.add_constant(1.0).unwrap();
        r.connect(c, 0).unwrap();
        r.start(c, 0.01).unwrap();
        r.stop(c, 0.02).unwrap();
        let mut buf = [0.0; 30];
        r.render(&mut buf);
        assert!(buf[..10].iter().all(|&s| s == 0.0));
        assert!(buf[10..20].iter().all(|&s| s == 1.0));
        assert!(buf[20..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn param_inputs_sum_with_intrinsic_value() {
        let mut r = running();
        let c = r.add_constant(0.25).unwrap();
        let one = r.add_constant(1.0).unwrap();
        let amp = r.add_gain(0.5).unwrap();
        r.connect(one, amp).unwrap();
        r.connect_param(c, amp, Param::Gain).unwrap();
        r.connect(amp, 0).unwrap();
        r.start(c, 0.0).unwrap();
        r.start(one, 0.0).unwrap();
        assert!((r.next_sample() - 0.75).abs() < 1e-6);
    }

    #[test]
    fn delay_feedback_loop_renders_and_decays() {
        let mut r = running();
        let src = r.add_constant(1.0).unwrap();
        let delay = r.add_delay(0.1, 0.01).unwrap();
        let fb = r.add_gain(0.5).unwrap();
        r.connect(src, delay).unwrap();
        r.connect(delay, fb).unwrap();
        r.connect(fb, delay).unwrap();
        r.connect(delay, 0).unwrap();
        r.start(src, 0.0).unwrap();
        r.stop(src, 0.001).unwrap();

        let mut buf = vec![0.0; 60];
        r.render(&mut buf);
        assert_eq!(buf[0], 0.0);
        assert!((buf[10] - 1.0).abs() < 1e-6, "first echo {}", buf[10]);
        assert!((buf[20] - 0.5).abs() < 1e-6, "second echo {}", buf[20]);
        assert!((buf[30] - 0.25).abs() < 1e-6, "third echo {}", buf[30]);
    }

    #[test]
    fn gain_automation_shapes_the_output() {
        let mut r = running();
        let c = r.add_constant(1.0).unwrap();
        let env = r.add_gain(0.0).unwrap();
        r.connect(c, env).unwrap();
        r.connect(env, 0).unwrap();
        r.start(c, 0.0).unwrap();
        r.schedule(env, Param::Gain, ParamEvent::SetValueAt { value: 0.0, time: 0.0 })
            .unwrap();
        r.schedule(env, Param::Gain, ParamEvent::LinearRampTo { value: 1.0, time: 0.01 })
            .unwrap();
        let mut buf = [0.0; 11];
        r.render(&mut buf);
        assert!((buf[5] - 0.5).abs() < 1e-4);
        assert!((buf[10] - 1.0).abs() < 1e-4);
    }

    #[test]
    fn oscillator_produces_a_tone() {
        let mut r = Renderer::new(8000.0);
        r.set_running(true);
        let osc = r.add_oscillator(Waveform::Sine, 440.0).unwrap();
        r.connect(osc, 0).unwrap();
        r.start(osc, 0.0).unwrap();
        let mut buf = vec![0.0; 800];
        r.render(&mut buf);
        let level = rms(&buf);
        assert!((level - std::f32::consts::FRAC_1_SQRT_2).abs() < 0.02, "rms {level}");
    }

    #[test]
    fn finished_and_disconnected_nodes_are_reclaimed() {
        let mut r = running();
        let c = r.add_constant(1.0).unwrap();
        let g = r.add_gain(1.0).unwrap();
        r.connect(c, g).unwrap();
        r.connect(g, 0).unwrap();
        r.start(c, 0.0).unwrap();
        r.stop(c, 0.005).unwrap();
        r.release_at(g, 0.005);
        let aux = r.add_gain(1.0).unwrap();
        r.disconnect(aux).unwrap();

        let mut buf = [0.0; 10];
        r.render(&mut buf);
        r.prune();
        assert_eq!(r.node_count(), 1);
        assert_eq!(r.stop(c, 1.0), Err(GraphError::AlreadyReleased));
        assert_eq!(r.disconnect(aux), Err(GraphError::AlreadyReleased));
        assert_eq!(r.disconnect(99), Err(GraphError::UnknownNode));
    }

    #[test]
    fn only_new_edges_require_a_sort() {
        let mut r = running();
        let c = r.add_constant(1.0).unwrap();
        let g = r.add_gain(0.5).unwrap();
        assert!(!r.needs_sort());
        r.connect(c, g).unwrap();
        r.connect(g, 0).unwrap();
        assert!(r.needs_sort());
        r.commit();
        assert!(!r.needs_sort());

        r.start(c, 0.0).unwrap();
        r.stop(c, 0.005).unwrap();
        r.release_at(g, 0.005);
        let spare = r.add_gain(1.0).unwrap();
        r.disconnect(spare).unwrap();
        assert!(!r.needs_sort());

        let mut buf = [0.0; 10];
        r.render(&mut buf);
        assert!((buf[0] - 0.5).abs() < 1e-6);
        r.prune();
        assert!(!r.needs_sort());
        assert_eq!(r.order, vec![0]);
        assert!(r.next_sample().abs() < 1e-9);
    }

    #[test]
    fn stopping_twice_reports_already_released() {
        let mut r = running();
        let c = r.add_constant(1.0).unwrap();
        r.start(c, 0.0).unwrap();
        assert_eq!(r.stop(c, 0.0), Ok(()));
        assert_eq!(r.stop(c, 0.0), Err(GraphError::AlreadyReleased));
    }
}
