use std::cell::Cell;
use std::rc::Rc;

use sfx_core::{
    AudioGraph, ContextState, FilterKind, GraphError, Param, ParamEvent, ResumeFuture, Waveform,
};
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::JsFuture;
use web_sys as web;

fn backend(e: JsValue) -> GraphError {
    GraphError::Backend(format!("{:?}", e))
}

#[derive(Clone, Debug)]
enum Kind {
    Destination(web::AudioDestinationNode),
    Oscillator(web::OscillatorNode),
    Buffer(web::AudioBufferSourceNode),
    Constant(web::ConstantSourceNode),
    Gain(web::GainNode),
    Filter(web::BiquadFilterNode),
    Delay(web::DelayNode),
}

/// Handle to a WebAudio node.
///
/// Clones share the stop/disconnect flags so a second release through any
/// copy reports [`GraphError::AlreadyReleased`] instead of reaching the
/// browser, which would either throw or silently ignore it.
#[derive(Clone, Debug)]
pub struct WebNode {
    kind: Kind,
    stopped: Rc<Cell<bool>>,
    disconnected: Rc<Cell<bool>>,
}

impl WebNode {
    fn new(kind: Kind) -> Self {
        Self {
            kind,
            stopped: Rc::new(Cell::new(false)),
            disconnected: Rc::new(Cell::new(false)),
        }
    }

    fn audio_node(&self) -> &web::AudioNode {
        match &self.kind {
            Kind::Destination(n) => n.as_ref(),
            Kind::Oscillator(n) => n.as_ref(),
            Kind::Buffer(n) => n.as_ref(),
            Kind::Constant(n) => n.as_ref(),
            Kind::Gain(n) => n.as_ref(),
            Kind::Filter(n) => n.as_ref(),
            Kind::Delay(n) => n.as_ref(),
        }
    }

    fn scheduled(&self) -> Option<&web::AudioScheduledSourceNode> {
        match &self.kind {
            Kind::Oscillator(n) => Some(n.as_ref()),
            Kind::Buffer(n) => Some(n.as_ref()),
            Kind::Constant(n) => Some(n.as_ref()),
            _ => None,
        }
    }

    fn param(&self, param: Param) -> Option<web::AudioParam> {
        match (&self.kind, param) {
            (Kind::Oscillator(n), Param::Frequency) => Some(n.frequency()),
            (Kind::Constant(n), Param::Offset) => Some(n.offset()),
            (Kind::Gain(n), Param::Gain) => Some(n.gain()),
            (Kind::Filter(n), Param::Frequency) => Some(n.frequency()),
            (Kind::Filter(n), Param::Q) => Some(n.q()),
            (Kind::Delay(n), Param::DelayTime) => Some(n.delay_time()),
            _ => None,
        }
    }

    fn require_param(&self, param: Param, value: f32) -> Result<web::AudioParam, GraphError> {
        self.param(param)
            .ok_or(GraphError::InvalidParam { param, value })
    }

    fn check_wired(&self) -> Result<(), GraphError> {
        if self.stopped.get() && self.disconnected.get() {
            return Err(GraphError::AlreadyReleased);
        }
        Ok(())
    }
}

/// [`AudioGraph`] over a browser `AudioContext`.
pub struct WebAudioGraph {
    ctx: web::AudioContext,
    destination: WebNode,
}

impl WebAudioGraph {
    pub fn context(&self) -> &web::AudioContext {
        &self.ctx
    }

    fn init_param(param: &web::AudioParam, p: Param, value: f32) -> Result<(), GraphError> {
        if !value.is_finite() {
            return Err(GraphError::InvalidParam { param: p, value });
        }
        param.set_value(value);
        Ok(())
    }
}

impl AudioGraph for WebAudioGraph {
    type Node = WebNode;

    fn acquire() -> Result<Self, GraphError> {
        let ctx = web::AudioContext::new()
            .map_err(|e| GraphError::Unavailable(format!("{:?}", e)))?;
        let destination = WebNode::new(Kind::Destination(ctx.destination()));
        Ok(Self { ctx, destination })
    }

    fn state(&self) -> ContextState {
        match self.ctx.state() {
            web::AudioContextState::Running => ContextState::Running,
            web::AudioContextState::Closed => ContextState::Closed,
            _ => ContextState::Suspended,
        }
    }

    fn resume(&mut self) -> ResumeFuture {
        let promise = self.ctx.resume();
        Box::pin(async move {
            JsFuture::from(promise.map_err(backend)?)
                .await
                .map(|_| ())
                .map_err(backend)
        })
    }

    fn current_time(&self) -> f64 {
        self.ctx.current_time()
    }

    fn sample_rate(&self) -> f32 {
        self.ctx.sample_rate()
    }

    fn destination(&self) -> WebNode {
        self.destination.clone()
    }

    fn create_oscillator(&mut self, waveform: Waveform, frequency: f32) -> Result<WebNode, GraphError> {
        let osc = web::OscillatorNode::new(&self.ctx).map_err(backend)?;
        osc.set_type(match waveform {
            Waveform::Sine => web::OscillatorType::Sine,
            Waveform::Square => web::OscillatorType::Square,
            Waveform::Sawtooth => web::OscillatorType::Sawtooth,
            Waveform::Triangle => web::OscillatorType::Triangle,
        });
        Self::init_param(&osc.frequency(), Param::Frequency, frequency)?;
        Ok(WebNode::new(Kind::Oscillator(osc)))
    }

    fn create_noise(&mut self, samples: &[f32]) -> Result<WebNode, GraphError> {
        let len = samples.len().max(1) as u32;
        let buffer = self
            .ctx
            .create_buffer(1, len, self.ctx.sample_rate())
            .map_err(backend)?;
        let mut data = samples.to_vec();
        buffer.copy_to_channel(&mut data, 0).map_err(backend)?;
        let src = web::AudioBufferSourceNode::new(&self.ctx).map_err(backend)?;
        src.set_buffer(Some(&buffer));
        Ok(WebNode::new(Kind::Buffer(src)))
    }

    fn create_constant(&mut self, offset: f32) -> Result<WebNode, GraphError> {
        let node = web::ConstantSourceNode::new(&self.ctx).map_err(backend)?;
        Self::init_param(&node.offset(), Param::Offset, offset)?;
        Ok(WebNode::new(Kind::Constant(node)))
    }

    fn create_gain(&mut self, gain: f32) -> Result<WebNode, GraphError> {
        let node = web::GainNode::new(&self.ctx).map_err(backend)?;
        Self::init_param(&node.gain(), Param::Gain, gain)?;
        Ok(WebNode::new(Kind::Gain(node)))
    }

    fn create_filter(&mut self, kind: FilterKind, frequency: f32, q: f32) -> Result<WebNode, GraphError> {
        let node = web::BiquadFilterNode::new(&self.ctx).map_err(backend)?;
        node.set_type(match kind {
            FilterKind::Lowpass => web::BiquadFilterType::Lowpass,
            FilterKind::Highpass => web::BiquadFilterType::Highpass,
            FilterKind::Bandpass => web::BiquadFilterType::Bandpass,
        });
        Self::init_param(&node.frequency(), Param::Frequency, frequency)?;
        Self::init_param(&node.q(), Param::Q, q)?;
        Ok(WebNode::new(Kind::Filter(node)))
    }

    fn create_delay(&mut self, max_delay: f64, delay: f64) -> Result<WebNode, GraphError> {
        if !(max_delay > 0.0) || delay < 0.0 || delay > max_delay {
            return Err(GraphError::InvalidParam {
                param: Param::DelayTime,
                value: delay as f32,
            });
        }
        let node = self
            .ctx
            .create_delay_with_max_delay_time(max_delay)
            .map_err(backend)?;
        node.delay_time().set_value(delay as f32);
        Ok(WebNode::new(Kind::Delay(node)))
    }

    fn connect(&mut self, from: &WebNode, to: &WebNode) -> Result<(), GraphError> {
        from.check_wired()?;
        to.check_wired()?;
        from.audio_node()
            .connect_with_audio_node(to.audio_node())
            .map_err(backend)?;
        from.disconnected.set(false);
        Ok(())
    }

    fn connect_param(&mut self, from: &WebNode, to: &WebNode, param: Param) -> Result<(), GraphError> {
        from.check_wired()?;
        to.check_wired()?;
        let target = to.require_param(param, f32::NAN)?;
        from.audio_node()
            .connect_with_audio_param(&target)
            .map_err(backend)?;
        from.disconnected.set(false);
        Ok(())
    }

    fn set_param(&mut self, node: &WebNode, param: Param, value: f32) -> Result<(), GraphError> {
        let p = node.require_param(param, value)?;
        Self::init_param(&p, param, value)
    }

    fn param_value(&self, node: &WebNode, param: Param) -> Result<f32, GraphError> {
        Ok(node.require_param(param, f32::NAN)?.value())
    }

    fn schedule(&mut self, node: &WebNode, param: Param, event: ParamEvent) -> Result<(), GraphError> {
        event.validate(param)?;
        let p = node.require_param(param, event.value())?;
        let res = match event {
            ParamEvent::SetValueAt { value, time } => p.set_value_at_time(value, time),
            ParamEvent::LinearRampTo { value, time } => p.linear_ramp_to_value_at_time(value, time),
            ParamEvent::ExponentialRampTo { value, time } => {
                p.exponential_ramp_to_value_at_time(value, time)
            }
        };
        res.map(|_| ()).map_err(backend)
    }

    fn start(&mut self, node: &WebNode, when: f64) -> Result<(), GraphError> {
        let src = node
            .scheduled()
            .ok_or(GraphError::InvalidState("not a source"))?;
        src.start_with_when(when.max(0.0)).map_err(backend)
    }

    fn stop(&mut self, node: &WebNode, when: f64) -> Result<(), GraphError> {
        let src = node
            .scheduled()
            .ok_or(GraphError::InvalidState("not a source"))?;
        if node.stopped.get() {
            return Err(GraphError::AlreadyReleased);
        }
        src.stop_with_when(when.max(0.0)).map_err(backend)?;
        node.stopped.set(true);
        Ok(())
    }

    fn disconnect(&mut self, node: &WebNode) -> Result<(), GraphError> {
        if node.disconnected.replace(true) {
            return Err(GraphError::AlreadyReleased);
        }
        node.audio_node().disconnect().map_err(backend)
    }
}
