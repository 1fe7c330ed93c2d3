use std::future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use sfx_core::{
    AudioGraph, ContextState, FilterKind, GraphError, Param, ParamEvent, ResumeFuture, Waveform,
};

use crate::render::{NodeId, Renderer};

/// [`AudioGraph`] rendered in software and played through the default
/// cpal output device.
pub struct NativeGraph {
    shared: Arc<Mutex<Renderer>>,
    stream: Option<cpal::Stream>,
    closed: bool,
}

impl NativeGraph {
    /// A graph with no output device, rendered on demand with
    /// [`render`](Self::render).
    pub fn offline(sample_rate: f32) -> Self {
        let mut renderer = Renderer::new(sample_rate);
        renderer.set_running(true);
        Self {
            shared: Arc::new(Mutex::new(renderer)),
            stream: None,
            closed: false,
        }
    }

    fn renderer(&self) -> MutexGuard<'_, Renderer> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pull `frames` mono samples. Only meaningful for offline graphs; a
    /// live stream is pulling from the same renderer.
    pub fn render(&mut self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames];
        self.renderer().render(&mut out);
        out
    }

    pub fn node_count(&self) -> usize {
        self.renderer().node_count()
    }

    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::debug!("[audio] pause on close failed: {e}");
            }
        }
        self.renderer().set_running(false);
        self.closed = true;
    }
}

impl AudioGraph for NativeGraph {
    type Node = NodeId;

    fn acquire() -> Result<Self, GraphError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| GraphError::Unavailable("no output device".into()))?;
        let config = device
            .default_output_config()
            .map_err(|e| GraphError::Unavailable(e.to_string()))?;
        let sample_rate = config.sample_rate().0 as f32;
        let channels = config.channels() as usize;
        log::info!(
            "[audio] {} @ {} Hz, {} ch, {:?}",
            device.name().unwrap_or_else(|_| "output".into()),
            sample_rate,
            channels,
            config.sample_format()
        );

        let shared = Arc::new(Mutex::new(Renderer::new(sample_rate)));
        let err_fn = |err| log::error!("[audio] stream error: {err}");
        let stream_config: cpal::StreamConfig = config.clone().into();
        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => {
                build_stream::<f32>(&device, &stream_config, channels, Arc::clone(&shared), err_fn)
            }
            cpal::SampleFormat::I16 => {
                build_stream::<i16>(&device, &stream_config, channels, Arc::clone(&shared), err_fn)
            }
            cpal::SampleFormat::U16 => {
                build_stream::<u16>(&device, &stream_config, channels, Arc::clone(&shared), err_fn)
            }
            other => {
                return Err(GraphError::Unavailable(format!(
                    "unsupported sample format {other:?}"
                )))
            }
        }
        .map_err(|e| GraphError::Unavailable(e.to_string()))?;

        stream
            .play()
            .map_err(|e| GraphError::Unavailable(e.to_string()))?;
        shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_running(true);

        Ok(Self {
            shared,
            stream: Some(stream),
            closed: false,
        })
    }

    fn state(&self) -> ContextState {
        if self.closed {
            ContextState::Closed
        } else if self.renderer().is_running() {
            ContextState::Running
        } else {
            ContextState::Suspended
        }
    }

    fn resume(&mut self) -> ResumeFuture {
        let result = if self.closed {
            Err(GraphError::InvalidState("context closed"))
        } else {
            let played = match &self.stream {
                Some(stream) => stream.play().map_err(|e| GraphError::Backend(e.to_string())),
                None => Ok(()),
            };
            played.map(|()| self.renderer().set_running(true))
        };
        Box::pin(future::ready(result))
    }

    fn current_time(&self) -> f64 {
        self.renderer().time()
    }

    fn sample_rate(&self) -> f32 {
        self.renderer().sample_rate()
    }

    fn destination(&self) -> NodeId {
        self.renderer().destination()
    }

    fn create_oscillator(&mut self, waveform: Waveform, frequency: f32) -> Result<NodeId, GraphError> {
        self.renderer().add_oscillator(waveform, frequency)
    }

    fn create_noise(&mut self, samples: &[f32]) -> Result<NodeId, GraphError> {
        self.renderer().add_buffer(samples)
    }

    fn create_constant(&mut self, offset: f32) -> Result<NodeId, GraphError> {
        self.renderer().add_constant(offset)
    }

    fn create_gain(&mut self, gain: f32) -> Result<NodeId, GraphError> {
        self.renderer().add_gain(gain)
    }

    fn create_filter(&mut self, kind: FilterKind, frequency: f32, q: f32) -> Result<NodeId, GraphError> {
        self.renderer().add_filter(kind, frequency, q)
    }

    fn create_delay(&mut self, max_delay: f64, delay: f64) -> Result<NodeId, GraphError> {
        self.renderer().add_delay(max_delay, delay)
    }

    fn connect(&mut self, from: &NodeId, to: &NodeId) -> Result<(), GraphError> {
        let mut renderer = self.renderer();
        renderer.connect(*from, *to)?;
        renderer.commit();
        Ok(())
    }

    fn connect_param(&mut self, from: &NodeId, to: &NodeId, param: Param) -> Result<(), GraphError> {
        let mut renderer = self.renderer();
        renderer.connect_param(*from, *to, param)?;
        renderer.commit();
        Ok(())
    }

    fn set_param(&mut self, node: &NodeId, param: Param, value: f32) -> Result<(), GraphError> {
        self.renderer().set_param(*node, param, value)
    }

    fn param_value(&self, node: &NodeId, param: Param) -> Result<f32, GraphError> {
        self.renderer().param_value(*node, param)
    }

    fn schedule(&mut self, node: &NodeId, param: Param, event: ParamEvent) -> Result<(), GraphError> {
        self.renderer().schedule(*node, param, event)
    }

    fn start(&mut self, node: &NodeId, when: f64) -> Result<(), GraphError> {
        self.renderer().start(*node, when)
    }

    fn stop(&mut self, node: &NodeId, when: f64) -> Result<(), GraphError> {
        self.renderer().stop(*node, when)
    }

    fn disconnect(&mut self, node: &NodeId) -> Result<(), GraphError> {
        self.renderer().disconnect(*node)
    }

    fn schedule_release(&mut self, node: &NodeId, when: f64) {
        self.renderer().release_at(*node, when);
    }
}

/// Output stream pulling mono samples from the renderer and copying each
/// one to every channel of the frame.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    shared: Arc<Mutex<Renderer>>,
    err_fn: impl FnMut(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let mut renderer = shared.lock().unwrap_or_else(PoisonError::into_inner);
            for frame in data.chunks_mut(channels.max(1)) {
                let sample = T::from_sample(renderer.next_sample());
                for out in frame.iter_mut() {
                    *out = sample;
                }
            }
        },
        err_fn,
        None,
    )
}
