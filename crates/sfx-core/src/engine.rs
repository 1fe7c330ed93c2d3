//! Engine lifecycle: acquisition, sinks, flags, volumes, and the public
//! effect and ambient entry points.

use std::future::Future;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::ambient::{build_ambient, AmbientLayer, AMBIENT_LAYERS};
use crate::catalog::Effect;
use crate::config::EngineConfig;
use crate::constants::{clamp_unit, TYPEWRITER_DEFAULT_CHARS};
use crate::error::GraphError;
use crate::graph::{AudioGraph, ContextState, Param};
use crate::synth;
use crate::tone::{NoiseSpec, SweepSpec, ToneSpec, Voice};
use crate::tracker::ResourceTracker;

/// An acquired graph and the two mixing points hanging off its output.
struct Context<G: AudioGraph> {
    graph: G,
    /// Every one-shot effect feeds this sink.
    master: G::Node,
    /// Every ambient layer feeds this sink.
    music: G::Node,
}

enum Acquisition<G: AudioGraph> {
    Pending,
    Ready(Context<G>),
    /// Acquisition failed; the engine stays silent for good.
    Unavailable,
}

/// Procedural sound effect and ambient music engine.
///
/// Owned by the application's composition root and handed to call sites by
/// reference. Single-writer: every method must be called from the same
/// control thread; the backend renders on its own real-time path and never
/// calls back into the engine.
///
/// No method fails. Without an audio subsystem every call is a silent no-op.
pub struct SoundEngine<G: AudioGraph> {
    acquisition: Acquisition<G>,
    enabled: bool,
    music_enabled: bool,
    master_volume: f32,
    music_volume: f32,
    ambient_playing: bool,
    ambient: ResourceTracker<G::Node>,
    rng: StdRng,
}

impl<G: AudioGraph> Default for SoundEngine<G> {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl<G: AudioGraph> SoundEngine<G> {
    /// Create an engine. Nothing is acquired until [`init`](Self::init).
    pub fn new(config: EngineConfig) -> Self {
        let config = config.sanitized();
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            acquisition: Acquisition::Pending,
            enabled: config.enabled,
            music_enabled: config.music_enabled,
            master_volume: config.master_volume,
            music_volume: config.music_volume,
            ambient_playing: false,
            ambient: ResourceTracker::new(),
            rng,
        }
    }

    // ---------------- Lifecycle ----------------

    /// Acquire the platform audio subsystem. Only the first call does
    /// anything.
    pub fn init(&mut self) {
        self.init_with(G::acquire);
    }

    /// [`init`](Self::init) with a caller-supplied acquisition step.
    pub fn init_with<F>(&mut self, acquire: F)
    where
        F: FnOnce() -> Result<G, GraphError>,
    {
        if !matches!(self.acquisition, Acquisition::Pending) {
            return;
        }
        self.acquisition = match acquire().and_then(|g| self.wire_sinks(g)) {
            Ok(ctx) => {
                log::info!(
                    "[sfx] audio ready ({} Hz, {:?})",
                    ctx.graph.sample_rate(),
                    ctx.graph.state()
                );
                Acquisition::Ready(ctx)
            }
            Err(e) => {
                log::warn!("[sfx] audio unavailable, effects disabled: {e}");
                Acquisition::Unavailable
            }
        };
    }

    fn wire_sinks(&self, mut graph: G) -> Result<Context<G>, GraphError> {
        let destination = graph.destination();
        let master = graph.create_gain(self.master_volume)?;
        let music = graph.create_gain(self.music_volume)?;
        graph.connect(&master, &destination)?;
        graph.connect(&music, &destination)?;
        Ok(Context {
            graph,
            master,
            music,
        })
    }

    /// Ask a suspended context to start rendering.
    ///
    /// Call after any user gesture. The returned future completes once the
    /// platform has complied; until then sounds are silently dropped.
    pub fn resume(&mut self) -> impl Future<Output = ()> + 'static {
        let pending = match &mut self.acquisition {
            Acquisition::Ready(ctx) if ctx.graph.state() == ContextState::Suspended => {
                Some(ctx.graph.resume())
            }
            _ => None,
        };
        async move {
            if let Some(fut) = pending {
                match fut.await {
                    Ok(()) => log::info!("[sfx] audio resumed"),
                    Err(e) => log::warn!("[sfx] resume failed: {e}"),
                }
            }
        }
    }

    // ---------------- Settings ----------------

    /// Gate one-shot effects. Ambient music is unaffected.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Master volume, clamped to `[0, 1]` and applied live.
    pub fn set_volume(&mut self, volume: f32) {
        self.master_volume = clamp_unit(volume);
        if let Acquisition::Ready(ctx) = &mut self.acquisition {
            if let Err(e) = ctx.graph.set_param(&ctx.master, Param::Gain, self.master_volume) {
                log::debug!("[sfx] master volume not applied: {e}");
            }
        }
    }

    /// Music volume, clamped to `[0, 1]`. A playing ambient session follows
    /// immediately.
    pub fn set_music_volume(&mut self, volume: f32) {
        self.music_volume = clamp_unit(volume);
        if let Acquisition::Ready(ctx) = &mut self.acquisition {
            if let Err(e) = ctx.graph.set_param(&ctx.music, Param::Gain, self.music_volume) {
                log::debug!("[sfx] music volume not applied: {e}");
            }
        }
    }

    /// Gate ambient music. Disabling stops a playing session.
    pub fn set_music_enabled(&mut self, enabled: bool) {
        self.music_enabled = enabled;
        if !enabled && self.ambient_playing {
            self.stop_ambient_music();
        }
    }

    // ---------------- Introspection ----------------

    pub fn context_present(&self) -> bool {
        matches!(self.acquisition, Acquisition::Ready(_))
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_music_enabled(&self) -> bool {
        self.music_enabled
    }

    pub fn volume(&self) -> f32 {
        self.master_volume
    }

    pub fn music_volume(&self) -> f32 {
        self.music_volume
    }

    pub fn is_ambient_playing(&self) -> bool {
        self.ambient_playing
    }

    /// Sources of the current ambient session.
    pub fn ambient_source_nodes(&self) -> &[G::Node] {
        self.ambient.sources()
    }

    /// Gains, filters and delays of the current ambient session.
    pub fn ambient_aux_nodes(&self) -> &[G::Node] {
        self.ambient.aux_nodes()
    }

    pub fn graph(&self) -> Option<&G> {
        match &self.acquisition {
            Acquisition::Ready(ctx) => Some(&ctx.graph),
            _ => None,
        }
    }

    pub fn graph_mut(&mut self) -> Option<&mut G> {
        match &mut self.acquisition {
            Acquisition::Ready(ctx) => Some(&mut ctx.graph),
            _ => None,
        }
    }

    pub fn master_sink(&self) -> Option<&G::Node> {
        match &self.acquisition {
            Acquisition::Ready(ctx) => Some(&ctx.master),
            _ => None,
        }
    }

    pub fn music_sink(&self) -> Option<&G::Node> {
        match &self.acquisition {
            Acquisition::Ready(ctx) => Some(&ctx.music),
            _ => None,
        }
    }

    // ---------------- Primitives ----------------

    pub fn play_tone(&mut self, spec: &ToneSpec) {
        self.play_voices(&[Voice::Tone(*spec)]);
    }

    pub fn play_noise(&mut self, spec: &NoiseSpec) {
        self.play_voices(&[Voice::Noise(*spec)]);
    }

    pub fn play_sweep(&mut self, spec: &SweepSpec) {
        self.play_voices(&[Voice::Sweep(*spec)]);
    }

    /// Issue a batch of voices into the master sink. Offsets are measured
    /// from the graph clock as each voice is issued.
    pub fn play_voices(&mut self, voices: &[Voice]) {
        if !self.enabled {
            return;
        }
        let Acquisition::Ready(ctx) = &mut self.acquisition else {
            return;
        };
        for voice in voices {
            if let Err(e) = synth::play_voice(&mut ctx.graph, &ctx.master, voice, &mut self.rng) {
                log::debug!("[sfx] voice dropped: {e}");
            }
        }
    }

    // ---------------- Effect catalog ----------------

    pub fn play(&mut self, effect: Effect) {
        if !self.enabled || !self.context_present() {
            return;
        }
        let voices = effect.voices(&mut self.rng);
        log::trace!("[sfx] {effect}: {} voices", voices.len());
        self.play_voices(&voices);
    }

    pub fn hover(&mut self) {
        self.play(Effect::Hover);
    }

    pub fn click(&mut self) {
        self.play(Effect::Click);
    }

    pub fn success(&mut self) {
        self.play(Effect::Success);
    }

    pub fn error(&mut self) {
        self.play(Effect::Error);
    }

    pub fn warning(&mut self) {
        self.play(Effect::Warning);
    }

    pub fn open(&mut self) {
        self.play(Effect::Open);
    }

    pub fn close(&mut self) {
        self.play(Effect::Close);
    }

    pub fn boot(&mut self) {
        self.play(Effect::Boot);
    }

    pub fn notification(&mut self) {
        self.play(Effect::Notification);
    }

    pub fn scan(&mut self) {
        self.play(Effect::Scan);
    }

    pub fn add_to_cart(&mut self) {
        self.play(Effect::AddToCart);
    }

    pub fn transaction(&mut self) {
        self.play(Effect::Transaction);
    }

    pub fn connect(&mut self) {
        self.play(Effect::Connect);
    }

    pub fn disconnect(&mut self) {
        self.play(Effect::Disconnect);
    }

    pub fn glitch(&mut self) {
        self.play(Effect::Glitch);
    }

    pub fn decrypt(&mut self) {
        self.play(Effect::Decrypt);
    }

    pub fn panel_open(&mut self) {
        self.play(Effect::PanelOpen);
    }

    pub fn panel_close(&mut self) {
        self.play(Effect::PanelClose);
    }

    /// One key click per character.
    pub fn typewriter(&mut self, char_count: u32) {
        self.play(Effect::Typewriter(char_count));
    }

    /// [`typewriter`](Self::typewriter) with the default five characters.
    pub fn typewriter_default(&mut self) {
        self.typewriter(TYPEWRITER_DEFAULT_CHARS);
    }

    // ---------------- Ambient music ----------------

    /// Start the built-in three-layer drone.
    pub fn start_ambient_music_from_analysis(&mut self) {
        self.start_ambient_music_with(&AMBIENT_LAYERS);
    }

    /// Start a drone built from `layers`. No-op if already playing, if music
    /// is disabled, or without an audio subsystem.
    pub fn start_ambient_music_with(&mut self, layers: &[AmbientLayer]) {
        if self.ambient_playing || !self.music_enabled || layers.is_empty() {
            return;
        }
        let Acquisition::Ready(ctx) = &mut self.acquisition else {
            return;
        };
        match build_ambient(&mut ctx.graph, &ctx.music, layers, &mut self.ambient) {
            Ok(()) => {
                self.ambient_playing = true;
                log::info!(
                    "[ambient] started: {} layers, {} sources, {} nodes",
                    layers.len(),
                    self.ambient.sources().len(),
                    self.ambient.aux_nodes().len()
                );
            }
            Err(e) => {
                log::warn!("[ambient] build failed, tearing down: {e}");
                self.ambient.release_all(&mut ctx.graph);
            }
        }
    }

    /// Stop and disconnect every ambient node. Safe to call repeatedly.
    pub fn stop_ambient_music(&mut self) {
        if !self.ambient_playing {
            return;
        }
        if let Acquisition::Ready(ctx) = &mut self.acquisition {
            let report = self.ambient.release_all(&mut ctx.graph);
            log::info!(
                "[ambient] stopped: {} sources stopped, {} nodes disconnected, {} already released",
                report.stopped,
                report.disconnected,
                report.already_released
            );
        }
        self.ambient_playing = false;
    }
}
