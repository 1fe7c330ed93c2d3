//! Long-lived ambient drone layers and their shared reverb bus.
//!
//! A session is a handful of continuously running voices. Their loudness
//! (and, for the top layer, pitch) drifts because LFOs are wired straight
//! into the gain and frequency parameters: a constant-offset source holds
//! the centre value and a slow oscillator scaled by a gain node swings
//! around it. No further control messages are needed once it is built.
//!
//! Every node created here goes into a [`ResourceTracker`] so the session
//! can be torn down completely.

use crate::constants::{
    DEFAULT_Q, REVERB_DAMPING_HZ, REVERB_DELAY_SEC, REVERB_FEEDBACK, REVERB_MAX_DELAY_SEC,
};
use crate::error::GraphError;
use crate::graph::{AudioGraph, FilterKind, Param, Waveform};
use crate::tracker::ResourceTracker;

/// Slow vibrato applied to a layer's fundamental.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PitchWobble {
    pub rate_hz: f32,
    /// Peak deviation in Hz.
    pub depth_hz: f32,
}

/// One drone voice: a filtered fundamental plus a harmonic partial, with
/// amplitude modulation around `base_gain`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AmbientLayer {
    pub name: &'static str,
    pub fundamental_hz: f32,
    pub waveform: Waveform,
    pub base_gain: f32,
    pub filter_kind: FilterKind,
    pub filter_cutoff_hz: f32,
    pub filter_q: f32,
    /// Harmonic pitch as a multiple of the fundamental.
    pub harmonic_multiplier: f32,
    /// Harmonic level relative to the fundamental.
    pub harmonic_gain_ratio: f32,
    pub harmonic_waveform: Waveform,
    /// When set, the harmonic skips the layer filter and goes through its
    /// own highpass at this cutoff instead.
    pub harmonic_highpass_hz: Option<f32>,
    pub modulation_rate_hz: f32,
    /// Amplitude swing as a fraction of `base_gain`.
    pub modulation_depth: f32,
    pub pitch_wobble: Option<PitchWobble>,
}

pub const LOW_DRONE: AmbientLayer = AmbientLayer {
    name: "low",
    fundamental_hz: 43.0,
    waveform: Waveform::Sine,
    base_gain: 0.25,
    filter_kind: FilterKind::Lowpass,
    filter_cutoff_hz: 200.0,
    filter_q: 0.7,
    harmonic_multiplier: 2.0,
    harmonic_gain_ratio: 0.15,
    harmonic_waveform: Waveform::Sine,
    harmonic_highpass_hz: None,
    modulation_rate_hz: 0.08,
    modulation_depth: 0.03,
    pitch_wobble: None,
};

pub const MID_DRONE: AmbientLayer = AmbientLayer {
    name: "mid",
    fundamental_hz: 258.0,
    waveform: Waveform::Triangle,
    base_gain: 0.06,
    filter_kind: FilterKind::Bandpass,
    filter_cutoff_hz: 400.0,
    filter_q: 1.0,
    harmonic_multiplier: 2.0,
    harmonic_gain_ratio: 0.2,
    harmonic_waveform: Waveform::Triangle,
    harmonic_highpass_hz: None,
    modulation_rate_hz: 0.12,
    modulation_depth: 0.04,
    pitch_wobble: None,
};

pub const HIGH_TEXTURE: AmbientLayer = AmbientLayer {
    name: "high",
    fundamental_hz: 1032.0,
    waveform: Waveform::Square,
    base_gain: 0.012,
    filter_kind: FilterKind::Lowpass,
    filter_cutoff_hz: 2400.0,
    filter_q: 0.7,
    harmonic_multiplier: 2.0,
    harmonic_gain_ratio: 0.3,
    harmonic_waveform: Waveform::Sawtooth,
    harmonic_highpass_hz: Some(4000.0),
    modulation_rate_hz: 0.15,
    modulation_depth: 0.3,
    pitch_wobble: Some(PitchWobble {
        rate_hz: 0.05,
        depth_hz: 6.0,
    }),
};

/// The built-in profile: low, mid and high bands.
pub const AMBIENT_LAYERS: [AmbientLayer; 3] = [LOW_DRONE, MID_DRONE, HIGH_TEXTURE];

/// Build the shared feedback reverb and return its input.
///
/// `delay -> lowpass -> feedback gain -> delay`, with the lowpass output
/// also feeding `out`.
pub fn build_reverb_bus<G: AudioGraph>(
    graph: &mut G,
    out: &G::Node,
    tracker: &mut ResourceTracker<G::Node>,
) -> Result<G::Node, GraphError> {
    let delay = tracker.aux(graph.create_delay(REVERB_MAX_DELAY_SEC, REVERB_DELAY_SEC)?);
    let damping = tracker.aux(graph.create_filter(FilterKind::Lowpass, REVERB_DAMPING_HZ, DEFAULT_Q)?);
    let feedback = tracker.aux(graph.create_gain(REVERB_FEEDBACK)?);

    graph.connect(&delay, &damping)?;
    graph.connect(&damping, &feedback)?;
    graph.connect(&feedback, &delay)?;
    graph.connect(&damping, out)?;
    Ok(delay)
}

/// Build one layer, route it dry into `out` and wet into `reverb`, and start
/// all of its sources at `when`.
pub fn build_layer<G: AudioGraph>(
    graph: &mut G,
    layer: &AmbientLayer,
    out: &G::Node,
    reverb: &G::Node,
    tracker: &mut ResourceTracker<G::Node>,
    when: f64,
) -> Result<(), GraphError> {
    let mut sources = Vec::with_capacity(5);

    // Amplitude is driven entirely by the modulation inputs below.
    let amp = tracker.aux(graph.create_gain(0.0)?);
    let filter = tracker.aux(graph.create_filter(
        layer.filter_kind,
        layer.filter_cutoff_hz,
        layer.filter_q,
    )?);
    let osc = tracker.source(graph.create_oscillator(layer.waveform, layer.fundamental_hz)?);
    sources.push(osc.clone());
    graph.connect(&osc, &filter)?;
    graph.connect(&filter, &amp)?;

    let harmonic = tracker.source(graph.create_oscillator(
        layer.harmonic_waveform,
        layer.fundamental_hz * layer.harmonic_multiplier,
    )?);
    sources.push(harmonic.clone());
    let harmonic_gain = tracker.aux(graph.create_gain(layer.harmonic_gain_ratio)?);
    match layer.harmonic_highpass_hz {
        Some(cutoff) => {
            let hp = tracker.aux(graph.create_filter(FilterKind::Highpass, cutoff, DEFAULT_Q)?);
            graph.connect(&harmonic, &hp)?;
            graph.connect(&hp, &harmonic_gain)?;
            graph.connect(&harmonic_gain, &amp)?;
        }
        None => {
            graph.connect(&harmonic, &harmonic_gain)?;
            graph.connect(&harmonic_gain, &filter)?;
        }
    }

    let centre = tracker.source(graph.create_constant(layer.base_gain)?);
    let lfo = tracker.source(graph.create_oscillator(Waveform::Sine, layer.modulation_rate_hz)?);
    sources.push(centre.clone());
    sources.push(lfo.clone());
    let swing = tracker.aux(graph.create_gain(layer.base_gain * layer.modulation_depth)?);
    graph.connect(&lfo, &swing)?;
    graph.connect_param(&centre, &amp, Param::Gain)?;
    graph.connect_param(&swing, &amp, Param::Gain)?;

    if let Some(wobble) = layer.pitch_wobble {
        let pitch_lfo = tracker.source(graph.create_oscillator(Waveform::Sine, wobble.rate_hz)?);
        sources.push(pitch_lfo.clone());
        let pitch_depth = tracker.aux(graph.create_gain(wobble.depth_hz)?);
        graph.connect(&pitch_lfo, &pitch_depth)?;
        graph.connect_param(&pitch_depth, &osc, Param::Frequency)?;
    }

    graph.connect(&amp, out)?;
    graph.connect(&amp, reverb)?;

    for src in &sources {
        graph.start(src, when)?;
    }
    Ok(())
}

/// Build the reverb bus and every layer of `layers` into `out`.
///
/// On error, whatever was created stays in `tracker` for the caller to
/// release.
pub fn build_ambient<G: AudioGraph>(
    graph: &mut G,
    out: &G::Node,
    layers: &[AmbientLayer],
    tracker: &mut ResourceTracker<G::Node>,
) -> Result<(), GraphError> {
    let reverb = build_reverb_bus(graph, out, tracker)?;
    let now = graph.current_time();
    for layer in layers {
        build_layer(graph, layer, out, &reverb, tracker, now)?;
        log::debug!(
            "[ambient] layer '{}' at {:.1} Hz, gain {:.3}",
            layer.name,
            layer.fundamental_hz,
            layer.base_gain
        );
    }
    Ok(())
}
