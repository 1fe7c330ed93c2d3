//! Primitive synthesizers.
//!
//! Each call builds a short-lived, self-terminating sub-graph routed into
//! `out`: a source, an envelope gain, and for noise a highpass filter. Start
//! and stop times are computed from the graph clock at the moment of the
//! call. Nothing is tracked afterwards; the platform reclaims the nodes once
//! the source has stopped. A primitive that fails partway disconnects and
//! releases whatever it had already created.

use rand::Rng;
use smallvec::SmallVec;

use crate::automation::ParamEvent;
use crate::constants::{ATTACK_SEC, NOISE_HIGHPASS_HZ, NOISE_HIGHPASS_Q, SILENCE};
use crate::error::GraphError;
use crate::graph::{AudioGraph, FilterKind, Param};
use crate::tone::{NoiseSpec, SweepSpec, ToneSpec, Voice};

/// Oscillator with a short linear attack and an exponential decay.
///
/// Returns the oscillator handle, or `None` for a non-positive duration.
pub fn play_tone<G: AudioGraph>(
    graph: &mut G,
    out: &G::Node,
    spec: &ToneSpec,
) -> Result<Option<G::Node>, GraphError> {
    if !(spec.duration > 0.0) {
        return Ok(None);
    }
    let mut built = Built::new();
    let result = build_tone(graph, out, spec, &mut built);
    settle(graph, &built, result)
}

fn build_tone<G: AudioGraph>(
    graph: &mut G,
    out: &G::Node,
    spec: &ToneSpec,
    built: &mut Built<G::Node>,
) -> Result<G::Node, GraphError> {
    let start = graph.current_time() + spec.delay.max(0.0);
    let end = start + spec.duration;
    let attack = ATTACK_SEC.min(spec.duration / 2.0);

    let osc = keep(built, graph.create_oscillator(spec.waveform, spec.frequency)?);
    let env = keep(built, graph.create_gain(0.0)?);
    graph.schedule(&env, Param::Gain, ParamEvent::SetValueAt { value: 0.0, time: start })?;
    graph.schedule(
        &env,
        Param::Gain,
        ParamEvent::LinearRampTo {
            value: spec.volume,
            time: start + attack,
        },
    )?;
    graph.schedule(
        &env,
        Param::Gain,
        ParamEvent::ExponentialRampTo {
            value: SILENCE,
            time: end,
        },
    )?;

    graph.connect(&osc, &env)?;
    graph.connect(&env, out)?;
    graph.start(&osc, start)?;
    graph.stop(&osc, end)?;
    graph.schedule_release(&env, end);
    Ok(osc)
}

/// Uniform white noise in `[-1, 1]`, `len` samples long.
pub fn noise_buffer<R: Rng + ?Sized>(rng: &mut R, len: usize) -> Vec<f32> {
    (0..len).map(|_| rng.gen_range(-1.0_f32..=1.0)).collect()
}

/// Highpassed noise burst decaying from `spec.volume`.
pub fn play_noise<G: AudioGraph, R: Rng + ?Sized>(
    graph: &mut G,
    out: &G::Node,
    spec: &NoiseSpec,
    rng: &mut R,
) -> Result<Option<G::Node>, GraphError> {
    if !(spec.duration > 0.0) {
        return Ok(None);
    }
    let mut built = Built::new();
    let result = build_noise(graph, out, spec, rng, &mut built);
    settle(graph, &built, result)
}

fn build_noise<G: AudioGraph, R: Rng + ?Sized>(
    graph: &mut G,
    out: &G::Node,
    spec: &NoiseSpec,
    rng: &mut R,
    built: &mut Built<G::Node>,
) -> Result<G::Node, GraphError> {
    let start = graph.current_time() + spec.delay.max(0.0);
    let end = start + spec.duration;
    let len = ((graph.sample_rate() as f64 * spec.duration) as usize).max(1);
    let samples = noise_buffer(rng, len);

    let src = keep(built, graph.create_noise(&samples)?);
    let filter = keep(
        built,
        graph.create_filter(FilterKind::Highpass, NOISE_HIGHPASS_HZ, NOISE_HIGHPASS_Q)?,
    );
    let env = keep(built, graph.create_gain(spec.volume)?);
    decay_envelope(graph, &env, spec.volume, start, end)?;

    graph.connect(&src, &filter)?;
    graph.connect(&filter, &env)?;
    graph.connect(&env, out)?;
    graph.start(&src, start)?;
    graph.stop(&src, end)?;
    graph.schedule_release(&filter, end);
    graph.schedule_release(&env, end);
    Ok(src)
}

/// Oscillator whose pitch glides exponentially across the whole duration.
pub fn play_sweep<G: AudioGraph>(
    graph: &mut G,
    out: &G::Node,
    spec: &SweepSpec,
) -> Result<Option<G::Node>, GraphError> {
    if !(spec.duration > 0.0) {
        return Ok(None);
    }
    let mut built = Built::new();
    let result = build_sweep(graph, out, spec, &mut built);
    settle(graph, &built, result)
}

fn build_sweep<G: AudioGraph>(
    graph: &mut G,
    out: &G::Node,
    spec: &SweepSpec,
    built: &mut Built<G::Node>,
) -> Result<G::Node, GraphError> {
    let start = graph.current_time() + spec.delay.max(0.0);
    let end = start + spec.duration;

    let osc = keep(built, graph.create_oscillator(spec.waveform, spec.start_hz)?);
    graph.schedule(
        &osc,
        Param::Frequency,
        ParamEvent::SetValueAt {
            value: spec.start_hz,
            time: start,
        },
    )?;
    graph.schedule(
        &osc,
        Param::Frequency,
        ParamEvent::ExponentialRampTo {
            value: spec.end_hz,
            time: end,
        },
    )?;
    let env = keep(built, graph.create_gain(spec.volume)?);
    decay_envelope(graph, &env, spec.volume, start, end)?;

    graph.connect(&osc, &env)?;
    graph.connect(&env, out)?;
    graph.start(&osc, start)?;
    graph.stop(&osc, end)?;
    graph.schedule_release(&env, end);
    Ok(osc)
}

/// Dispatch one catalog voice to its primitive.
pub fn play_voice<G: AudioGraph, R: Rng + ?Sized>(
    graph: &mut G,
    out: &G::Node,
    voice: &Voice,
    rng: &mut R,
) -> Result<Option<G::Node>, GraphError> {
    match voice {
        Voice::Tone(t) => play_tone(graph, out, t),
        Voice::Noise(n) => play_noise(graph, out, n, rng),
        Voice::Sweep(s) => play_sweep(graph, out, s),
    }
}

/// Nodes a primitive has created so far.
type Built<N> = SmallVec<[N; 3]>;

fn keep<N: Clone>(built: &mut Built<N>, node: N) -> N {
    built.push(node.clone());
    node
}

/// On failure, cut the partial sub-graph loose and let the platform reclaim
/// it now; none of it will ever be stopped by a schedule.
fn settle<G: AudioGraph>(
    graph: &mut G,
    built: &[G::Node],
    result: Result<G::Node, GraphError>,
) -> Result<Option<G::Node>, GraphError> {
    if result.is_err() {
        let now = graph.current_time();
        for node in built {
            let _ = graph.disconnect(node);
            graph.schedule_release(node, now);
        }
    }
    result.map(Some)
}

fn decay_envelope<G: AudioGraph>(
    graph: &mut G,
    env: &G::Node,
    volume: f32,
    start: f64,
    end: f64,
) -> Result<(), GraphError> {
    graph.schedule(env, Param::Gain, ParamEvent::SetValueAt { value: volume, time: start })?;
    graph.schedule(
        env,
        Param::Gain,
        ParamEvent::ExponentialRampTo {
            value: SILENCE,
            time: end,
        },
    )
}
