// Host-side integration tests for the engine lifecycle, the effect catalog
// and ambient sessions, run against the in-memory recording graph.

use sfx_core::recording::{NodeId, RecordedNode};
use sfx_core::{
    AudioGraph, ContextState, EngineConfig, GraphError, NoiseSpec, Param, RecordingGraph,
    SoundEngine, SweepSpec, ToneSpec, Voice, Waveform,
};

fn make_engine() -> SoundEngine<RecordingGraph> {
    let mut engine = SoundEngine::new(EngineConfig::default().with_seed(42));
    engine.init();
    engine
}

fn graph(engine: &SoundEngine<RecordingGraph>) -> &RecordingGraph {
    engine.graph().expect("engine initialised")
}

/// Oscillators created after the first `since` nodes, in creation order.
fn oscillators_since(g: &RecordingGraph, since: usize) -> Vec<(NodeId, &RecordedNode)> {
    g.oscillators()
        .into_iter()
        .filter(|(id, _)| *id as usize >= since)
        .collect()
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

// ---------------- Lifecycle ----------------

#[test]
fn init_is_idempotent() {
    let mut engine = make_engine();
    let nodes = graph(&engine).node_count();
    assert_eq!(nodes, 3, "destination plus master and music sinks");
    engine.init();
    engine.init();
    assert_eq!(graph(&engine).node_count(), nodes);
    assert!(engine.context_present());
}

#[test]
fn unavailable_subsystem_degrades_to_silence_for_good() {
    let mut engine: SoundEngine<RecordingGraph> = SoundEngine::default();
    engine.init_with(|| Err(GraphError::Unavailable("no output device".into())));
    assert!(!engine.context_present());

    engine.click();
    engine.start_ambient_music_from_analysis();
    assert!(!engine.is_ambient_playing());
    engine.stop_ambient_music();

    // A later init does not retry.
    engine.init();
    assert!(!engine.context_present());
    assert!(engine.graph().is_none());
}

#[test]
fn effects_before_init_are_silent_no_ops() {
    let mut engine: SoundEngine<RecordingGraph> = SoundEngine::default();
    engine.click();
    engine.success();
    engine.typewriter(3);
    engine.stop_ambient_music();
    assert!(engine.graph().is_none());

    engine.init();
    assert_eq!(graph(&engine).node_count(), 3);
}

#[test]
fn resume_wakes_a_suspended_context() {
    let mut engine: SoundEngine<RecordingGraph> = SoundEngine::default();
    engine.init_with(|| Ok(RecordingGraph::suspended()));
    assert_eq!(graph(&engine).state(), ContextState::Suspended);

    pollster::block_on(engine.resume());
    assert_eq!(graph(&engine).state(), ContextState::Running);

    // Resuming a running context is a no-op.
    pollster::block_on(engine.resume());
    assert_eq!(graph(&engine).state(), ContextState::Running);
}

#[test]
fn resume_without_context_completes() {
    let mut engine: SoundEngine<RecordingGraph> = SoundEngine::default();
    pollster::block_on(engine.resume());
    assert!(!engine.context_present());
}

// ---------------- Volumes and flags ----------------

#[test]
fn volumes_are_clamped_and_applied_live() {
    let mut engine = make_engine();
    let master = *engine.master_sink().unwrap();

    engine.set_volume(-1.0);
    assert_eq!(engine.volume(), 0.0);
    assert_eq!(graph(&engine).param_value(&master, Param::Gain), Ok(0.0));

    engine.set_volume(5.0);
    assert_eq!(engine.volume(), 1.0);
    assert_eq!(graph(&engine).param_value(&master, Param::Gain), Ok(1.0));

    engine.set_music_volume(2.0);
    assert_eq!(engine.music_volume(), 1.0);
    engine.set_music_volume(-0.5);
    assert_eq!(engine.music_volume(), 0.0);
}

#[test]
fn music_volume_reaches_a_playing_session() {
    let mut engine = make_engine();
    engine.start_ambient_music_from_analysis();
    assert!(engine.is_ambient_playing());

    engine.set_music_volume(0.7);
    let music = *engine.music_sink().unwrap();
    let live = graph(&engine).param_value(&music, Param::Gain).unwrap();
    assert!((live - 0.7).abs() < 1e-6);
}

#[test]
fn disabling_effects_leaves_ambient_music_alone() {
    let mut engine = make_engine();
    engine.set_enabled(false);
    let before = graph(&engine).node_count();
    engine.click();
    engine.boot();
    engine.typewriter(4);
    assert_eq!(graph(&engine).node_count(), before);

    engine.start_ambient_music_from_analysis();
    assert!(engine.is_ambient_playing());
    engine.set_enabled(false);
    assert!(engine.is_ambient_playing());

    engine.set_music_enabled(false);
    assert!(!engine.is_ambient_playing());
    assert!(engine.ambient_source_nodes().is_empty());
}

#[test]
fn disabling_does_not_cut_sounds_already_in_flight() {
    let mut engine = make_engine();
    let since = graph(&engine).node_count();
    engine.click();
    let stop_before: Vec<_> = oscillators_since(graph(&engine), since)
        .iter()
        .map(|(_, n)| n.stop)
        .collect();
    engine.set_enabled(false);
    let stop_after: Vec<_> = oscillators_since(graph(&engine), since)
        .iter()
        .map(|(_, n)| n.stop)
        .collect();
    assert_eq!(stop_before, stop_after);
    assert!(!stop_after.is_empty());
}

#[test]
fn music_disabled_blocks_ambient_start() {
    let mut engine = make_engine();
    engine.set_music_enabled(false);
    engine.start_ambient_music_from_analysis();
    assert!(!engine.is_ambient_playing());
    assert!(engine.ambient_source_nodes().is_empty());

    engine.set_music_enabled(true);
    engine.start_ambient_music_from_analysis();
    assert!(engine.is_ambient_playing());
}

// ---------------- Effect scenarios ----------------

#[test]
fn success_chime_schedules_three_ascending_tones() {
    let mut engine = make_engine();
    engine.graph_mut().unwrap().advance(1.5);
    let t = graph(&engine).current_time();
    let since = graph(&engine).node_count();

    engine.success();

    let tones = oscillators_since(graph(&engine), since);
    assert_eq!(tones.len(), 3);
    let expected = [(0.0, 440.0, 0.15), (0.08, 554.0, 0.15), (0.16, 659.0, 0.25)];
    for ((_, node), (offset, hz, dur)) in tones.iter().zip(expected) {
        let start = node.start.unwrap();
        let stop = node.stop.unwrap();
        assert!(approx(start - t, offset), "start offset {}", start - t);
        assert!(approx(stop - start, dur), "duration {}", stop - start);
        assert_eq!(node.initial(Param::Frequency), Some(hz));
    }
}

#[test]
fn typewriter_schedules_one_pair_per_character() {
    let mut engine = make_engine();
    engine.typewriter(6);

    let g = graph(&engine);
    let tones = g.oscillators();
    let noises = g.noise_sources();
    assert_eq!(tones.len(), 6);
    assert_eq!(noises.len(), 6);
    for i in 0..6 {
        let at = 0.04 * i as f64;
        assert!(approx(tones[i].1.start.unwrap(), at));
        assert!(approx(noises[i].1.start.unwrap(), at));
    }
    let first = tones.iter().map(|(_, n)| n.start.unwrap()).fold(f64::MAX, f64::min);
    let last = tones.iter().map(|(_, n)| n.stop.unwrap()).fold(0.0, f64::max);
    assert!(approx(last - first, 0.04 * 5.0 + 0.015));
}

#[test]
fn default_typewriter_has_five_keys() {
    let mut engine = make_engine();
    let since = graph(&engine).node_count();
    engine.typewriter_default();
    assert_eq!(oscillators_since(graph(&engine), since).len(), 5);
}

#[test]
fn oversized_typewriter_requests_are_capped() {
    let mut engine = make_engine();
    let since = graph(&engine).node_count();
    engine.typewriter(u32::MAX);
    let keys = oscillators_since(graph(&engine), since).len();
    assert_eq!(keys, sfx_core::constants::TYPEWRITER_MAX_CHARS as usize);

    let since = graph(&engine).node_count();
    engine.play("typewriter:4294967295".parse().unwrap());
    assert_eq!(oscillators_since(graph(&engine), since).len(), keys);
}

#[test]
fn rejected_voices_do_not_leak_nodes() {
    let mut engine = make_engine();
    let sinks = graph(&engine).node_count();
    engine.play_voices(&[
        Voice::Sweep(SweepSpec::new(200.0, 0.0, 0.3, Waveform::Sine)),
        Voice::Tone(ToneSpec::new(440.0, Waveform::Sine, 0.2).volume(f32::NAN)),
        Voice::Noise(NoiseSpec::new(0.1, f32::NAN)),
    ]);
    engine.click();

    engine.graph_mut().unwrap().advance(1.0);
    let g = graph(&engine);
    assert_eq!(g.live_sources(), 0);
    for (id, node) in g.nodes().skip(sinks) {
        assert!(node.released, "node {id} still live");
    }
}

#[test]
fn decrypt_scrambles_twelve_tones_then_chirps() {
    let mut engine = make_engine();
    let since = graph(&engine).node_count();
    engine.decrypt();

    let tones = oscillators_since(graph(&engine), since);
    assert_eq!(tones.len(), 14);
    for (i, (_, n)) in tones.iter().take(12).enumerate() {
        assert!(approx(n.start.unwrap(), 0.035 * i as f64));
        let hz = n.initial(Param::Frequency).unwrap();
        assert!((400.0..1600.0).contains(&hz));
    }
    assert!(tones[12].1.start.unwrap() > tones[11].1.start.unwrap());
}

#[test]
fn every_named_effect_schedules_sound_into_the_master_sink() {
    let mut engine = make_engine();
    let master = *engine.master_sink().unwrap();
    let calls: [fn(&mut SoundEngine<RecordingGraph>); 19] = [
        SoundEngine::hover,
        SoundEngine::click,
        SoundEngine::success,
        SoundEngine::error,
        SoundEngine::warning,
        SoundEngine::open,
        SoundEngine::close,
        SoundEngine::boot,
        SoundEngine::notification,
        SoundEngine::scan,
        SoundEngine::add_to_cart,
        SoundEngine::transaction,
        SoundEngine::connect,
        SoundEngine::disconnect,
        SoundEngine::glitch,
        SoundEngine::decrypt,
        SoundEngine::panel_open,
        SoundEngine::panel_close,
        SoundEngine::typewriter_default,
    ];
    for call in calls {
        let since = graph(&engine).node_count();
        call(&mut engine);
        let g = graph(&engine);
        let new_nodes: Vec<_> = g.nodes().skip(since).collect();
        assert!(!new_nodes.is_empty());
        assert!(
            new_nodes.iter().any(|(_, n)| n.outputs.contains(&master)),
            "effect not routed to master"
        );
    }
    assert!(engine.ambient_source_nodes().is_empty());
    assert!(engine.ambient_aux_nodes().is_empty());
}

#[test]
fn one_shots_are_reclaimed_once_finished() {
    let mut engine = make_engine();
    engine.success();
    assert_eq!(graph(&engine).live_sources(), 3);
    engine.graph_mut().unwrap().advance(1.0);
    assert_eq!(graph(&engine).live_sources(), 0);
}

// ---------------- Ambient sessions ----------------

#[test]
fn starting_twice_keeps_a_single_session() {
    let mut engine = make_engine();
    engine.start_ambient_music_from_analysis();
    let sources = engine.ambient_source_nodes().len();
    let nodes = graph(&engine).node_count();
    assert!(sources > 0);

    engine.start_ambient_music_from_analysis();
    assert_eq!(engine.ambient_source_nodes().len(), sources);
    assert_eq!(graph(&engine).node_count(), nodes);
}

#[test]
fn stop_releases_every_tracked_node() {
    let mut engine = make_engine();
    engine.start_ambient_music_from_analysis();
    let sources = engine.ambient_source_nodes().to_vec();
    let aux = engine.ambient_aux_nodes().to_vec();
    assert!(!aux.is_empty());

    engine.stop_ambient_music();
    assert!(!engine.is_ambient_playing());
    assert!(engine.ambient_source_nodes().is_empty());
    assert!(engine.ambient_aux_nodes().is_empty());

    let g = graph(&engine);
    for id in sources {
        let n = g.node(id).unwrap();
        assert!(n.released && n.disconnected);
    }
    for id in aux {
        assert!(g.node(id).unwrap().disconnected);
    }
    assert_eq!(g.live_sources(), 0);
}

#[test]
fn stop_when_idle_changes_nothing() {
    let mut engine = make_engine();
    let nodes = graph(&engine).node_count();
    engine.stop_ambient_music();
    engine.stop_ambient_music();
    assert!(!engine.is_ambient_playing());
    assert_eq!(graph(&engine).node_count(), nodes);
}

#[test]
fn stop_tolerates_nodes_the_platform_already_released() {
    let mut engine = make_engine();
    engine.start_ambient_music_from_analysis();
    let victim_src = engine.ambient_source_nodes()[0];
    let victim_aux = engine.ambient_aux_nodes()[0];
    engine.graph_mut().unwrap().release(victim_src);
    engine.graph_mut().unwrap().release(victim_aux);

    engine.stop_ambient_music();
    engine.stop_ambient_music();
    assert!(!engine.is_ambient_playing());
    assert!(engine.ambient_source_nodes().is_empty());
}

#[test]
fn ambient_can_restart_after_stop() {
    let mut engine = make_engine();
    engine.start_ambient_music_from_analysis();
    let first = engine.ambient_source_nodes().len();
    engine.stop_ambient_music();
    engine.start_ambient_music_from_analysis();
    assert!(engine.is_ambient_playing());
    assert_eq!(engine.ambient_source_nodes().len(), first);
}

#[test]
fn playing_flag_tracks_source_list() {
    let mut engine = make_engine();
    let check = |e: &SoundEngine<RecordingGraph>| {
        assert_eq!(e.is_ambient_playing(), !e.ambient_source_nodes().is_empty());
    };
    check(&engine);
    engine.start_ambient_music_from_analysis();
    check(&engine);
    engine.click();
    check(&engine);
    engine.set_music_enabled(false);
    check(&engine);
    engine.stop_ambient_music();
    check(&engine);
}

#[test]
fn ambient_layers_feed_the_music_sink_only() {
    let mut engine = make_engine();
    engine.start_ambient_music_from_analysis();
    let master = *engine.master_sink().unwrap();
    let music = *engine.music_sink().unwrap();
    let g = graph(&engine);

    let into_music = engine
        .ambient_aux_nodes()
        .iter()
        .filter(|id| g.node(**id).unwrap().outputs.contains(&music))
        .count();
    // One dry feed per layer plus the reverb return.
    assert_eq!(into_music, 4);
    assert!(engine
        .ambient_aux_nodes()
        .iter()
        .chain(engine.ambient_source_nodes())
        .all(|id| !g.node(*id).unwrap().outputs.contains(&master)));
}

#[test]
fn ambient_sources_run_until_stopped() {
    let mut engine = make_engine();
    engine.start_ambient_music_from_analysis();
    engine.graph_mut().unwrap().advance(600.0);
    let g = graph(&engine);
    for id in engine.ambient_source_nodes() {
        let n = g.node(*id).unwrap();
        assert_eq!(n.start, Some(0.0));
        assert!(!n.released);
    }
}
