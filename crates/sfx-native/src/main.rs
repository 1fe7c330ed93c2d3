use std::thread;
use std::time::Duration;

use anyhow::Context;
use sfx_core::{Effect, EngineConfig, SoundEngine};

use sfx_native::NativeGraph;

const USAGE: &str = "usage: sfx-native <effect|ambient|list> [seconds]";

fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_else(|| "list".to_string());
    let seconds = args
        .next()
        .map(|s| s.parse::<f64>())
        .transpose()
        .context(USAGE)?;

    if command == "list" {
        for effect in Effect::ALL {
            println!("{}", effect.name());
        }
        println!("ambient");
        return Ok(());
    }

    let mut engine: SoundEngine<NativeGraph> = SoundEngine::new(EngineConfig::default());
    engine.init();
    if !engine.context_present() {
        anyhow::bail!("no audio output available");
    }
    pollster::block_on(engine.resume());

    if command == "ambient" {
        engine.start_ambient_music_from_analysis();
        hold(seconds.unwrap_or(10.0));
        engine.stop_ambient_music();
        // Let the last buffer drain.
        hold(0.1);
    } else {
        let effect: Effect = command
            .parse()
            .with_context(|| format!("{USAGE}\n(try `sfx-native list`)"))?;
        log::info!("[sfx] playing {effect}");
        engine.play(effect);
        hold(seconds.unwrap_or(1.5));
    }

    if let Some(graph) = engine.graph_mut() {
        graph.close();
    }
    Ok(())
}

fn hold(seconds: f64) {
    if seconds.is_finite() && seconds > 0.0 {
        thread::sleep(Duration::from_secs_f64(seconds));
    }
}
