//! Value types describing one primitive sound unit.

use crate::graph::Waveform;

/// A single enveloped oscillator note.
///
/// Fields:
/// - `frequency`: pitch in Hz
/// - `waveform`: oscillator shape
/// - `duration`: seconds from start until the envelope has decayed
/// - `volume`: peak gain reached after the attack
/// - `delay`: start offset in seconds from the moment the tone is issued
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToneSpec {
    pub frequency: f32,
    pub waveform: Waveform,
    pub duration: f64,
    pub volume: f32,
    pub delay: f64,
}

impl Default for ToneSpec {
    fn default() -> Self {
        Self {
            frequency: 440.0,
            waveform: Waveform::Sine,
            duration: 0.1,
            volume: 0.1,
            delay: 0.0,
        }
    }
}

impl ToneSpec {
    pub fn new(frequency: f32, waveform: Waveform, duration: f64) -> Self {
        Self {
            frequency,
            waveform,
            duration,
            ..Default::default()
        }
    }

    pub fn volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn delay(mut self, delay: f64) -> Self {
        self.delay = delay;
        self
    }
}

/// A highpassed white-noise burst that starts at `volume` and decays.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoiseSpec {
    pub duration: f64,
    pub volume: f32,
    pub delay: f64,
}

impl Default for NoiseSpec {
    fn default() -> Self {
        Self {
            duration: 0.05,
            volume: 0.05,
            delay: 0.0,
        }
    }
}

impl NoiseSpec {
    pub fn new(duration: f64, volume: f32) -> Self {
        Self {
            duration,
            volume,
            delay: 0.0,
        }
    }

    pub fn delay(mut self, delay: f64) -> Self {
        self.delay = delay;
        self
    }
}

/// An oscillator gliding exponentially from `start_hz` to `end_hz`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SweepSpec {
    pub start_hz: f32,
    pub end_hz: f32,
    pub duration: f64,
    pub waveform: Waveform,
    pub volume: f32,
    pub delay: f64,
}

impl Default for SweepSpec {
    fn default() -> Self {
        Self {
            start_hz: 200.0,
            end_hz: 800.0,
            duration: 0.15,
            waveform: Waveform::Sine,
            volume: 0.1,
            delay: 0.0,
        }
    }
}

impl SweepSpec {
    pub fn new(start_hz: f32, end_hz: f32, duration: f64, waveform: Waveform) -> Self {
        Self {
            start_hz,
            end_hz,
            duration,
            waveform,
            ..Default::default()
        }
    }

    pub fn volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn delay(mut self, delay: f64) -> Self {
        self.delay = delay;
        self
    }
}

/// One primitive call within an effect.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Voice {
    Tone(ToneSpec),
    Noise(NoiseSpec),
    Sweep(SweepSpec),
}

impl Voice {
    /// Start offset relative to the moment the effect is issued.
    pub fn delay(&self) -> f64 {
        match self {
            Voice::Tone(t) => t.delay,
            Voice::Noise(n) => n.delay,
            Voice::Sweep(s) => s.delay,
        }
    }

    pub fn duration(&self) -> f64 {
        match self {
            Voice::Tone(t) => t.duration,
            Voice::Noise(n) => n.duration,
            Voice::Sweep(s) => s.duration,
        }
    }

    /// Offset at which this voice falls silent.
    pub fn end(&self) -> f64 {
        self.delay() + self.duration()
    }
}

impl From<ToneSpec> for Voice {
    fn from(t: ToneSpec) -> Self {
        Voice::Tone(t)
    }
}

impl From<NoiseSpec> for Voice {
    fn from(n: NoiseSpec) -> Self {
        Voice::Noise(n)
    }
}

impl From<SweepSpec> for Voice {
    fn from(s: SweepSpec) -> Self {
        Voice::Sweep(s)
    }
}
