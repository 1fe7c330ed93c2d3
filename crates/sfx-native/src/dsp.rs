//! Per-sample building blocks for the software renderer.

use std::f64::consts::TAU;

use sfx_core::{FilterKind, Waveform};

/// One sample of `waveform` at `phase` (cycles, `0..1`).
pub fn wave_sample(waveform: Waveform, phase: f64) -> f32 {
    let p = phase - phase.floor();
    let v = match waveform {
        Waveform::Sine => (p * TAU).sin(),
        Waveform::Square => {
            if p < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
        Waveform::Sawtooth => 2.0 * p - 1.0,
        Waveform::Triangle => 1.0 - 4.0 * (p - 0.5).abs(),
    };
    v as f32
}

/// Second-order IIR filter with RBJ cookbook coefficients, the response
/// a WebAudio `BiquadFilterNode` produces. Direct Form II Transposed.
///
/// As in WebAudio, `q` is a peak gain in dB for lowpass and highpass and a
/// plain quality factor for bandpass.
#[derive(Debug, Clone)]
pub struct Biquad {
    kind: FilterKind,
    frequency: f32,
    q: f32,
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    z1: f64,
    z2: f64,
}

impl Biquad {
    pub fn new(kind: FilterKind) -> Self {
        Self {
            kind,
            frequency: f32::NAN,
            q: f32::NAN,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
        }
    }

    fn update(&mut self, frequency: f32, q: f32, sample_rate: f32) {
        if frequency == self.frequency && q == self.q {
            return;
        }
        self.frequency = frequency;
        self.q = q;

        let nyquist = sample_rate as f64 * 0.5;
        let f = (frequency as f64).clamp(1.0, nyquist * 0.999);
        let w0 = TAU * f / sample_rate as f64;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let q = match self.kind {
            FilterKind::Lowpass | FilterKind::Highpass => 10f64.powf(q as f64 / 20.0),
            FilterKind::Bandpass => q as f64,
        };
        let alpha = sin_w0 / (2.0 * q.max(1e-4));

        let (b0, b1, b2) = match self.kind {
            FilterKind::Lowpass => {
                let b1 = 1.0 - cos_w0;
                (b1 / 2.0, b1, b1 / 2.0)
            }
            FilterKind::Highpass => {
                let b0 = (1.0 + cos_w0) / 2.0;
                (b0, -(1.0 + cos_w0), b0)
            }
            FilterKind::Bandpass => (alpha, 0.0, -alpha),
        };
        let a0 = 1.0 + alpha;
        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = -2.0 * cos_w0 / a0;
        self.a2 = (1.0 - alpha) / a0;
    }

    pub fn process(&mut self, input: f32, frequency: f32, q: f32, sample_rate: f32) -> f32 {
        self.update(frequency, q, sample_rate);
        let x = input as f64;
        let y = self.b0 * x + self.z1;
        self.z1 = self.b1 * x - self.a1 * y + self.z2;
        self.z2 = self.b2 * x - self.a2 * y;
        y as f32
    }
}

/// Mono ring buffer. Read before write each sample so a feedback loop
/// through it is always at least one delay long.
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<f32>,
    write: usize,
}

impl DelayLine {
    pub fn new(max_delay: f64, sample_rate: f32) -> Self {
        let len = (max_delay * sample_rate as f64).ceil() as usize + 1;
        Self {
            buffer: vec![0.0; len.max(2)],
            write: 0,
        }
    }

    pub fn read(&self, delay: f32, sample_rate: f32) -> f32 {
        let len = self.buffer.len();
        let samples = ((delay.max(0.0) * sample_rate) as usize).clamp(1, len - 1);
        self.buffer[(self.write + len - samples) % len]
    }

    pub fn write(&mut self, input: f32) {
        self.buffer[self.write] = input;
        self.write = (self.write + 1) % self.buffer.len();
    }
}
