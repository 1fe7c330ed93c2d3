// Synthesis tuning constants shared by the primitives, the effect catalog
// and the ambient builder.

// Envelopes
pub const ATTACK_SEC: f64 = 0.01; // linear fade-in at the head of every tone
pub const SILENCE: f32 = 0.001; // exponential ramps cannot reach zero; decay to this instead

// Noise bursts
pub const NOISE_HIGHPASS_HZ: f32 = 1000.0;
pub const NOISE_HIGHPASS_Q: f32 = 0.707;

// Default filter resonance
pub const DEFAULT_Q: f32 = 0.707;

// Sink defaults
pub const DEFAULT_MASTER_VOLUME: f32 = 0.5;
pub const DEFAULT_MUSIC_VOLUME: f32 = 0.3;

// Shared ambient reverb bus
pub const REVERB_DELAY_SEC: f64 = 0.3;
pub const REVERB_MAX_DELAY_SEC: f64 = 1.0;
pub const REVERB_DAMPING_HZ: f32 = 3000.0; // lowpass in the feedback path
pub const REVERB_FEEDBACK: f32 = 0.25;

// Typewriter
pub const TYPEWRITER_KEY_INTERVAL_SEC: f64 = 0.04;
pub const TYPEWRITER_CLICK_SEC: f64 = 0.015;
pub const TYPEWRITER_DEFAULT_CHARS: u32 = 5;
pub const TYPEWRITER_MAX_CHARS: u32 = 256; // longer requests are cut to this many keys

// Decrypt
pub const DECRYPT_STEPS: usize = 12;
pub const DECRYPT_STEP_SEC: f64 = 0.035;

/// Clamp a volume into `[0, 1]`. NaN counts as silence.
#[inline]
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
