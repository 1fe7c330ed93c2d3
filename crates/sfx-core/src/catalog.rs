//! The fixed library of named one-shot effects.
//!
//! Every effect is plain data: a list of primitive [`Voice`]s with their own
//! start offsets. Playing an effect just issues each voice in turn; the
//! offsets are relative to the graph clock at issue time.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use smallvec::{smallvec, SmallVec};

use crate::constants::{
    DECRYPT_STEPS, DECRYPT_STEP_SEC, TYPEWRITER_CLICK_SEC, TYPEWRITER_DEFAULT_CHARS,
    TYPEWRITER_KEY_INTERVAL_SEC, TYPEWRITER_MAX_CHARS,
};
use crate::graph::Waveform::{Sawtooth, Sine, Square, Triangle};
use crate::tone::{NoiseSpec, SweepSpec, ToneSpec, Voice};

pub type Voices = SmallVec<[Voice; 8]>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Effect {
    Hover,
    Click,
    Success,
    Error,
    Warning,
    Open,
    Close,
    Boot,
    Notification,
    Scan,
    AddToCart,
    Transaction,
    Connect,
    Disconnect,
    Glitch,
    /// One key click per character, at most
    /// [`TYPEWRITER_MAX_CHARS`](crate::constants::TYPEWRITER_MAX_CHARS).
    Typewriter(u32),
    Decrypt,
    PanelOpen,
    PanelClose,
}

impl Effect {
    /// Every effect, with the typewriter at its default length.
    pub const ALL: [Effect; 19] = [
        Effect::Hover,
        Effect::Click,
        Effect::Success,
        Effect::Error,
        Effect::Warning,
        Effect::Open,
        Effect::Close,
        Effect::Boot,
        Effect::Notification,
        Effect::Scan,
        Effect::AddToCart,
        Effect::Transaction,
        Effect::Connect,
        Effect::Disconnect,
        Effect::Glitch,
        Effect::Typewriter(TYPEWRITER_DEFAULT_CHARS),
        Effect::Decrypt,
        Effect::PanelOpen,
        Effect::PanelClose,
    ];

    /// Host-facing name.
    pub fn name(&self) -> &'static str {
        match self {
            Effect::Hover => "hover",
            Effect::Click => "click",
            Effect::Success => "success",
            Effect::Error => "error",
            Effect::Warning => "warning",
            Effect::Open => "open",
            Effect::Close => "close",
            Effect::Boot => "boot",
            Effect::Notification => "notification",
            Effect::Scan => "scan",
            Effect::AddToCart => "add-to-cart",
            Effect::Transaction => "transaction",
            Effect::Connect => "connect",
            Effect::Disconnect => "disconnect",
            Effect::Glitch => "glitch",
            Effect::Typewriter(_) => "typewriter",
            Effect::Decrypt => "decrypt",
            Effect::PanelOpen => "panel-open",
            Effect::PanelClose => "panel-close",
        }
    }

    /// Expand the effect into the primitive voices that realise it.
    ///
    /// Only `Glitch`, `Typewriter` and `Decrypt` draw from `rng`.
    pub fn voices<R: Rng + ?Sized>(&self, rng: &mut R) -> Voices {
        match *self {
            Effect::Hover => smallvec![ToneSpec::new(800.0, Sine, 0.05).volume(0.05).into()],
            Effect::Click => smallvec![
                ToneSpec::new(1200.0, Square, 0.03).volume(0.06).into(),
                NoiseSpec::new(0.02, 0.04).into(),
            ],
            Effect::Success => smallvec![
                ToneSpec::new(440.0, Sine, 0.15).volume(0.15).into(),
                ToneSpec::new(554.0, Sine, 0.15).volume(0.15).delay(0.08).into(),
                ToneSpec::new(659.0, Sine, 0.25).volume(0.15).delay(0.16).into(),
            ],
            Effect::Error => smallvec![
                ToneSpec::new(200.0, Sawtooth, 0.15).volume(0.12).into(),
                ToneSpec::new(150.0, Sawtooth, 0.25).volume(0.12).delay(0.15).into(),
            ],
            Effect::Warning => smallvec![
                ToneSpec::new(600.0, Square, 0.1).volume(0.08).into(),
                ToneSpec::new(600.0, Square, 0.1).volume(0.08).delay(0.15).into(),
            ],
            Effect::Open => smallvec![SweepSpec::new(300.0, 900.0, 0.15, Sine).volume(0.1).into()],
            Effect::Close => smallvec![SweepSpec::new(900.0, 300.0, 0.15, Sine).volume(0.1).into()],
            Effect::Boot => smallvec![
                SweepSpec::new(110.0, 880.0, 0.6, Sine).volume(0.08).into(),
                ToneSpec::new(220.0, Triangle, 0.2).volume(0.1).into(),
                ToneSpec::new(330.0, Triangle, 0.2).volume(0.1).delay(0.1).into(),
                ToneSpec::new(440.0, Triangle, 0.2).volume(0.1).delay(0.2).into(),
                ToneSpec::new(660.0, Triangle, 0.4).volume(0.12).delay(0.3).into(),
            ],
            Effect::Notification => smallvec![
                ToneSpec::new(880.0, Sine, 0.1).volume(0.1).into(),
                ToneSpec::new(1320.0, Sine, 0.15).volume(0.1).delay(0.1).into(),
            ],
            Effect::Scan => smallvec![
                SweepSpec::new(200.0, 2000.0, 0.4, Sawtooth).volume(0.05).into(),
                NoiseSpec::new(0.4, 0.02).into(),
            ],
            Effect::AddToCart => smallvec![
                ToneSpec::new(523.0, Triangle, 0.08).volume(0.12).into(),
                ToneSpec::new(659.0, Triangle, 0.08).volume(0.12).delay(0.06).into(),
                ToneSpec::new(784.0, Triangle, 0.15).volume(0.12).delay(0.12).into(),
            ],
            Effect::Transaction => smallvec![
                NoiseSpec::new(0.05, 0.03).into(),
                ToneSpec::new(523.0, Sine, 0.1).volume(0.1).into(),
                ToneSpec::new(659.0, Sine, 0.1).volume(0.1).delay(0.07).into(),
                ToneSpec::new(784.0, Sine, 0.1).volume(0.1).delay(0.14).into(),
                ToneSpec::new(1047.0, Sine, 0.3).volume(0.12).delay(0.21).into(),
            ],
            Effect::Connect => smallvec![
                SweepSpec::new(400.0, 1200.0, 0.2, Sine).volume(0.08).into(),
                ToneSpec::new(1200.0, Sine, 0.1).volume(0.08).delay(0.2).into(),
            ],
            Effect::Disconnect => smallvec![
                SweepSpec::new(1200.0, 300.0, 0.25, Sawtooth).volume(0.06).into(),
                ToneSpec::new(150.0, Square, 0.15).volume(0.06).delay(0.2).into(),
            ],
            Effect::Glitch => {
                let mut v: Voices = (0..5)
                    .map(|i| {
                        let hz = rng.gen_range(100.0..2000.0);
                        let dur = rng.gen_range(0.02..0.05);
                        Voice::Tone(
                            ToneSpec::new(hz, Square, dur)
                                .volume(0.05)
                                .delay(i as f64 * 0.03),
                        )
                    })
                    .collect();
                v.push(NoiseSpec::new(0.1, 0.06).into());
                v
            }
            Effect::Typewriter(chars) => typewriter(chars, rng),
            Effect::Decrypt => {
                let mut v: Voices = (0..DECRYPT_STEPS)
                    .map(|i| {
                        let hz = rng.gen_range(400.0..1600.0);
                        Voice::Tone(
                            ToneSpec::new(hz, Square, 0.03)
                                .volume(0.04)
                                .delay(i as f64 * DECRYPT_STEP_SEC),
                        )
                    })
                    .collect();
                // Confirmation chirp once the scramble settles.
                let settle = DECRYPT_STEPS as f64 * DECRYPT_STEP_SEC + 0.05;
                v.push(ToneSpec::new(880.0, Sine, 0.08).volume(0.1).delay(settle).into());
                v.push(
                    ToneSpec::new(1320.0, Sine, 0.15)
                        .volume(0.1)
                        .delay(settle + 0.08)
                        .into(),
                );
                v
            }
            Effect::PanelOpen => smallvec![
                SweepSpec::new(200.0, 600.0, 0.12, Triangle).volume(0.08).into(),
                NoiseSpec::new(0.08, 0.02).into(),
            ],
            Effect::PanelClose => smallvec![
                SweepSpec::new(600.0, 200.0, 0.12, Triangle).volume(0.08).into(),
                NoiseSpec::new(0.08, 0.02).into(),
            ],
        }
    }
}

/// One (tone, noise) pair per key, a fixed interval apart.
fn typewriter<R: Rng + ?Sized>(chars: u32, rng: &mut R) -> Voices {
    let chars = chars.min(TYPEWRITER_MAX_CHARS);
    let mut v = Voices::with_capacity(chars as usize * 2);
    for i in 0..chars {
        let at = i as f64 * TYPEWRITER_KEY_INTERVAL_SEC;
        let hz = rng.gen_range(1000.0..1400.0);
        v.push(
            ToneSpec::new(hz, Square, TYPEWRITER_CLICK_SEC)
                .volume(0.03)
                .delay(at)
                .into(),
        );
        v.push(NoiseSpec::new(TYPEWRITER_CLICK_SEC, 0.04).delay(at).into());
    }
    v
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Typewriter(n) => write!(f, "typewriter({n})"),
            other => f.write_str(other.name()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown effect '{0}'")]
pub struct UnknownEffect(pub String);

impl FromStr for Effect {
    type Err = UnknownEffect;

    /// Accepts the host-facing names, camelCase aliases, and
    /// `typewriter:<n>` for a specific length.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        if let Some(n) = lower.strip_prefix("typewriter:") {
            return n
                .parse()
                .map(Effect::Typewriter)
                .map_err(|_| UnknownEffect(s.to_string()));
        }
        let normalized = match lower.as_str() {
            "addtocart" => "add-to-cart",
            "panelopen" => "panel-open",
            "panelclose" => "panel-close",
            other => other,
        };
        Effect::ALL
            .iter()
            .copied()
            .find(|e| e.name() == normalized)
            .ok_or_else(|| UnknownEffect(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn every_effect_has_sound_with_positive_parameters() {
        for effect in Effect::ALL {
            let voices = effect.voices(&mut rng());
            assert!(!voices.is_empty(), "{effect} is silent");
            for v in &voices {
                assert!(v.duration() > 0.0 && v.delay() >= 0.0, "{effect}: {v:?}");
                match v {
                    Voice::Tone(t) => assert!(t.frequency > 0.0 && t.volume > 0.0),
                    Voice::Noise(n) => assert!(n.volume > 0.0),
                    Voice::Sweep(s) => assert!(s.start_hz > 0.0 && s.end_hz > 0.0),
                }
            }
        }
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for effect in Effect::ALL {
            assert_eq!(effect.name().parse::<Effect>(), Ok(effect));
        }
        assert_eq!("addToCart".parse::<Effect>(), Ok(Effect::AddToCart));
        assert_eq!("typewriter:9".parse::<Effect>(), Ok(Effect::Typewriter(9)));
        assert!("kazoo".parse::<Effect>().is_err());
    }

    #[test]
    fn decrypt_scrambles_then_confirms() {
        let voices = Effect::Decrypt.voices(&mut rng());
        assert_eq!(voices.len(), DECRYPT_STEPS + 2);
        for (i, v) in voices.iter().take(DECRYPT_STEPS).enumerate() {
            assert!((v.delay() - i as f64 * DECRYPT_STEP_SEC).abs() < 1e-9);
        }
        let last_scramble = voices[DECRYPT_STEPS - 1].delay();
        assert!(voices[DECRYPT_STEPS].delay() > last_scramble);
    }

    #[test]
    fn typewriter_zero_chars_is_empty() {
        assert!(Effect::Typewriter(0).voices(&mut rng()).is_empty());
    }

    #[test]
    fn typewriter_length_is_capped() {
        let cap = TYPEWRITER_MAX_CHARS as usize * 2;
        assert_eq!(Effect::Typewriter(u32::MAX).voices(&mut rng()).len(), cap);
        assert_eq!(Effect::Typewriter(TYPEWRITER_MAX_CHARS + 1).voices(&mut rng()).len(), cap);
        assert_eq!(Effect::Typewriter(3).voices(&mut rng()).len(), 6);

        let huge: Effect = "typewriter:4294967295".parse().unwrap();
        assert_eq!(huge.voices(&mut rng()).len(), cap);
    }

    #[test]
    fn unknown_effect_reports_the_name() {
        let err = "kazoo".parse::<Effect>().unwrap_err();
        assert_eq!(err.to_string(), "unknown effect 'kazoo'");
        let _: Box<dyn std::error::Error + Send + Sync> = Box::new(err);
    }
}
