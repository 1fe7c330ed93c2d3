use crate::constants::{clamp_unit, DEFAULT_MASTER_VOLUME, DEFAULT_MUSIC_VOLUME};

/// Initial engine settings.
///
/// - `master_volume`: gain of the sink every one-shot effect feeds (0..1)
/// - `music_volume`: gain of the sink the ambient layers feed (0..1)
/// - `enabled`: whether one-shot effects play at all
/// - `music_enabled`: whether ambient music may start
/// - `seed`: seed for the randomized effects; `None` draws one from the OS
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub master_volume: f32,
    pub music_volume: f32,
    pub enabled: bool,
    pub music_enabled: bool,
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            master_volume: DEFAULT_MASTER_VOLUME,
            music_volume: DEFAULT_MUSIC_VOLUME,
            enabled: true,
            music_enabled: true,
            seed: None,
        }
    }
}

impl EngineConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Copy with both volumes clamped into range.
    pub fn sanitized(&self) -> Self {
        Self {
            master_volume: clamp_unit(self.master_volume),
            music_volume: clamp_unit(self.music_volume),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = EngineConfig::default();
        assert_eq!(c.master_volume, 0.5);
        assert_eq!(c.music_volume, 0.3);
        assert!(c.enabled && c.music_enabled);
        assert_eq!(c.seed, None);
    }

    #[test]
    fn sanitized_clamps_volumes() {
        let c = EngineConfig {
            master_volume: 3.0,
            music_volume: f32::NAN,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(c.master_volume, 1.0);
        assert_eq!(c.music_volume, 0.0);
    }
}
