//! Engine-wide configuration knobs (spec §6): cross-fade/MixRamp settings,
//! ReplayGain mode/preamp, and the buffer sizing the decoder/player/output
//! stages share.
//!
//! Grounded on `pmoaudio::nodes::disk_sink::DiskSinkConfig`'s style: a plain
//! `Debug + Clone` struct with a hand-written `Default`, no config-file
//! framework pulled in (this crate has no on-disk config format of its
//! own — spec §1 places the server/config layer out of scope; only the
//! in-memory knobs the engine itself consumes are modeled here).

use crate::cross_fade::CrossFadeSettings;
use crate::error::EngineError;
use crate::replay_gain::ReplayGainMode;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Total number of chunks the `MusicBuffer` slab can hold at once.
    pub music_buffer_chunks: usize,
    /// Chunks to accumulate before starting playback (spec §4.5 step 3).
    pub buffer_before_play_chunks: usize,
    pub cross_fade: CrossFadeSettings,
    pub replay_gain_mode: ReplayGainMode,
    /// Extra "preamp" gain applied on top of the per-track ReplayGain value.
    pub replay_gain_preamp_db: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            music_buffer_chunks: 1024,
            buffer_before_play_chunks: 12,
            cross_fade: CrossFadeSettings::default(),
            replay_gain_mode: ReplayGainMode::Off,
            replay_gain_preamp_db: 0.0,
        }
    }
}

impl EngineConfig {
    /// Rejects configurations that can never produce valid playback:
    /// an empty music buffer, or a buffering threshold the buffer itself
    /// could never reach.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.music_buffer_chunks == 0 {
            return Err(EngineError::ConfigError(
                "music_buffer_chunks must be at least 1".into(),
            ));
        }
        if self.buffer_before_play_chunks > self.music_buffer_chunks {
            return Err(EngineError::ConfigError(format!(
                "buffer_before_play_chunks ({}) exceeds music_buffer_chunks ({})",
                self.buffer_before_play_chunks, self.music_buffer_chunks
            )));
        }
        if self.cross_fade.duration_secs < 0.0 {
            return Err(EngineError::ConfigError(
                "cross_fade.duration_secs must not be negative".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_buffer_is_rejected() {
        let config = EngineConfig {
            music_buffer_chunks: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_buffering_threshold_is_rejected() {
        let mut config = EngineConfig::default();
        config.buffer_before_play_chunks = config.music_buffer_chunks + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn negative_cross_fade_duration_is_rejected() {
        let mut config = EngineConfig::default();
        config.cross_fade.duration_secs = -1.0;
        assert!(config.validate().is_err());
    }
}
