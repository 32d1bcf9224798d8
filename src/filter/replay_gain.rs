//! ReplayGain filter: applies the gain implied by a track/album's
//! `ReplayGainInfo` under a selectable `ReplayGainMode`.
//!
//! Grounded on `original_source/src/filter/plugins/ReplayGainFilterPlugin.cxx`:
//! holds the current mode and info, recomputes the applied scale whenever
//! either changes, and reuses the `Volume` filter's scale-application
//! kernel rather than a dedicated one.

use crate::audio_format::AudioFormat;
use crate::error::EngineError;
use crate::filter::{Filter, PreparedFilter};
use crate::pcm_volume::{self, PCM_VOLUME_1};
use crate::replay_gain::{ReplayGainInfo, ReplayGainMode};

pub struct ReplayGainFilter {
    format: AudioFormat,
    mode: ReplayGainMode,
    info: ReplayGainInfo,
    /// Extra gain from a `base` setting (the "preamp" the original keeps
    /// alongside the per-track scale).
    base_db: f32,
    scale: u32,
}

impl ReplayGainFilter {
    pub fn new(format: AudioFormat, mode: ReplayGainMode, base_db: f32) -> Self {
        let mut filter = ReplayGainFilter {
            format,
            mode,
            info: ReplayGainInfo::clear(),
            base_db,
            scale: PCM_VOLUME_1,
        };
        filter.recompute();
        filter
    }

    pub fn recompute(&mut self) {
        let db = self.info.gain_db(self.mode).unwrap_or(0.0) + self.base_db;
        let linear = 10f64.powf(db as f64 / 20.0);
        self.scale = (linear * PCM_VOLUME_1 as f64).round().clamp(0.0, u32::MAX as f64) as u32;
    }

    pub fn set_mode(&mut self, mode: ReplayGainMode) {
        self.mode = mode;
        self.recompute();
    }

    pub fn set_info(&mut self, info: ReplayGainInfo) {
        self.info = info;
        self.recompute();
    }

    pub fn base_db(&self) -> f32 {
        self.base_db
    }
}

impl Filter for ReplayGainFilter {
    fn out_audio_format(&self) -> AudioFormat {
        self.format
    }

    fn filter_pcm(&mut self, src: &[u8]) -> Result<Vec<u8>, EngineError> {
        let mut out = src.to_vec();
        pcm_volume::apply(&mut out, self.format, self.scale);
        Ok(out)
    }
}

pub struct PreparedReplayGainFilter {
    mode: ReplayGainMode,
    base_db: f32,
}

impl PreparedReplayGainFilter {
    pub fn new(mode: ReplayGainMode, base_db: f32) -> Self {
        PreparedReplayGainFilter { mode, base_db }
    }
}

impl PreparedFilter for PreparedReplayGainFilter {
    fn open(&mut self, af: &mut AudioFormat) -> Result<Box<dyn Filter>, EngineError> {
        let mut filter = ReplayGainFilter {
            format: *af,
            mode: self.mode,
            info: ReplayGainInfo::clear(),
            base_db: self.base_db,
            scale: PCM_VOLUME_1,
        };
        filter.recompute();
        Ok(Box::new(filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_format::SampleFormat;

    #[test]
    fn off_mode_is_unity() {
        let mut af = AudioFormat::new(44100, SampleFormat::S16, 1);
        let mut prepared = PreparedReplayGainFilter::new(ReplayGainMode::Off, 0.0);
        let mut filter = prepared.open(&mut af).unwrap();
        let src = 1000i16.to_le_bytes().to_vec();
        let out = filter.filter_pcm(&src).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn track_mode_applies_gain() {
        let af = AudioFormat::new(44100, SampleFormat::S16, 1);
        let mut filter = ReplayGainFilter {
            format: af,
            mode: ReplayGainMode::Track,
            info: ReplayGainInfo::clear(),
            base_db: 0.0,
            scale: PCM_VOLUME_1,
        };
        filter.set_info(ReplayGainInfo {
            track_gain_db: Some(-6.0),
            ..Default::default()
        });
        let src = 10000i16.to_le_bytes().to_vec();
        let out = filter.filter_pcm(&src).unwrap();
        let value = i16::from_le_bytes(out.try_into().unwrap());
        assert!(value < 10000 && value > 0);
    }
}
