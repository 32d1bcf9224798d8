//! ReplayGain metadata and mode selection.
//!
//! Grounded on `original_source/src/filter/plugins/ReplayGainFilterPlugin.cxx`
//! and `ReplayGainMode.hxx`.

use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

/// Per-track amplitude normalisation metadata, as reported by a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReplayGainInfo {
    pub track_gain_db: Option<f32>,
    pub track_peak: Option<f32>,
    pub album_gain_db: Option<f32>,
    pub album_peak: Option<f32>,
}

impl ReplayGainInfo {
    pub fn clear() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.track_gain_db.is_none() && self.album_gain_db.is_none()
    }

    /// Selects the gain (dB) to apply for the given mode. `Auto` prefers
    /// album gain when available, falling back to track gain.
    pub fn gain_db(&self, mode: ReplayGainMode) -> Option<f32> {
        match mode {
            ReplayGainMode::Off => None,
            ReplayGainMode::Track => self.track_gain_db,
            ReplayGainMode::Album => self.album_gain_db,
            ReplayGainMode::Auto => self.album_gain_db.or(self.track_gain_db),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplayGainMode {
    #[default]
    Off,
    Album,
    Track,
    Auto,
}

impl fmt::Display for ReplayGainMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReplayGainMode::Off => "off",
            ReplayGainMode::Album => "album",
            ReplayGainMode::Track => "track",
            ReplayGainMode::Auto => "auto",
        };
        f.write_str(s)
    }
}

impl FromStr for ReplayGainMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(ReplayGainMode::Off),
            "album" => Ok(ReplayGainMode::Album),
            "track" => Ok(ReplayGainMode::Track),
            "auto" => Ok(ReplayGainMode::Auto),
            other => Err(EngineError::ConfigError(format!(
                "invalid replay gain mode: {other}"
            ))),
        }
    }
}

/// A monotonic serial tagging a chunk's `ReplayGainInfo` snapshot. `0`
/// means "no info carried by this chunk" (distinct from "silence").
pub type ReplayGainSerial = u32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses() {
        assert_eq!("auto".parse::<ReplayGainMode>().unwrap(), ReplayGainMode::Auto);
        assert!("bogus".parse::<ReplayGainMode>().is_err());
    }

    #[test]
    fn auto_prefers_album() {
        let info = ReplayGainInfo {
            track_gain_db: Some(-3.0),
            album_gain_db: Some(-6.0),
            ..Default::default()
        };
        assert_eq!(info.gain_db(ReplayGainMode::Auto), Some(-6.0));
        assert_eq!(info.gain_db(ReplayGainMode::Track), Some(-3.0));
        assert_eq!(info.gain_db(ReplayGainMode::Off), None);
    }
}
