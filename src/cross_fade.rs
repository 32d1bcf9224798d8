//! Cross-fade overlap calculator.
//!
//! Transcribed from `CrossFadeSettings::Calculate` in
//! `original_source/src/CrossFade.cxx`. Decides how many chunks at the end
//! of the outgoing song overlap with the beginning of the incoming one, and
//! derives the mix ratio progression from that chunk count.

use crate::audio_format::{AudioFormat, SignedSongTime};
use crate::mix_ramp::MixRampCurve;

pub const CHUNK_SIZE: usize = 4096;

/// Minimum total duration (on both songs) for any cross-fade to be
/// considered at all.
pub const MIN_CROSSFADE_SONG_DURATION_SECS: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CrossFadeSettings {
    /// Configured cross-fade duration in seconds; `<= 0` disables simple
    /// cross-fade (MixRamp may still apply if configured).
    pub duration_secs: f32,
    /// MixRamp trigger threshold in dB (required level, before ReplayGain
    /// correction).
    pub mixramp_db: f32,
    /// Extra silence, in seconds, to cut from the computed MixRamp overlap.
    /// `<= 0` disables MixRamp mode.
    pub mixramp_delay_secs: f32,
}

impl CrossFadeSettings {
    /// Preconditions of spec §4.3: both durations known and >= 20s, and the
    /// configured duration positive and strictly less than the current
    /// song's total time, same output format on both songs.
    pub fn can_cross_fade(
        &self,
        total_time: SignedSongTime,
        format: AudioFormat,
        old_format: AudioFormat,
    ) -> bool {
        if total_time.is_negative() {
            return false;
        }
        let total_secs = total_time.to_secs_f64();
        if total_secs < MIN_CROSSFADE_SONG_DURATION_SECS {
            return false;
        }
        if format != old_format {
            return false;
        }
        self.duration_secs > 0.0 && (self.duration_secs as f64) < total_secs
    }

    /// Computes the number of chunks to overlap, capped at `max_chunks`.
    /// Returns 0 when cross-fade should not happen at all (either the
    /// simple precondition fails, or — in MixRamp mode — the curves don't
    /// clear the configured delay).
    #[allow(clippy::too_many_arguments)]
    pub fn calculate(
        &self,
        total_time: SignedSongTime,
        replay_gain_db: f32,
        replay_gain_prev_db: f32,
        mixramp_start: Option<&MixRampCurve>,
        mixramp_prev_end: Option<&MixRampCurve>,
        format: AudioFormat,
        old_format: AudioFormat,
        max_chunks: u32,
    ) -> u32 {
        if total_time.is_negative() || self.duration_secs <= 0.0 || format != old_format {
            return 0;
        }
        let total_secs = total_time.to_secs_f64();
        if (self.duration_secs as f64) >= total_secs {
            return 0;
        }

        let chunks_f = format.time_to_size_factor() as f64 / CHUNK_SIZE as f64;

        let chunks: u32 = if self.mixramp_delay_secs <= 0.0 {
            (chunks_f * self.duration_secs as f64 + 0.5) as u32
        } else if let (Some(start), Some(prev_end)) = (mixramp_start, mixramp_prev_end) {
            let current = start.interpolate(self.mixramp_db - replay_gain_db);
            let prev = prev_end.interpolate(self.mixramp_db - replay_gain_prev_db);
            let overlap = current + prev;

            if current >= 0.0 && prev >= 0.0 && self.mixramp_delay_secs <= overlap {
                let secs = overlap - self.mixramp_delay_secs;
                tracing::debug!(chunks = %(chunks_f * secs as f64), seconds = secs, "mixramp overlap computed");
                (chunks_f * secs as f64) as u32
            } else {
                0
            }
        } else {
            (chunks_f * self.duration_secs as f64 + 0.5) as u32
        };

        if chunks > max_chunks {
            tracing::warn!(
                chunks,
                max_chunks,
                "audio buffer too small for computed MixRamp overlap"
            );
            max_chunks
        } else {
            chunks
        }
    }

    /// Linear cross-fade ratio at `position` (1-based index counting down)
    /// out of `total_chunks`: 1.0 at the first mixed chunk, approaching 0
    /// at the last.
    pub fn linear_ratio(position: u32, total_chunks: u32) -> f32 {
        if total_chunks == 0 {
            0.0
        } else {
            position as f32 / total_chunks as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_format::SampleFormat;

    fn af() -> AudioFormat {
        AudioFormat::new(48000, SampleFormat::Float, 2)
    }

    #[test]
    fn simple_overlap_rounds_to_nearest_chunk() {
        let settings = CrossFadeSettings {
            duration_secs: 0.5,
            ..Default::default()
        };
        let total = SignedSongTime::from_ms(60_000);
        let chunks = settings.calculate(total, 0.0, 0.0, None, None, af(), af(), 10_000);
        // chunks_f = 48000*8/4096 = 93.75; *0.5 = 46.875 -> round to 47
        assert_eq!(chunks, 47);
    }

    #[test]
    fn mixramp_overlap_matches_scenario_s3() {
        let settings = CrossFadeSettings {
            duration_secs: 0.5,
            mixramp_db: -15.0,
            mixramp_delay_secs: 0.2,
        };
        let start = MixRampCurve::parse("-20 0;-10 1").unwrap();
        let prev_end = MixRampCurve::parse("-20 0;-10 1").unwrap();
        let total = SignedSongTime::from_ms(60_000);
        let chunks = settings.calculate(
            total,
            0.0,
            0.0,
            Some(&start),
            Some(&prev_end),
            af(),
            af(),
            10_000,
        );
        // interpolate(-15) on "-20 0;-10 1" = 0.5 each side -> overlap=1.0
        // overlap - delay = 0.8; chunks_f=93.75 -> 93.75*0.8=75.0
        assert_eq!(chunks, 75);
    }

    #[test]
    fn overlap_capped_at_max_chunks() {
        let settings = CrossFadeSettings {
            duration_secs: 5.0,
            ..Default::default()
        };
        let total = SignedSongTime::from_ms(60_000);
        let chunks = settings.calculate(total, 0.0, 0.0, None, None, af(), af(), 10);
        assert_eq!(chunks, 10);
    }

    #[test]
    fn monotonicity_increasing_delay_never_increases_overlap() {
        let start = MixRampCurve::parse("-20 0;-10 2").unwrap();
        let prev_end = MixRampCurve::parse("-20 0;-10 2").unwrap();
        let total = SignedSongTime::from_ms(60_000);
        // Start at delay=0.1s, not 0: delay<=0 disables MixRamp entirely and
        // falls back to the plain `duration_secs` overlap (a real
        // discontinuity mirrored from `IsMixRampEnabled()` in the original),
        // so monotonicity only holds once MixRamp is actually engaged.
        let mut last = u32::MAX;
        for delay_tenths in 1..30 {
            let settings = CrossFadeSettings {
                duration_secs: 0.5,
                mixramp_db: -15.0,
                mixramp_delay_secs: delay_tenths as f32 / 10.0,
            };
            let chunks = settings.calculate(
                total,
                0.0,
                0.0,
                Some(&start),
                Some(&prev_end),
                af(),
                af(),
                10_000,
            );
            assert!(chunks <= last);
            last = chunks;
        }
    }

    #[test]
    fn different_formats_disable_crossfade() {
        let settings = CrossFadeSettings {
            duration_secs: 0.5,
            ..Default::default()
        };
        let total = SignedSongTime::from_ms(60_000);
        let other = AudioFormat::new(44100, SampleFormat::Float, 2);
        assert_eq!(
            settings.calculate(total, 0.0, 0.0, None, None, af(), other, 10_000),
            0
        );
    }
}
