//! Numeric audio-format and time types.
//!
//! Grounded directly on `original_source/src/AudioFormat.{hxx,cxx}` and
//! `AudioParser.cxx`: sample rate in `[1, 2^30)`, channels in `[1, 8]`,
//! the `"<rate>:<bits>:<channels>"` wire string, and exact-integer
//! time/byte conversions.

use crate::error::EngineError;
use std::fmt;

pub const MAX_CHANNELS: u8 = 8;

/// A PCM sample representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SampleFormat {
    #[default]
    Undefined,
    S8,
    S16,
    /// Signed 24-bit, packed into a 32-bit container.
    S24P32,
    S32,
    /// 32-bit float, range -1.0..=1.0.
    Float,
    /// Direct Stream Digital: 1-bit samples, 8 samples/channel per byte.
    Dsd,
}

impl SampleFormat {
    /// Size in bytes of one (mono) sample; for DSD this is the size of one
    /// byte carrying 8 samples for a single channel.
    pub const fn sample_size(self) -> u32 {
        match self {
            SampleFormat::Undefined => 0,
            SampleFormat::S8 => 1,
            SampleFormat::S16 => 2,
            SampleFormat::S24P32 | SampleFormat::S32 | SampleFormat::Float => 4,
            SampleFormat::Dsd => 1,
        }
    }

    pub const fn is_valid(self) -> bool {
        !matches!(self, SampleFormat::Undefined)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            SampleFormat::Undefined => "?",
            SampleFormat::S8 => "8",
            SampleFormat::S16 => "16",
            SampleFormat::S24P32 => "24",
            SampleFormat::S32 => "32",
            SampleFormat::Float => "f",
            SampleFormat::Dsd => "dsd",
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn valid_sample_rate(rate: u32) -> bool {
    rate > 0 && rate < (1 << 30)
}

fn valid_channel_count(channels: u8) -> bool {
    (1..=MAX_CHANNELS).contains(&channels)
}

/// (sample-rate Hz, sample-format, channel-count) triple describing a PCM
/// stream. Also usable as a "mask": zero/undefined fields mean "any".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub format: SampleFormat,
    pub channels: u8,
}

impl AudioFormat {
    pub const fn new(sample_rate: u32, format: SampleFormat, channels: u8) -> Self {
        Self {
            sample_rate,
            format,
            channels,
        }
    }

    pub const fn undefined() -> Self {
        Self {
            sample_rate: 0,
            format: SampleFormat::Undefined,
            channels: 0,
        }
    }

    pub const fn is_defined(&self) -> bool {
        self.sample_rate != 0
    }

    pub const fn is_fully_defined(&self) -> bool {
        self.sample_rate != 0 && self.format.is_valid() && self.channels != 0
    }

    /// Full validity check per spec §3: rate in `[1, 2^30)`, channels in
    /// `[1, 8]`, format defined.
    pub fn is_valid(&self) -> bool {
        valid_sample_rate(self.sample_rate)
            && self.format.is_valid()
            && valid_channel_count(self.channels)
    }

    /// Validity check for a mask: each field is either "any" (zero /
    /// undefined) or independently valid.
    pub fn is_mask_valid(&self) -> bool {
        (self.sample_rate == 0 || valid_sample_rate(self.sample_rate))
            && (self.format == SampleFormat::Undefined || self.format.is_valid())
            && (self.channels == 0 || valid_channel_count(self.channels))
    }

    /// Overwrites only the non-zero/non-undefined fields of `self` with
    /// those of `mask`. Idempotent: `apply(m).apply(m) == apply(m)`.
    pub fn apply_mask(&self, mask: AudioFormat) -> AudioFormat {
        let mut out = *self;
        if mask.sample_rate != 0 {
            out.sample_rate = mask.sample_rate;
        }
        if mask.format != SampleFormat::Undefined {
            out.format = mask.format;
        }
        if mask.channels != 0 {
            out.channels = mask.channels;
        }
        out
    }

    pub const fn sample_size(&self) -> u32 {
        self.format.sample_size()
    }

    /// Size in bytes of one frame (all channels).
    pub const fn frame_size(&self) -> u32 {
        self.sample_size() * self.channels as u32
    }

    /// Bytes-per-second factor used for exact time<->size conversion.
    pub fn time_to_size_factor(&self) -> u64 {
        self.sample_rate as u64 * self.frame_size() as u64
    }

    /// Converts a duration to a byte count, rounded down to whole frames.
    pub fn time_to_size(&self, duration: std::time::Duration) -> u64 {
        let frame_size = self.frame_size() as u64;
        if frame_size == 0 {
            return 0;
        }
        let frames = (duration.as_secs_f64() * self.sample_rate as f64).round() as u64;
        frames * frame_size
    }

    /// Converts a byte count (must be a whole multiple of the frame size)
    /// back to a duration.
    pub fn size_to_time(&self, size: u64) -> std::time::Duration {
        let frame_size = self.frame_size() as u64;
        if frame_size == 0 || self.sample_rate == 0 {
            return std::time::Duration::ZERO;
        }
        let frames = size / frame_size;
        std::time::Duration::from_secs_f64(frames as f64 / self.sample_rate as f64)
    }

    /// Parses `"<rate>:<bits>:<channels>"`. When `mask` is true, any field
    /// may be `*` meaning "any" (rendered back as zero/undefined).
    pub fn parse(src: &str, mask: bool) -> Result<Self, EngineError> {
        let mut parts = src.splitn(3, ':');
        let rate_part = parts
            .next()
            .ok_or_else(|| EngineError::ConfigError("missing sample rate".into()))?;
        let format_part = parts
            .next()
            .ok_or_else(|| EngineError::ConfigError("sample format missing".into()))?;
        let channels_part = parts
            .next()
            .ok_or_else(|| EngineError::ConfigError("channel count missing".into()))?;

        let sample_rate = if mask && rate_part == "*" {
            0
        } else {
            let v: u32 = rate_part
                .parse()
                .map_err(|_| EngineError::ConfigError("failed to parse the sample rate".into()))?;
            if !valid_sample_rate(v) {
                return Err(EngineError::ConfigError(format!(
                    "invalid sample rate: {v}"
                )));
            }
            v
        };

        let format = if mask && format_part == "*" {
            SampleFormat::Undefined
        } else if format_part == "f" {
            SampleFormat::Float
        } else if format_part == "dsd" {
            SampleFormat::Dsd
        } else {
            let trimmed = format_part.strip_suffix("_3").unwrap_or(format_part);
            match trimmed {
                "8" => SampleFormat::S8,
                "16" => SampleFormat::S16,
                "24" => SampleFormat::S24P32,
                "32" => SampleFormat::S32,
                other => {
                    return Err(EngineError::ConfigError(format!(
                        "invalid sample format: {other}"
                    )))
                }
            }
        };

        let channels = if mask && channels_part == "*" {
            0
        } else {
            let v: u8 = channels_part.parse().map_err(|_| {
                EngineError::ConfigError("failed to parse the channel count".into())
            })?;
            if !valid_channel_count(v) {
                return Err(EngineError::ConfigError(format!(
                    "invalid channel count: {v}"
                )));
            }
            v
        };

        let format = AudioFormat {
            sample_rate,
            format,
            channels,
        };
        if mask {
            if !format.is_mask_valid() {
                return Err(EngineError::ConfigError("invalid format mask".into()));
            }
        } else if !format.is_valid() {
            return Err(EngineError::ConfigError("invalid audio format".into()));
        }
        Ok(format)
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.sample_rate, self.format, self.channels)
    }
}

/// A non-negative duration at millisecond granularity, maximum ~49 days
/// (`u32::MAX` milliseconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SongTime(u32);

impl SongTime {
    pub const ZERO: SongTime = SongTime(0);

    pub const fn from_ms(ms: u32) -> Self {
        SongTime(ms)
    }

    pub fn from_duration(d: std::time::Duration) -> Self {
        SongTime(d.as_millis().min(u32::MAX as u128) as u32)
    }

    pub const fn as_ms(self) -> u32 {
        self.0
    }

    pub fn as_duration(self) -> std::time::Duration {
        std::time::Duration::from_millis(self.0 as u64)
    }
}

/// A duration that can also represent "unknown" via a dedicated negative
/// sentinel, used for song total-time before the decoder has reported it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignedSongTime(i64);

impl Default for SignedSongTime {
    fn default() -> Self {
        SignedSongTime::NEGATIVE
    }
}

impl SignedSongTime {
    pub const NEGATIVE: SignedSongTime = SignedSongTime(-1);

    pub const fn from_ms(ms: i64) -> Self {
        SignedSongTime(ms)
    }

    pub fn from_duration(d: std::time::Duration) -> Self {
        SignedSongTime(d.as_millis() as i64)
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn to_duration(self) -> Option<std::time::Duration> {
        if self.is_negative() {
            None
        } else {
            Some(std::time::Duration::from_millis(self.0 as u64))
        }
    }

    pub fn to_secs_f64(self) -> f64 {
        if self.is_negative() {
            -1.0
        } else {
            self.0 as f64 / 1000.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_render_roundtrip() {
        for (s, af) in [
            ("44100:16:2", AudioFormat::new(44100, SampleFormat::S16, 2)),
            ("48000:f:2", AudioFormat::new(48000, SampleFormat::Float, 2)),
            ("96000:24:6", AudioFormat::new(96000, SampleFormat::S24P32, 6)),
            ("176400:dsd:2", AudioFormat::new(176400, SampleFormat::Dsd, 2)),
            ("44100:24_3:2", AudioFormat::new(44100, SampleFormat::S24P32, 2)),
        ] {
            let parsed = AudioFormat::parse(s, false).unwrap();
            if !s.contains("_3") {
                assert_eq!(parsed.to_string(), s);
            }
            assert_eq!(parsed.sample_rate, af.sample_rate);
            assert_eq!(parsed.format, af.format);
            assert_eq!(parsed.channels, af.channels);
        }
    }

    #[test]
    fn parse_rejects_out_of_range() {
        assert!(AudioFormat::parse("0:16:2", false).is_err());
        assert!(AudioFormat::parse("44100:16:0", false).is_err());
        assert!(AudioFormat::parse("44100:16:9", false).is_err());
        assert!(AudioFormat::parse(&format!("{}:16:2", 1u64 << 30), false).is_err());
    }

    #[test]
    fn mask_application_is_idempotent() {
        let af = AudioFormat::new(44100, SampleFormat::S16, 2);
        let mask = AudioFormat::parse("48000:*:2", true).unwrap();
        let once = af.apply_mask(mask);
        let twice = once.apply_mask(mask);
        assert_eq!(once, twice);
        assert_eq!(once.format, SampleFormat::S16); // preserved: mask format is "any"
        assert_eq!(once.sample_rate, 48000);
    }

    #[test]
    fn frame_arithmetic_roundtrips() {
        let af = AudioFormat::new(48000, SampleFormat::S16, 2);
        let frame_size = af.frame_size() as u64;
        for frames in [0u64, 1, 100, 48000] {
            let size = frames * frame_size;
            let time = af.size_to_time(size);
            assert_eq!(af.time_to_size(time), size);
        }
    }
}
