//! Per-channel copy filter, parsed from a `"src>dst,src>dst,…"` spec.
//!
//! Transcribed from `original_source/src/filter/RouteFilterPlugin.cxx`.
//! Unmapped output channels receive silence; if multiple sources target
//! the same destination, the last one in the spec wins (as in the
//! original's `sources[dest] = source` overwrite).

use crate::audio_format::AudioFormat;
use crate::error::EngineError;
use crate::filter::{Filter, PreparedFilter};

pub struct Route {
    in_format: AudioFormat,
    out_format: AudioFormat,
    /// `sources[dst] = Some(src)` or `None` for "no source, emit silence".
    sources: Vec<Option<u8>>,
}

impl Filter for Route {
    fn out_audio_format(&self) -> AudioFormat {
        self.out_format
    }

    fn filter_pcm(&mut self, src: &[u8]) -> Result<Vec<u8>, EngineError> {
        let in_sample_size = self.in_format.sample_size() as usize;
        let in_frame_size = self.in_format.frame_size() as usize;
        if in_frame_size == 0 {
            return Ok(Vec::new());
        }
        let frames = src.len() / in_frame_size;
        let mut out = Vec::with_capacity(frames * self.out_format.frame_size() as usize);
        for frame_i in 0..frames {
            let frame_start = frame_i * in_frame_size;
            for &source in &self.sources {
                match source {
                    Some(ch) if (ch as usize) < self.in_format.channels as usize => {
                        let start = frame_start + ch as usize * in_sample_size;
                        out.extend_from_slice(&src[start..start + in_sample_size]);
                    }
                    _ => out.extend(std::iter::repeat_n(0u8, in_sample_size)),
                }
            }
        }
        Ok(out)
    }
}

#[derive(Clone)]
pub struct PreparedRoute {
    sources: Vec<Option<u8>>,
}

impl PreparedRoute {
    /// Parses `"0>0, 1>1, 0>2, 1>3"` style routing specs.
    pub fn parse(spec: &str) -> Result<Self, EngineError> {
        let mut max_dst: i32 = -1;
        let mut pairs = Vec::new();
        for token in spec.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let (src, dst) = token
                .split_once('>')
                .ok_or_else(|| EngineError::ConfigError(format!("invalid route entry: {token}")))?;
            let src: u8 = src
                .trim()
                .parse()
                .map_err(|_| EngineError::ConfigError(format!("invalid source channel: {src}")))?;
            let dst: u8 = dst
                .trim()
                .parse()
                .map_err(|_| EngineError::ConfigError(format!("invalid destination channel: {dst}")))?;
            max_dst = max_dst.max(dst as i32);
            pairs.push((src, dst));
        }
        let channels = (max_dst + 1).max(0) as usize;
        if channels == 0 || channels > crate::audio_format::MAX_CHANNELS as usize {
            return Err(EngineError::ConfigError(format!(
                "invalid number of output channels requested: {channels}"
            )));
        }
        let mut sources = vec![None; channels];
        for (src, dst) in pairs {
            sources[dst as usize] = Some(src);
        }
        Ok(PreparedRoute { sources })
    }
}

impl PreparedFilter for PreparedRoute {
    fn open(&mut self, af: &mut AudioFormat) -> Result<Box<dyn Filter>, EngineError> {
        let mut out_format = *af;
        out_format.channels = self.sources.len() as u8;
        Ok(Box::new(Route {
            in_format: *af,
            out_format,
            sources: self.sources.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_format::SampleFormat;

    #[test]
    fn upmixes_stereo_to_four_channels() {
        let mut prepared = PreparedRoute::parse("0>0, 1>1, 0>2, 1>3").unwrap();
        let mut input = AudioFormat::new(48000, SampleFormat::S16, 2);
        let mut filter = prepared.open(&mut input).unwrap();
        assert_eq!(filter.out_audio_format().channels, 4);

        let left = 100i16.to_le_bytes();
        let right = 200i16.to_le_bytes();
        let mut frame = Vec::new();
        frame.extend_from_slice(&left);
        frame.extend_from_slice(&right);

        let out = filter.filter_pcm(&frame).unwrap();
        assert_eq!(out.len(), 8);
        assert_eq!(&out[0..2], &left);
        assert_eq!(&out[2..4], &right);
        assert_eq!(&out[4..6], &left);
        assert_eq!(&out[6..8], &right);
    }

    #[test]
    fn unmapped_destination_is_silent() {
        let mut prepared = PreparedRoute::parse("0>1").unwrap();
        let mut input = AudioFormat::new(48000, SampleFormat::S16, 1);
        let mut filter = prepared.open(&mut input).unwrap();
        let frame = 77i16.to_le_bytes().to_vec();
        let out = filter.filter_pcm(&frame).unwrap();
        assert_eq!(&out[0..2], &[0, 0]);
        assert_eq!(&out[2..4], &77i16.to_le_bytes());
    }
}
