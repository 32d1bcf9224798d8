//! Format/rate/channel conversion filter. Always the last stage of a
//! chain (spec §4.2); its output format is fixed at construction and does
//! not depend on what it is opened with.

use crate::audio_format::AudioFormat;
use crate::error::EngineError;
use crate::filter::{Filter, PreparedFilter};
use crate::pcm_format;

pub struct Convert {
    in_format: AudioFormat,
    out_format: AudioFormat,
}

impl Filter for Convert {
    fn out_audio_format(&self) -> AudioFormat {
        self.out_format
    }

    fn filter_pcm(&mut self, src: &[u8]) -> Result<Vec<u8>, EngineError> {
        Ok(pcm_format::convert(src, self.in_format, self.out_format))
    }
}

pub struct PreparedConvert {
    target: AudioFormat,
}

impl PreparedConvert {
    pub fn new(target: AudioFormat) -> Self {
        PreparedConvert { target }
    }

    /// Reopens an already-running chain's trailing Convert at a new output
    /// format, mirroring `convert_filter_set` (used when the sink
    /// renegotiates format in-flight).
    pub fn set_output_format(filter: &mut Convert, format: AudioFormat) {
        filter.out_format = format;
    }
}

impl PreparedFilter for PreparedConvert {
    fn open(&mut self, af: &mut AudioFormat) -> Result<Box<dyn Filter>, EngineError> {
        Ok(Box::new(Convert {
            in_format: *af,
            out_format: self.target,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_format::SampleFormat;

    #[test]
    fn converts_between_formats() {
        let mut prepared = PreparedConvert::new(AudioFormat::new(44100, SampleFormat::S16, 1));
        let mut input = AudioFormat::new(44100, SampleFormat::Float, 1);
        let mut filter = prepared.open(&mut input).unwrap();
        let src = 0.5f32.to_le_bytes().to_vec();
        let out = filter.filter_pcm(&src).unwrap();
        assert_eq!(out.len(), 2);
    }
}
