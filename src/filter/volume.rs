//! Integer-scale volume filter. Transcribed from
//! `original_source/src/filter/plugins/VolumeFilterPlugin.cxx`.

use crate::audio_format::AudioFormat;
use crate::error::EngineError;
use crate::filter::{Filter, PreparedFilter};
use crate::pcm_volume::{self, PCM_VOLUME_1};

pub struct Volume {
    format: AudioFormat,
    volume: u32,
}

impl Volume {
    pub fn get_volume(&self) -> u32 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: u32) {
        self.volume = volume.min(PCM_VOLUME_1);
    }
}

impl Filter for Volume {
    fn out_audio_format(&self) -> AudioFormat {
        self.format
    }

    fn filter_pcm(&mut self, src: &[u8]) -> Result<Vec<u8>, EngineError> {
        let mut out = src.to_vec();
        pcm_volume::apply(&mut out, self.format, self.volume);
        Ok(out)
    }
}

#[derive(Default)]
pub struct PreparedVolume;

impl PreparedVolume {
    pub fn new() -> Self {
        PreparedVolume
    }
}

impl PreparedFilter for PreparedVolume {
    fn open(&mut self, af: &mut AudioFormat) -> Result<Box<dyn Filter>, EngineError> {
        Ok(Box::new(Volume {
            format: *af,
            volume: PCM_VOLUME_1,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_format::SampleFormat;

    #[test]
    fn unity_is_default() {
        let mut af = AudioFormat::new(44100, SampleFormat::S16, 1);
        let mut prepared = PreparedVolume::new();
        let filter = prepared.open(&mut af).unwrap();
        assert_eq!(filter.out_audio_format(), af);
    }

    #[test]
    fn filter_scales_samples() {
        let af = AudioFormat::new(44100, SampleFormat::S16, 1);
        let mut volume = Volume { format: af, volume: PCM_VOLUME_1 };
        volume.set_volume(0);
        let src = 1000i16.to_le_bytes().to_vec();
        let out = volume.filter_pcm(&src).unwrap();
        assert_eq!(out, vec![0, 0]);
    }
}
