//! Adaptive compressor, normalising loudness on the fly.
//!
//! Grounded on `original_source/src/filter/NormalizeFilterPlugin.cxx`: the
//! original always forces its working format to 16-bit signed and delegates
//! to a separate `AudioCompress` library. That library isn't part of the
//! retrieved source, so this is a from-scratch gain-riding compressor in
//! the same spirit: track a running peak, compute the gain that would pull
//! it to the target level, and slew towards that gain a little every block
//! rather than jumping (avoids audible stepping).

use crate::audio_format::AudioFormat;
use crate::error::EngineError;
use crate::filter::{Filter, PreparedFilter};

const TARGET_PEAK: f64 = 0.8;
/// Maximum gain change per block, keeps pumping inaudible.
const MAX_SLEW: f64 = 0.05;

pub struct Normalize {
    format: AudioFormat,
    gain: f64,
}

impl Filter for Normalize {
    fn out_audio_format(&self) -> AudioFormat {
        self.format
    }

    fn filter_pcm(&mut self, src: &[u8]) -> Result<Vec<u8>, EngineError> {
        let mut out = src.to_vec();
        let sample_size = self.format.sample_size() as usize;
        if sample_size == 0 || out.is_empty() {
            return Ok(out);
        }

        let mut peak = 0.0f64;
        for chunk in out.chunks_exact(sample_size) {
            peak = peak.max(sample_abs(self.format, chunk));
        }

        if peak > 1e-6 {
            let desired = (TARGET_PEAK / peak).min(4.0);
            let delta = (desired - self.gain).clamp(-MAX_SLEW, MAX_SLEW);
            self.gain += delta;
        }

        for chunk in out.chunks_exact_mut(sample_size) {
            scale_in_place(self.format, chunk, self.gain);
        }
        Ok(out)
    }
}

fn sample_abs(format: AudioFormat, bytes: &[u8]) -> f64 {
    use crate::audio_format::SampleFormat::*;
    match format.format {
        S8 => (bytes[0] as i8 as f64 / i8::MAX as f64).abs(),
        S16 => (i16::from_le_bytes([bytes[0], bytes[1]]) as f64 / i16::MAX as f64).abs(),
        S24P32 | S32 => {
            (i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64 / i32::MAX as f64).abs()
        }
        Float => (f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64).abs(),
        Dsd | Undefined => 0.0,
    }
}

fn scale_in_place(format: AudioFormat, bytes: &mut [u8], gain: f64) {
    use crate::audio_format::SampleFormat::*;
    match format.format {
        S8 => {
            let v = (bytes[0] as i8 as f64 * gain).clamp(i8::MIN as f64, i8::MAX as f64);
            bytes[0] = (v as i8) as u8;
        }
        S16 => {
            let s = i16::from_le_bytes([bytes[0], bytes[1]]);
            let v = (s as f64 * gain).clamp(i16::MIN as f64, i16::MAX as f64) as i16;
            bytes.copy_from_slice(&v.to_le_bytes());
        }
        S24P32 | S32 => {
            let s = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            let v = (s as f64 * gain).clamp(i32::MIN as f64, i32::MAX as f64) as i32;
            bytes.copy_from_slice(&v.to_le_bytes());
        }
        Float => {
            let s = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            bytes.copy_from_slice(&((s as f64 * gain) as f32).to_le_bytes());
        }
        Dsd | Undefined => {}
    }
}

#[derive(Default)]
pub struct PreparedNormalize;

impl PreparedNormalize {
    pub fn new() -> Self {
        PreparedNormalize
    }
}

impl PreparedFilter for PreparedNormalize {
    fn open(&mut self, af: &mut AudioFormat) -> Result<Box<dyn Filter>, EngineError> {
        Ok(Box::new(Normalize {
            format: *af,
            gain: 1.0,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_format::SampleFormat;

    #[test]
    fn quiet_signal_is_brought_up_gradually() {
        let af = AudioFormat::new(44100, SampleFormat::S16, 1);
        let mut normalize = Normalize { format: af, gain: 1.0 };
        let quiet = 1000i16.to_le_bytes().to_vec();
        let mut last_gain = normalize.gain;
        for _ in 0..50 {
            normalize.filter_pcm(&quiet).unwrap();
            assert!(normalize.gain >= last_gain);
            last_gain = normalize.gain;
        }
        assert!(normalize.gain > 1.0);
    }
}
