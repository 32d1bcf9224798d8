//! Integer PCM volume scaling.
//!
//! `PCM_VOLUME_1` and the dB curve are from spec §6; the per-sample scale
//! application follows the Q31 fixed-point shape of
//! `pmoaudio::dsp::gain_32bits::apply_gain_stereo_i32` (multiply into a
//! wider integer, round, shift back down), generalised here to work over a
//! `SampleFormat`-tagged byte buffer instead of a fixed `[i32; 2]` layout.

use crate::audio_format::{AudioFormat, SampleFormat};

/// The integer volume value representing unity gain.
pub const PCM_VOLUME_1: u32 = 1 << 10;

/// Maps a user-facing volume (0..=100) to a linear scale factor, per the
/// curve in spec §6: `db = 25 * ln(1 + v*(54.6-1)/100)`, `scale =
/// 10^(db/20)`. Exactly 0 at `v=0`, exactly 1.0 at `v=100`.
pub fn volume_to_scale(v: u32) -> f64 {
    if v == 0 {
        return 0.0;
    }
    if v >= 100 {
        return 1.0;
    }
    let db = 25.0 * (1.0 + v as f64 * (54.6 - 1.0) / 100.0).ln();
    10f64.powf(db / 20.0)
}

/// Maps a user-facing volume (0..=100) to the `PCM_VOLUME_1`-scaled
/// integer used internally by [`apply`].
pub fn volume_to_pcm(v: u32) -> u32 {
    (volume_to_scale(v) * PCM_VOLUME_1 as f64).round() as u32
}

/// Applies integer volume scaling in place. `volume` is in `PCM_VOLUME_1`
/// units; `volume >= PCM_VOLUME_1` is a no-op, `volume == 0` zeroes the
/// buffer (mirrors `VolumeFilter::FilterPCM`'s two optimised special
/// cases).
pub fn apply(data: &mut [u8], format: AudioFormat, volume: u32) {
    if volume >= PCM_VOLUME_1 {
        return;
    }
    if volume == 0 {
        data.fill(0);
        return;
    }

    let scale = volume as f64 / PCM_VOLUME_1 as f64;
    let sample_size = format.sample_size() as usize;
    if sample_size == 0 {
        return;
    }

    for chunk in data.chunks_exact_mut(sample_size) {
        scale_sample(format.format, chunk, scale);
    }
}

fn scale_sample(format: SampleFormat, bytes: &mut [u8], scale: f64) {
    match format {
        SampleFormat::S8 => {
            let s = bytes[0] as i8;
            bytes[0] = ((s as f64 * scale).round() as i8) as u8;
        }
        SampleFormat::S16 => {
            let s = i16::from_le_bytes([bytes[0], bytes[1]]);
            let scaled = (s as f64 * scale).round().clamp(i16::MIN as f64, i16::MAX as f64) as i16;
            bytes.copy_from_slice(&scaled.to_le_bytes());
        }
        SampleFormat::S24P32 | SampleFormat::S32 => {
            let s = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            let g_fixed = (scale * (1u64 << 31) as f64).round() as i64;
            let scaled = ((s as i64 * g_fixed + (1 << 30)) >> 31).clamp(i32::MIN as i64, i32::MAX as i64) as i32;
            bytes.copy_from_slice(&scaled.to_le_bytes());
        }
        SampleFormat::Float => {
            let s = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            bytes.copy_from_slice(&((s as f64 * scale) as f32).to_le_bytes());
        }
        SampleFormat::Dsd | SampleFormat::Undefined => {}
    }
}
