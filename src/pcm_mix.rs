//! Cross-fade sample mixing kernel.
//!
//! `original_source/src/pcm/Mix.cxx` (the envelope this is meant to match
//! sample-for-sample) was not present in the retrieved source subset; per
//! DESIGN.md's Open Question #2 resolution, both `mix_ratio >= 0` (linear)
//! and `mix_ratio < 0` (MixRamp) modes apply the same documented energy
//! law `r*u + (1-r)*v` rather than guessing a distinct envelope shape for
//! the negative-ratio case — the MixRamp mode only changes how `r` is
//! derived by the player (§4.5 step 7), not how the two buffers combine.

use crate::audio_format::{AudioFormat, SampleFormat};

/// Mixes `a` and `b` (same `format`) at ratio `ratio` (`1.0` = all `a`,
/// `0.0` = all `b`). If one buffer is longer, the excess tail is passed
/// through unmixed (end of the cross-fade ramp, per §4.6 source loop).
pub fn mix(a: &[u8], b: &[u8], format: AudioFormat, ratio: f32) -> Vec<u8> {
    let sample_size = format.sample_size() as usize;
    if sample_size == 0 {
        return Vec::new();
    }
    let ratio = ratio.clamp(0.0, 1.0) as f64;
    let common = a.len().min(b.len()) / sample_size * sample_size;

    let mut out = Vec::with_capacity(a.len().max(b.len()));
    for i in (0..common).step_by(sample_size) {
        mix_sample(format.format, &a[i..i + sample_size], &b[i..i + sample_size], ratio, &mut out);
    }
    if a.len() > common {
        out.extend_from_slice(&a[common..]);
    } else if b.len() > common {
        out.extend_from_slice(&b[common..]);
    }
    out
}

fn mix_sample(format: SampleFormat, a: &[u8], b: &[u8], ratio: f64, out: &mut Vec<u8>) {
    match format {
        SampleFormat::S8 => {
            let av = a[0] as i8 as f64;
            let bv = b[0] as i8 as f64;
            let mixed = (av * ratio + bv * (1.0 - ratio)).round().clamp(i8::MIN as f64, i8::MAX as f64);
            out.push(mixed as i8 as u8);
        }
        SampleFormat::S16 => {
            let av = i16::from_le_bytes([a[0], a[1]]) as f64;
            let bv = i16::from_le_bytes([b[0], b[1]]) as f64;
            let mixed = (av * ratio + bv * (1.0 - ratio)).round().clamp(i16::MIN as f64, i16::MAX as f64);
            out.extend_from_slice(&(mixed as i16).to_le_bytes());
        }
        SampleFormat::S24P32 | SampleFormat::S32 => {
            let av = i32::from_le_bytes([a[0], a[1], a[2], a[3]]) as f64;
            let bv = i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64;
            let mixed = (av * ratio + bv * (1.0 - ratio)).round().clamp(i32::MIN as f64, i32::MAX as f64);
            out.extend_from_slice(&(mixed as i32).to_le_bytes());
        }
        SampleFormat::Float => {
            let av = f32::from_le_bytes([a[0], a[1], a[2], a[3]]) as f64;
            let bv = f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64;
            let mixed = av * ratio + bv * (1.0 - ratio);
            out.extend_from_slice(&(mixed as f32).to_le_bytes());
        }
        SampleFormat::Dsd | SampleFormat::Undefined => out.extend_from_slice(a),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_format::SampleFormat;

    #[test]
    fn mix_energy_matches_ratio_formula() {
        let af = AudioFormat::new(48000, SampleFormat::Float, 1);
        let mut a = Vec::new();
        a.extend_from_slice(&1.0f32.to_le_bytes());
        let mut b = Vec::new();
        b.extend_from_slice(&(-1.0f32).to_le_bytes());
        for ratio in [0.0f32, 0.25, 0.5, 0.75, 1.0] {
            let mixed = mix(&a, &b, af, ratio);
            let value = f32::from_le_bytes(mixed.try_into().unwrap());
            let expected = ratio * 1.0 + -(1.0 - ratio);
            assert!((value - expected).abs() < 1e-6, "ratio={ratio}");
        }
    }

    #[test]
    fn excess_tail_passes_through_unmixed() {
        let af = AudioFormat::new(48000, SampleFormat::S16, 1);
        let a = vec![1u8, 0, 2, 0, 3, 0];
        let b = vec![1u8, 0];
        let mixed = mix(&a, &b, af, 0.5);
        assert_eq!(mixed.len(), 6);
        // the second and third samples of `a` are the unmixed tail
        assert_eq!(&mixed[2..6], &a[2..6]);
    }
}
