//! `AudioOutputSource`: one output's cursor into the shared pipe, plus the
//! ReplayGain and cross-fade mixing that happen before the main filter
//! chain.
//!
//! Grounded on `original_source/src/output/Source.hxx`: each output keeps
//! its own `SharedPipeConsumer` and its own ReplayGain filter instance (two
//! of them, actually — one for the primary chunk and a twin for `other`
//! during cross-fade), since different outputs may run different filter
//! configurations (spec §4.6).

use std::sync::Arc;

use crate::audio_format::AudioFormat;
use crate::error::EngineError;
use crate::filter::{Filter, PreparedFilter, ReplayGainFilter};
use crate::music_pipe::{MusicPipe, SharedPipeConsumer};
use crate::pcm_mix;
use crate::replay_gain::{ReplayGainInfo, ReplayGainMode, ReplayGainSerial};

pub struct AudioOutputSource {
    consumer: SharedPipeConsumer,
    replay_gain_filter: ReplayGainFilter,
    other_replay_gain_filter: ReplayGainFilter,
    /// Serial of the `ReplayGainInfo` last applied to `replay_gain_filter`,
    /// so repeated chunks carrying the same info don't re-trigger a
    /// recompute. `0` means "nothing applied yet".
    last_replay_gain_serial: ReplayGainSerial,
    last_other_replay_gain_serial: ReplayGainSerial,
    chain: Box<dyn Filter>,
}

impl AudioOutputSource {
    pub fn new(
        pipe: Arc<MusicPipe>,
        in_format: AudioFormat,
        replay_gain_mode: ReplayGainMode,
        replay_gain_base_db: f32,
        mut chain_prepared: Box<dyn PreparedFilter>,
    ) -> Result<Self, EngineError> {
        let mut consumer = SharedPipeConsumer::new();
        consumer.init(pipe);

        let replay_gain_filter = ReplayGainFilter::new(in_format, replay_gain_mode, replay_gain_base_db);
        let other_replay_gain_filter = ReplayGainFilter::new(in_format, replay_gain_mode, replay_gain_base_db);

        let mut chain_format = in_format;
        let chain = chain_prepared.open(&mut chain_format)?;

        Ok(AudioOutputSource {
            consumer,
            replay_gain_filter,
            other_replay_gain_filter,
            last_replay_gain_serial: 0,
            last_other_replay_gain_serial: 0,
            chain,
        })
    }

    pub fn set_replay_gain_mode(&mut self, mode: ReplayGainMode) {
        self.replay_gain_filter.set_mode(mode);
        self.other_replay_gain_filter.set_mode(mode);
    }

    pub fn set_replay_gain_info(&mut self, info: ReplayGainInfo) {
        self.replay_gain_filter.set_info(info);
    }

    /// Pulls the next chunk this output hasn't yet consumed, applies
    /// ReplayGain and cross-fade mixing, and runs it through the main
    /// filter chain (spec §4.6 source loop). Returns `None` once caught up
    /// with the pipe's tail.
    pub fn next_block(&mut self) -> Result<Option<Vec<u8>>, EngineError> {
        let Some(handle) = self.consumer.get() else {
            return Ok(None);
        };

        let (primary, other, mix_ratio, format, replay_gain_info, replay_gain_serial) = {
            let chunk = handle.read();
            (
                chunk.data().to_vec(),
                chunk.other.clone(),
                chunk.mix_ratio,
                chunk.format(),
                chunk.replay_gain_info,
                chunk.replay_gain_serial,
            )
        };

        if replay_gain_serial != 0 && replay_gain_serial != self.last_replay_gain_serial {
            self.replay_gain_filter.set_info(replay_gain_info);
            self.last_replay_gain_serial = replay_gain_serial;
        }

        let primary = self.replay_gain_filter.filter_pcm(&primary)?;

        let mixed = if let Some(other) = other {
            let (other_data, other_replay_gain_info, other_replay_gain_serial) = {
                let other_chunk = other.read();
                (other_chunk.data().to_vec(), other_chunk.replay_gain_info, other_chunk.replay_gain_serial)
            };
            if other_replay_gain_serial != 0 && other_replay_gain_serial != self.last_other_replay_gain_serial {
                self.other_replay_gain_filter.set_info(other_replay_gain_info);
                self.last_other_replay_gain_serial = other_replay_gain_serial;
            }
            let other_pcm = self.other_replay_gain_filter.filter_pcm(&other_data)?;
            // MixRamp mode stores the position-derived ratio as a negative
            // number so its magnitude is still the same linear ratio simple
            // cross-fade uses (DESIGN.md's Open Question 2 resolution).
            let r = mix_ratio.abs();
            pcm_mix::mix(&primary, &other_pcm, format, r)
        } else {
            primary
        };

        self.consumer.consume(&handle);
        Ok(Some(self.chain.filter_pcm(&mixed)?))
    }

    pub fn cancel(&mut self) {
        self.consumer.cancel();
        self.chain.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_format::{SampleFormat, SongTime};
    use crate::filter::PreparedChain;
    use crate::music_chunk::MusicBuffer;

    fn af() -> AudioFormat {
        AudioFormat::new(44100, SampleFormat::S16, 1)
    }

    #[test]
    fn pulls_and_filters_chunks_in_order() {
        let buf = MusicBuffer::new(4);
        let pipe = Arc::new(MusicPipe::new());
        let handle = buf.allocate().unwrap();
        {
            let mut chunk = handle.write();
            let slice = chunk.write(af(), SongTime::ZERO, 0).unwrap();
            slice[..2].copy_from_slice(&1000i16.to_le_bytes());
            chunk.expand(af(), 2);
        }
        pipe.push(handle);

        let chain: Box<dyn PreparedFilter> = Box::new(PreparedChain::new(af()));
        let mut source = AudioOutputSource::new(pipe, af(), ReplayGainMode::Off, 0.0, chain).unwrap();
        let block = source.next_block().unwrap().unwrap();
        assert_eq!(block.len(), 2);
        assert!(source.next_block().unwrap().is_none());
    }
}
