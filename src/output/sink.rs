//! The `Sink` trait: the interface an external audio-output plugin
//! implements. Only the interface is in scope (spec §1 Non-goals) — no
//! concrete ALSA/PulseAudio/etc. plugin lives in this crate.
//!
//! Grounded on `original_source/src/output/Interface.hxx`'s method set
//! (`Open`/`Close`/`Play`/`Pause`/`Drain`/`Cancel`/`SendTag`/`Interrupt`).

use std::time::Duration;

use async_trait::async_trait;

use crate::audio_format::AudioFormat;
use crate::error::EngineError;
use crate::music_chunk::Tag;

#[async_trait]
pub trait Sink: Send + Sync {
    /// Negotiates and opens the sink for `format`, returning the format it
    /// actually accepted (a sink may adjust rate/bit-depth/channels).
    async fn open(&mut self, format: AudioFormat) -> Result<AudioFormat, EngineError>;

    async fn close(&mut self);

    /// Writes PCM already in the negotiated format, returning the number of
    /// bytes consumed (may be less than `data.len()`; the caller loops).
    async fn play(&mut self, data: &[u8]) -> Result<usize, EngineError>;

    /// Blocks until queued audio has physically played out.
    async fn drain(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    /// Discards queued audio immediately (used on seek/cross-fade abort).
    async fn cancel(&mut self) {}

    async fn send_tag(&mut self, _tag: &Tag) {}

    /// Some sinks support silencing without closing the device.
    async fn pause(&mut self) -> Result<bool, EngineError> {
        Ok(false)
    }

    /// Estimated queued latency, used to decide how long a blocking `play`
    /// call is allowed to run before treating it as stalled.
    fn delay(&self) -> Duration {
        Duration::ZERO
    }

    /// Cooperative cancellation: a `play`/`drain` call in progress should
    /// return promptly once this is requested (mirrors `Interrupt()`).
    fn interrupt(&mut self) {}
}
