//! The decoder stage: a worker that services `DecoderControl` commands and
//! emits `MusicChunk`s into a pipe via a `DecoderClient` facade.
//!
//! Grounded on `original_source/src/decoder/DecoderControl.{hxx,cxx}` and
//! `DecoderInternal.{hxx,cxx}`. The original's OS-thread-plus-condvar pair
//! becomes a `tokio::task` plus `Arc<Mutex<_>> + Notify` here, per
//! SPEC_FULL.md §A.1 — the same substitution `pipeline.rs`'s `NodeLogic`
//! makes in the teacher crate.

mod bridge;
mod control;

pub use bridge::{DecoderBridge, DecoderPlugin};
pub use control::{DecoderCommand, DecoderControl, DecoderState, StartParams};

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;

/// Spawns the decoder task. It idles until a `Start` command arrives — each
/// one supplying its own plugin — and drives that plugin through one song at
/// a time until cancelled. A single task/`DecoderControl` pair this way
/// sequences through every song of a playback session, matching spec §4's
/// "the player owns one decoder".
pub fn spawn(control: Arc<DecoderControl>, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!("decoder task shutting down");
                    return;
                }
                started = control.wait_for_start() => {
                    let Some(start) = started else { continue };
                    run_one_song(&control, start).await;
                }
            }
        }
    })
}

async fn run_one_song(control: &Arc<DecoderControl>, mut start: StartParams) {
    control.set_state(DecoderState::Start).await;
    let mut bridge = DecoderBridge::new(
        control.clone(),
        start.buffer,
        start.pipe,
        start.start_time,
        start.end_time,
        start.initial_seek_essential,
    );

    match start.plugin.run(&mut bridge).await {
        Ok(()) => {
            tracing::info!("decoder finished song without error");
        }
        Err(EngineError::Interrupted) => {
            // Normal cooperative stop (external Stop command, or the
            // virtual end_time truncation) — not a real failure, so the
            // decoder must not be pushed into `Error` state over it.
            tracing::debug!("decoder song ended via cooperative stop");
        }
        Err(err) => {
            tracing::warn!(error = %err, "decoder plugin failed");
            control.set_error(err).await;
        }
    }

    bridge.flush_partial_chunk();
    control.set_state_if(DecoderState::Decode, DecoderState::Stop).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_format::{AudioFormat, SampleFormat, SongTime};
    use crate::music_chunk::MusicBuffer;
    use crate::music_pipe::MusicPipe;
    use async_trait::async_trait;

    struct ToneDecoder {
        freq: f32,
        total_frames: u32,
    }

    #[async_trait]
    impl DecoderPlugin for ToneDecoder {
        async fn run(&mut self, bridge: &mut DecoderBridge) -> Result<(), crate::error::EngineError> {
            let af = AudioFormat::new(48000, SampleFormat::Float, 1);
            bridge.ready(af, true, crate::audio_format::SignedSongTime::from_ms(1000)).await;
            for i in 0..self.total_frames {
                let t = i as f32 / af.sample_rate as f32;
                let sample = (2.0 * std::f32::consts::PI * self.freq * t).sin();
                let bytes = sample.to_le_bytes();
                bridge.submit_audio(af, &bytes, 0).await?;
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn decodes_a_tone_into_the_pipe() {
        let control = Arc::new(DecoderControl::new());
        let buffer = MusicBuffer::new(64);
        let pipe = Arc::new(MusicPipe::new());
        control
            .start(
                buffer.clone(),
                pipe.clone(),
                Box::new(ToneDecoder { freq: 440.0, total_frames: 4800 }),
                SongTime::ZERO,
                SongTime::ZERO,
                false,
            )
            .await;

        let shutdown = CancellationToken::new();
        let handle = spawn(control.clone(), shutdown.clone());

        // Give the decoder a moment to run to completion.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        shutdown.cancel();
        let _ = handle.await;

        assert!(pipe.size() > 0);
    }
}
