//! `DecoderBridge`: the interface a decoder plugin calls into to report
//! readiness, submit PCM, and submit metadata — the modern-generation
//! equivalent of `original_source/src/decoder/DecoderClient.hxx`.
//!
//! `DecoderPlugin` itself is the external, out-of-scope implementation (spec
//! §1 Non-goals: actual codecs are not part of this engine); only the
//! interface the core calls through is in scope here.

use std::sync::Arc;

use async_trait::async_trait;

use crate::audio_format::{AudioFormat, SignedSongTime, SongTime};
use crate::error::EngineError;
use crate::mix_ramp::MixRampInfo;
use crate::music_chunk::{MusicBuffer, MusicChunkHandle, Tag};
use crate::music_pipe::MusicPipe;
use crate::replay_gain::{ReplayGainInfo, ReplayGainSerial};

use super::control::{DecoderCommand, DecoderControl, DecoderState};

/// An external codec. Only the interface is in scope; any real
/// implementation (FLAC, MP3, …) lives outside this crate.
#[async_trait]
pub trait DecoderPlugin: Send {
    async fn run(&mut self, bridge: &mut DecoderBridge) -> Result<(), EngineError>;
}

pub struct DecoderBridge {
    control: Arc<DecoderControl>,
    buffer: MusicBuffer,
    pipe: Arc<MusicPipe>,
    format: AudioFormat,
    current: Option<MusicChunkHandle>,
    start_time: SongTime,
    end_time: SongTime,
    initial_seek_essential: bool,
    /// Set once at construction when `start_time` is positive; cleared the
    /// first time `poll_commands` runs, whether or not the seek actually
    /// happens. Mirrors `DecoderControl::initial_seek_pending`.
    initial_seek_pending: bool,
    seekable: bool,
    /// Cumulative frames submitted so far, used to find the `end_time`
    /// truncation point. Mirrors `DecoderControl::absolute_frame`.
    elapsed_frames: u64,
    replay_gain_serial_counter: ReplayGainSerial,
    current_replay_gain_info: ReplayGainInfo,
    current_replay_gain_serial: ReplayGainSerial,
}

impl DecoderBridge {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        control: Arc<DecoderControl>,
        buffer: MusicBuffer,
        pipe: Arc<MusicPipe>,
        start_time: SongTime,
        end_time: SongTime,
        initial_seek_essential: bool,
    ) -> Self {
        DecoderBridge {
            control,
            buffer,
            pipe,
            format: AudioFormat::undefined(),
            current: None,
            start_time,
            end_time,
            initial_seek_essential,
            initial_seek_pending: start_time > SongTime::ZERO,
            seekable: false,
            elapsed_frames: 0,
            replay_gain_serial_counter: 0,
            current_replay_gain_info: ReplayGainInfo::clear(),
            current_replay_gain_serial: 0,
        }
    }

    /// Reports the stream's format and whether it's seekable, moving the
    /// decoder into the `Decode` state. Mirrors `DecoderClient::Ready`.
    pub async fn ready(&mut self, format: AudioFormat, seekable: bool, total_time: SignedSongTime) {
        self.format = format;
        self.seekable = seekable;
        self.control.set_ready_info(format, total_time).await;
        self.control.set_state(DecoderState::Decode).await;
    }

    /// Cooperative cancellation point: returns `Err(Interrupted)` if a
    /// `Stop` command has arrived since the last check (spec §8 property
    /// #10 — the decoder must notice promptly, not just at song end).
    async fn check_stop(&self) -> Result<(), EngineError> {
        if self.control.state().await == DecoderState::Error {
            return Err(EngineError::Interrupted);
        }
        Ok(())
    }

    fn time_to_frames(format: AudioFormat, time: SongTime) -> u64 {
        let frame_size = format.frame_size() as u64;
        if frame_size == 0 {
            return 0;
        }
        format.time_to_size(time.as_duration()) / frame_size
    }

    /// Pulls and handles any pending command without blocking, returning an
    /// error if the song should stop decoding now.
    ///
    /// Before looking at any externally-issued command, synthesizes the
    /// hidden initial seek to `start_time` exactly once: if the stream is
    /// seekable the partial chunk is flushed and `elapsed_frames` jumps
    /// straight to `start_time`; if it isn't, the seek is either silently
    /// dropped or, when `initial_seek_essential` is set, turned into a real
    /// decode failure. None of this touches `pending`/`seek_result`, so it
    /// is invisible to anything observing `DecoderControl` from outside
    /// (mirrors `DecoderControl::PrepareInitialSeek`/`CommandFinished`).
    pub async fn poll_commands(&mut self) -> Result<(), EngineError> {
        if self.initial_seek_pending {
            self.initial_seek_pending = false;
            if self.seekable {
                self.flush_partial_chunk();
                self.elapsed_frames = Self::time_to_frames(self.format, self.start_time);
                tracing::debug!(start_time = ?self.start_time, "synthesized hidden initial seek");
            } else if self.initial_seek_essential {
                let err = EngineError::decoder("initial seek failed: stream is not seekable");
                self.control.set_error(err).await;
                return Err(EngineError::Interrupted);
            }
        }

        match self.control.take_pending().await {
            Some(DecoderCommand::Stop) => {
                self.control.acknowledge_seek(Ok(())).await;
                Err(EngineError::Interrupted)
            }
            Some(DecoderCommand::Seek(_time)) => {
                // A real plugin would seek its stream here; the bridge only
                // models the handshake, since the actual seek is codec-specific.
                self.flush_partial_chunk();
                self.control.acknowledge_seek(Ok(())).await;
                Ok(())
            }
            Some(DecoderCommand::Start { .. }) | None => Ok(()),
        }
    }

    /// Appends `data` (already in `format`) to the pipe, allocating fresh
    /// chunks from the buffer as needed and pushing each one full chunk.
    /// Cooperatively checks for a stop request before doing any work, and
    /// truncates `data` at `end_time` if one was requested, returning
    /// `Err(Interrupted)` once the song should stop (whether because of an
    /// external command or because `end_time` was reached).
    pub async fn submit_audio(
        &mut self,
        format: AudioFormat,
        data: &[u8],
        bit_rate: u16,
    ) -> Result<(), EngineError> {
        self.check_stop().await?;
        self.poll_commands().await?;

        let frame_size = format.frame_size() as usize;
        if frame_size == 0 {
            return Ok(());
        }

        let mut data = data;
        let mut stop_after = false;
        if self.end_time > SongTime::ZERO {
            let end_frame = Self::time_to_frames(format, self.end_time);
            if self.elapsed_frames >= end_frame {
                return Err(EngineError::Interrupted);
            }
            let remaining_frames = end_frame - self.elapsed_frames;
            let data_frames = (data.len() / frame_size) as u64;
            if data_frames >= remaining_frames {
                data = &data[..(remaining_frames as usize) * frame_size];
                stop_after = true;
            }
        }
        self.elapsed_frames += (data.len() / frame_size) as u64;

        let mut offset = 0;
        while offset < data.len() {
            let handle = match &self.current {
                Some(h) => h.clone(),
                None => {
                    let h = loop {
                        if let Some(h) = self.buffer.allocate() {
                            break h;
                        }
                        tokio::task::yield_now().await;
                    };
                    {
                        let mut chunk = h.write();
                        chunk.replay_gain_serial = self.current_replay_gain_serial;
                        if self.current_replay_gain_serial != 0 {
                            chunk.replay_gain_info = self.current_replay_gain_info;
                        }
                    }
                    self.current = Some(h.clone());
                    h
                }
            };

            let remaining = handle.read().remaining();
            let frames_fit = remaining / frame_size;
            let bytes_fit = (frames_fit * frame_size).min(data.len() - offset);
            if bytes_fit == 0 {
                self.push_current();
                continue;
            }

            {
                let mut chunk = handle.write();
                let slot = chunk
                    .write(format, SongTime::ZERO, bit_rate)
                    .expect("chunk had remaining capacity");
                slot[..bytes_fit].copy_from_slice(&data[offset..offset + bytes_fit]);
                let full = chunk.expand(format, bytes_fit);
                offset += bytes_fit;
                if !full {
                    continue;
                }
            }
            self.push_current();
        }

        if stop_after {
            Err(EngineError::Interrupted)
        } else {
            Ok(())
        }
    }

    fn push_current(&mut self) {
        if let Some(handle) = self.current.take() {
            self.pipe.push(handle);
        }
    }

    /// Pushes a partially-filled chunk at song end, so its tail isn't lost.
    pub fn flush_partial_chunk(&mut self) {
        if let Some(handle) = &self.current {
            if !handle.read().is_empty() {
                self.push_current();
            } else {
                self.current = None;
            }
        }
    }

    pub async fn submit_tag(&mut self, tag: Tag) {
        self.flush_partial_chunk();
        if let Some(handle) = self.buffer.allocate() {
            handle.write().tag = Some(tag);
            self.pipe.push(handle);
        }
    }

    /// Bumps the ReplayGain serial, converts `info` into a scalar dB value
    /// for the current mode and stamps it onto `DecoderControl`, then
    /// flushes the in-flight chunk so the new info starts applying at a
    /// chunk boundary. `None` clears the current info (mirrors
    /// `DecoderClient::SubmitReplayGain(nullptr)`).
    pub async fn submit_replay_gain(&mut self, info: Option<ReplayGainInfo>) {
        match info {
            Some(info) => {
                self.replay_gain_serial_counter = self.replay_gain_serial_counter.wrapping_add(1);
                if self.replay_gain_serial_counter == 0 {
                    self.replay_gain_serial_counter = 1;
                }

                let mode = self.control.replay_gain_mode().await;
                if mode != crate::replay_gain::ReplayGainMode::Off {
                    if let Some(db) = info.gain_db(mode) {
                        self.control.set_replay_gain_db(db).await;
                    }
                }

                self.current_replay_gain_info = info;
                self.current_replay_gain_serial = self.replay_gain_serial_counter;
                if self.current.is_some() {
                    self.flush_partial_chunk();
                }
            }
            None => {
                self.current_replay_gain_serial = 0;
            }
        }
    }

    pub async fn submit_mix_ramp(&mut self, mix_ramp: MixRampInfo) {
        self.control.set_mix_ramp(mix_ramp).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_format::SampleFormat;

    fn bridge(control: Arc<DecoderControl>, buffer: MusicBuffer, pipe: Arc<MusicPipe>) -> DecoderBridge {
        DecoderBridge::new(control, buffer, pipe, SongTime::ZERO, SongTime::ZERO, false)
    }

    #[tokio::test]
    async fn submit_audio_splits_across_chunks() {
        let control = Arc::new(DecoderControl::new());
        let buffer = MusicBuffer::new(8);
        let pipe = Arc::new(MusicPipe::new());
        let mut bridge = bridge(control, buffer, pipe.clone());

        let af = AudioFormat::new(48000, SampleFormat::S16, 2);
        bridge.ready(af, true, SignedSongTime::NEGATIVE).await;

        let frame = [1u8, 2, 3, 4];
        let big = frame.repeat(5000);
        bridge.submit_audio(af, &big, 0).await.unwrap();
        bridge.flush_partial_chunk();

        assert!(pipe.size() >= 1);
        let mut total = 0;
        while let Some(chunk) = pipe.shift() {
            total += chunk.read().len();
        }
        assert_eq!(total, big.len());
    }

    #[tokio::test]
    async fn seekable_stream_hides_initial_seek_and_skips_ahead() {
        let control = Arc::new(DecoderControl::new());
        let buffer = MusicBuffer::new(8);
        let pipe = Arc::new(MusicPipe::new());
        let af = AudioFormat::new(48000, SampleFormat::S16, 2);
        let mut bridge = DecoderBridge::new(
            control.clone(),
            buffer,
            pipe.clone(),
            SongTime::from_ms(500),
            SongTime::ZERO,
            true,
        );
        bridge.ready(af, true, SignedSongTime::NEGATIVE).await;

        let frame = [1u8, 2, 3, 4];
        bridge.submit_audio(af, &frame, 0).await.unwrap();

        // No command was ever queued externally: no seek result, no error.
        assert!(control.error().await.is_none());
        assert!(control.take_seek_result().await.is_none());
        assert_eq!(bridge.elapsed_frames, DecoderBridge::time_to_frames(af, SongTime::from_ms(500)) + 1);
    }

    #[tokio::test]
    async fn essential_initial_seek_failure_errors_when_not_seekable() {
        let control = Arc::new(DecoderControl::new());
        let buffer = MusicBuffer::new(8);
        let pipe = Arc::new(MusicPipe::new());
        let af = AudioFormat::new(48000, SampleFormat::S16, 2);
        let mut bridge = DecoderBridge::new(
            control.clone(),
            buffer,
            pipe,
            SongTime::from_ms(500),
            SongTime::ZERO,
            true,
        );
        bridge.ready(af, false, SignedSongTime::NEGATIVE).await;

        let frame = [1u8, 2, 3, 4];
        let err = bridge.submit_audio(af, &frame, 0).await;
        assert!(matches!(err, Err(EngineError::Interrupted)));
        assert!(control.error().await.is_some());
    }

    #[tokio::test]
    async fn end_time_truncates_submitted_data() {
        let control = Arc::new(DecoderControl::new());
        let buffer = MusicBuffer::new(8);
        let pipe = Arc::new(MusicPipe::new());
        let af = AudioFormat::new(1000, SampleFormat::S16, 1); // frame_size = 2
        let mut bridge = DecoderBridge::new(
            control,
            buffer,
            pipe.clone(),
            SongTime::ZERO,
            SongTime::from_ms(10), // 10 frames at 1000Hz
            false,
        );
        bridge.ready(af, true, SignedSongTime::NEGATIVE).await;

        let frame = [0u8, 1];
        let data = frame.repeat(20); // 20 frames submitted, only 10 allowed
        let result = bridge.submit_audio(af, &data, 0).await;
        assert!(matches!(result, Err(EngineError::Interrupted)));
        bridge.flush_partial_chunk();

        let mut total_bytes = 0;
        while let Some(chunk) = pipe.shift() {
            total_bytes += chunk.read().len();
        }
        assert_eq!(total_bytes, 10 * 2);
    }
}
