//! `DecoderControl`: the command/state channel a player uses to drive the
//! decoder task, and the decoder uses to report back.
//!
//! Grounded on `original_source/src/decoder/DecoderControl.hxx`: the
//! original pairs a mutex with a condvar (`Wait`/`Signal`) around a shared
//! `DecoderControl` struct. Here the mutex guards an `Inner` struct and
//! `tokio::sync::Notify` stands in for the condvar, per the concurrency
//! convention established for `MusicPipe`/`MusicBuffer`.

use std::sync::Arc;

use tokio::sync::{Mutex, Notify};

use crate::audio_format::{AudioFormat, SignedSongTime, SongTime};
use crate::error::{EngineError, SharedError};
use crate::mix_ramp::MixRampInfo;
use crate::music_chunk::MusicBuffer;
use crate::music_pipe::MusicPipe;
use crate::replay_gain::ReplayGainMode;

use super::bridge::DecoderPlugin;

/// Mirrors `DecoderState` from `DecoderControl.hxx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecoderState {
    #[default]
    Stop,
    Start,
    Decode,
    Error,
}

/// A request queued for the decoder task to notice and act on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecoderCommand {
    Start {
        start_time: SongTime,
        end_time: SongTime,
        /// If the virtual initial seek to `start_time` fails (stream not
        /// seekable), whether that should be treated as a real decode
        /// failure rather than silently played from the beginning. Mirrors
        /// `DecoderControl::initial_seek_essential`.
        initial_seek_essential: bool,
    },
    Stop,
    Seek(SongTime),
}

/// Everything `wait_for_start` hands back to the decoder task for one song:
/// the song's buffer/pipe, the plugin that will decode it, and the
/// start/end bounds requested for it.
pub struct StartParams {
    pub buffer: MusicBuffer,
    pub pipe: Arc<MusicPipe>,
    pub plugin: Box<dyn DecoderPlugin>,
    pub start_time: SongTime,
    pub end_time: SongTime,
    pub initial_seek_essential: bool,
}

struct Inner {
    state: DecoderState,
    pending: Option<DecoderCommand>,
    song: Option<(MusicBuffer, Arc<MusicPipe>)>,
    plugin: Option<Box<dyn DecoderPlugin>>,
    error: Option<SharedError>,
    /// Set by the decoder once it has honoured the most recent command, so
    /// the caller can await completion (mirrors `DecoderControl::WaitCommandLocked`).
    command_done: bool,
    seek_result: Option<Result<(), EngineError>>,
    /// Output format and total duration, latched from `ready()` once the
    /// current song reaches `Decode` (mirrors `dc.out_audio_format`/
    /// `dc.total_time`).
    format: AudioFormat,
    total_time: SignedSongTime,
    replay_gain_mode: ReplayGainMode,
    /// Scalar dB gain for the current song, set from `SubmitReplayGain`.
    replay_gain_db: f32,
    mix_ramp: MixRampInfo,
}

pub struct DecoderControl {
    inner: Mutex<Inner>,
    notify: Notify,
}

impl Default for DecoderControl {
    fn default() -> Self {
        Self::new()
    }
}

impl DecoderControl {
    pub fn new() -> Self {
        DecoderControl {
            inner: Mutex::new(Inner {
                state: DecoderState::Stop,
                pending: None,
                song: None,
                plugin: None,
                error: None,
                command_done: true,
                seek_result: None,
                format: AudioFormat::undefined(),
                total_time: SignedSongTime::NEGATIVE,
                replay_gain_mode: ReplayGainMode::Off,
                replay_gain_db: 0.0,
                mix_ramp: MixRampInfo::default(),
            }),
            notify: Notify::new(),
        }
    }

    /// Queues a new song for decoding and wakes the decoder task. `plugin`
    /// is the codec that will drive this one song; it is handed back to the
    /// decoder task via `wait_for_start`, so the same `DecoderControl` (and
    /// decoder task) can sequence through many songs, each with its own
    /// plugin instance.
    #[allow(clippy::too_many_arguments)]
    pub async fn start(
        &self,
        buffer: MusicBuffer,
        pipe: Arc<MusicPipe>,
        plugin: Box<dyn DecoderPlugin>,
        start_time: SongTime,
        end_time: SongTime,
        initial_seek_essential: bool,
    ) {
        let mut inner = self.inner.lock().await;
        inner.song = Some((buffer, pipe));
        inner.plugin = Some(plugin);
        inner.pending = Some(DecoderCommand::Start {
            start_time,
            end_time,
            initial_seek_essential,
        });
        inner.error = None;
        inner.command_done = false;
        // Leave `Stop` immediately so a caller polling `state()` right after
        // `start()` (before the decoder task has even been scheduled) sees
        // this song as in flight rather than mistaking a stale `Stop` for
        // "already finished".
        inner.state = DecoderState::Start;
        drop(inner);
        self.notify.notify_waiters();
    }

    /// Requests the decoder stop as soon as possible; cooperative, honoured
    /// the next time the decoder checks in (spec §8 property #10).
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        inner.pending = Some(DecoderCommand::Stop);
        inner.command_done = false;
        drop(inner);
        self.notify.notify_waiters();
    }

    pub async fn seek(&self, time: SongTime) {
        let mut inner = self.inner.lock().await;
        inner.pending = Some(DecoderCommand::Seek(time));
        inner.command_done = false;
        inner.seek_result = None;
        drop(inner);
        self.notify.notify_waiters();
    }

    /// The decoder task's idle loop: waits for a `Start` command, then hands
    /// the song's buffer/pipe/plugin back to the caller (consuming the
    /// command).
    pub async fn wait_for_start(&self) -> Option<StartParams> {
        loop {
            {
                let mut inner = self.inner.lock().await;
                if let Some(DecoderCommand::Start {
                    start_time,
                    end_time,
                    initial_seek_essential,
                }) = inner.pending
                {
                    inner.pending = None;
                    inner.command_done = true;
                    let (buffer, pipe) = inner.song.clone()?;
                    let plugin = inner.plugin.take()?;
                    return Some(StartParams {
                        buffer,
                        pipe,
                        plugin,
                        start_time,
                        end_time,
                        initial_seek_essential,
                    });
                }
            }
            self.notify.notified().await;
        }
    }

    /// Non-blocking check used by a running decode loop: has the caller
    /// asked us to stop or seek?
    pub async fn take_pending(&self) -> Option<DecoderCommand> {
        let mut inner = self.inner.lock().await;
        inner.pending.take()
    }

    pub async fn acknowledge_seek(&self, result: Result<(), EngineError>) {
        let mut inner = self.inner.lock().await;
        inner.seek_result = Some(result);
        inner.command_done = true;
        drop(inner);
        self.notify.notify_waiters();
    }

    pub async fn state(&self) -> DecoderState {
        self.inner.lock().await.state
    }

    pub async fn set_state(&self, state: DecoderState) {
        let mut inner = self.inner.lock().await;
        inner.state = state;
        drop(inner);
        self.notify.notify_waiters();
    }

    /// Sets `new` only if the current state is still `expected`, so a late
    /// "finished" transition can't clobber a state a fresher `start()` call
    /// has already moved past.
    pub async fn set_state_if(&self, expected: DecoderState, new: DecoderState) {
        let mut inner = self.inner.lock().await;
        if inner.state == expected {
            inner.state = new;
        }
        drop(inner);
        self.notify.notify_waiters();
    }

    pub async fn set_error(&self, err: EngineError) {
        let mut inner = self.inner.lock().await;
        inner.state = DecoderState::Error;
        inner.error = Some(Arc::new(err));
        drop(inner);
        self.notify.notify_waiters();
    }

    pub async fn error(&self) -> Option<SharedError> {
        self.inner.lock().await.error.clone()
    }

    /// True once the decoder has acted on the most recently issued command.
    pub async fn command_done(&self) -> bool {
        self.inner.lock().await.command_done
    }

    pub async fn take_seek_result(&self) -> Option<Result<(), EngineError>> {
        self.inner.lock().await.seek_result.take()
    }

    /// Latches the output format and total duration once the current song
    /// is ready to decode (mirrors `DecoderClient::Ready` setting
    /// `dc.out_audio_format`/`dc.total_time`).
    pub async fn set_ready_info(&self, format: AudioFormat, total_time: SignedSongTime) {
        let mut inner = self.inner.lock().await;
        inner.format = format;
        inner.total_time = total_time;
    }

    pub async fn format(&self) -> AudioFormat {
        self.inner.lock().await.format
    }

    pub async fn total_time(&self) -> SignedSongTime {
        self.inner.lock().await.total_time
    }

    pub async fn replay_gain_mode(&self) -> ReplayGainMode {
        self.inner.lock().await.replay_gain_mode
    }

    pub async fn set_replay_gain_mode(&self, mode: ReplayGainMode) {
        self.inner.lock().await.replay_gain_mode = mode;
    }

    pub async fn replay_gain_db(&self) -> f32 {
        self.inner.lock().await.replay_gain_db
    }

    pub async fn set_replay_gain_db(&self, db: f32) {
        self.inner.lock().await.replay_gain_db = db;
    }

    pub async fn mix_ramp(&self) -> MixRampInfo {
        self.inner.lock().await.mix_ramp.clone()
    }

    pub async fn set_mix_ramp(&self, mix_ramp: MixRampInfo) {
        self.inner.lock().await.mix_ramp = mix_ramp;
    }
}
