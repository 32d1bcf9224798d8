//! `PlayerControl`: the shared object linking clients to the player task.
//!
//! Grounded on `original_source/src/PlayerControl.hxx`: `state`, `command`,
//! `error_type`/error payload, cross-fade settings, ReplayGain mode, the
//! `seeking`/`border_pause` flags, and the `tagged_song` mailbox are all
//! named the same way here. The mutex+condvar pair becomes
//! `tokio::sync::{Mutex, Notify}`, per the convention set in
//! `decoder::control`.

use tokio::sync::{Mutex, Notify};

use crate::audio_format::{SignedSongTime, SongTime};
use crate::cross_fade::CrossFadeSettings;
use crate::error::SharedError;
use crate::music_chunk::Tag;
use crate::replay_gain::ReplayGainMode;

use super::QueuedSong;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    #[default]
    Stop,
    Pause,
    Play,
}

/// Mirrors `PlayerCommand` from `PlayerControl.hxx`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerCommand {
    Exit,
    Stop,
    Pause,
    Seek(SongTime),
    CloseAudio,
    UpdateAudio,
    /// A new song has been queued as `next_song`; take effect at the next
    /// song border.
    Queue,
    Cancel,
    Refresh,
}

#[derive(Debug, Clone)]
pub enum PlayerError {
    Decoder(SharedError),
    Output(SharedError),
}

#[derive(Default)]
struct Inner {
    state: PlayerState,
    command: Option<PlayerCommand>,
    error: Option<PlayerError>,
    cross_fade: CrossFadeSettings,
    replay_gain_mode: ReplayGainMode,
    seeking: bool,
    border_pause: bool,
    elapsed: SongTime,
    total_time: SignedSongTime,
    bit_rate: u16,
    tagged_song: Option<Tag>,
    /// The client-staged song to play next, consumed at the next song
    /// border (or sooner, by the queueing-ahead step). Mirrors
    /// `PlayerControl::next_song`.
    next_song: Option<QueuedSong>,
}

pub struct PlayerControl {
    inner: Mutex<Inner>,
    notify: Notify,
}

impl Default for PlayerControl {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerControl {
    pub fn new() -> Self {
        PlayerControl {
            inner: Mutex::new(Inner::default()),
            notify: Notify::new(),
        }
    }

    pub async fn state(&self) -> PlayerState {
        self.inner.lock().await.state
    }

    pub async fn set_state(&self, state: PlayerState) {
        let mut inner = self.inner.lock().await;
        inner.state = state;
        drop(inner);
        self.notify.notify_waiters();
    }

    /// Queues a command for the player task, overwriting any not-yet-seen
    /// command (matches the original: only the latest client command matters,
    /// since commands are synchronous and the client waits for completion).
    pub async fn send_command(&self, command: PlayerCommand) {
        let mut inner = self.inner.lock().await;
        inner.command = Some(command);
        drop(inner);
        self.notify.notify_waiters();
    }

    pub async fn take_command(&self) -> Option<PlayerCommand> {
        self.inner.lock().await.command.take()
    }

    pub async fn wait_for_command(&self) -> PlayerCommand {
        loop {
            if let Some(cmd) = self.take_command().await {
                return cmd;
            }
            self.notify.notified().await;
        }
    }

    pub async fn set_error(&self, error: PlayerError) {
        let mut inner = self.inner.lock().await;
        inner.error = Some(error);
        drop(inner);
        self.notify.notify_waiters();
    }

    pub async fn take_error(&self) -> Option<PlayerError> {
        self.inner.lock().await.error.take()
    }

    pub async fn cross_fade(&self) -> CrossFadeSettings {
        self.inner.lock().await.cross_fade
    }

    pub async fn set_cross_fade(&self, settings: CrossFadeSettings) {
        self.inner.lock().await.cross_fade = settings;
    }

    pub async fn replay_gain_mode(&self) -> ReplayGainMode {
        self.inner.lock().await.replay_gain_mode
    }

    pub async fn set_replay_gain_mode(&self, mode: ReplayGainMode) {
        self.inner.lock().await.replay_gain_mode = mode;
    }

    pub async fn set_border_pause(&self, value: bool) {
        self.inner.lock().await.border_pause = value;
    }

    pub async fn border_pause(&self) -> bool {
        self.inner.lock().await.border_pause
    }

    pub async fn set_seeking(&self, value: bool) {
        self.inner.lock().await.seeking = value;
    }

    pub async fn seeking(&self) -> bool {
        self.inner.lock().await.seeking
    }

    pub async fn update_position(&self, elapsed: SongTime, total_time: SignedSongTime, bit_rate: u16) {
        let mut inner = self.inner.lock().await;
        inner.elapsed = elapsed;
        inner.total_time = total_time;
        inner.bit_rate = bit_rate;
    }

    pub async fn elapsed(&self) -> SongTime {
        self.inner.lock().await.elapsed
    }

    /// Single-entry mailbox: a fresh tag overwrites any not-yet-collected one
    /// (mirrors `PlayerControl::tagged_song`).
    pub async fn post_tagged_song(&self, tag: Tag) {
        self.inner.lock().await.tagged_song = Some(tag);
    }

    pub async fn take_tagged_song(&self) -> Option<Tag> {
        self.inner.lock().await.tagged_song.take()
    }

    /// Stages `song` to play once the current one ends. A client calls this,
    /// then sends `PlayerCommand::Queue` so the player notices promptly.
    pub async fn queue_song(&self, song: QueuedSong) {
        self.inner.lock().await.next_song = Some(song);
        self.notify.notify_waiters();
    }

    pub async fn has_next_song(&self) -> bool {
        self.inner.lock().await.next_song.is_some()
    }

    /// Takes the staged song, if any, for the player loop to start decoding.
    pub async fn take_next_song(&self) -> Option<QueuedSong> {
        self.inner.lock().await.next_song.take()
    }

    /// Drops a staged-but-not-yet-started song (mirrors the `CANCEL`
    /// command's `pc.next_song.reset()`).
    pub async fn cancel_next_song(&self) {
        self.inner.lock().await.next_song = None;
    }
}
