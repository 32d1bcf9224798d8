//! `OutputControl`: per-sink state, command set, and the 10s fail/reopen
//! policy.
//!
//! Grounded on `original_source/src/output/Control.hxx` (called
//! `AudioOutputControl` there): the `enabled`/`really_enabled`/`open`/
//! `pause`/`allow_play`/`killed`/`caught_interrupted` flags are named the
//! same way here, as is the `fail_timer` that suppresses auto-reopen.

use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Notify};

use crate::audio_format::AudioFormat;
use crate::error::SharedError;

/// Mirrors the output command set of spec §4.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputCommand {
    Enable,
    Disable,
    Open,
    Close,
    Pause,
    Release,
    Drain,
    Cancel,
    Kill,
}

/// How long after a failed open/play the output waits before the player is
/// allowed to ask it to reopen, unless `force` bypasses the timer.
pub const FAIL_TIMER_DURATION: Duration = Duration::from_secs(10);

struct Inner {
    enabled: bool,
    really_enabled: bool,
    open: bool,
    pause: bool,
    allow_play: bool,
    killed: bool,
    caught_interrupted: bool,
    fail_timer: Option<Instant>,
    last_error: Option<SharedError>,
    format: AudioFormat,
    pending: Option<OutputCommand>,
}

impl Default for Inner {
    fn default() -> Self {
        Inner {
            enabled: true,
            really_enabled: false,
            open: false,
            pause: false,
            allow_play: true,
            killed: false,
            caught_interrupted: false,
            fail_timer: None,
            last_error: None,
            format: AudioFormat::undefined(),
            pending: None,
        }
    }
}

pub struct OutputControl {
    name: String,
    inner: Mutex<Inner>,
    notify: Notify,
}

impl OutputControl {
    pub fn new(name: impl Into<String>) -> Self {
        OutputControl {
            name: name.into(),
            inner: Mutex::new(Inner::default()),
            notify: Notify::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn send_command(&self, command: OutputCommand) {
        let mut inner = self.inner.lock().await;
        inner.pending = Some(command);
        drop(inner);
        self.notify.notify_waiters();
    }

    pub async fn take_command(&self) -> Option<OutputCommand> {
        self.inner.lock().await.pending.take()
    }

    pub async fn is_enabled(&self) -> bool {
        self.inner.lock().await.enabled
    }

    pub async fn set_enabled(&self, value: bool) {
        self.inner.lock().await.enabled = value;
    }

    pub async fn is_open(&self) -> bool {
        self.inner.lock().await.open
    }

    pub async fn set_open(&self, value: bool) {
        let mut inner = self.inner.lock().await;
        inner.open = value;
        inner.really_enabled = value && inner.enabled;
    }

    pub async fn is_paused(&self) -> bool {
        self.inner.lock().await.pause
    }

    pub async fn set_paused(&self, value: bool) {
        self.inner.lock().await.pause = value;
    }

    /// Whether the worker loop may currently hand new PCM to the sink. Set
    /// to `false` while a `Pause` is in effect and restored by `Release`.
    pub async fn allow_play(&self) -> bool {
        self.inner.lock().await.allow_play
    }

    pub async fn set_allow_play(&self, value: bool) {
        self.inner.lock().await.allow_play = value;
    }

    pub async fn format(&self) -> AudioFormat {
        self.inner.lock().await.format
    }

    pub async fn set_format(&self, format: AudioFormat) {
        self.inner.lock().await.format = format;
    }

    /// Records a failure and starts (or restarts) the fail timer.
    pub async fn record_failure(&self, error: SharedError) {
        let mut inner = self.inner.lock().await;
        inner.last_error = Some(error);
        inner.fail_timer = Some(Instant::now());
        inner.open = false;
        inner.really_enabled = false;
    }

    pub async fn last_error(&self) -> Option<SharedError> {
        self.inner.lock().await.last_error.clone()
    }

    /// Whether a reopen attempt is currently allowed: either no failure is
    /// on record, the fail timer has elapsed, or `force` bypasses it
    /// (mirrors the original's `Play(force)`).
    pub async fn reopen_allowed(&self, force: bool) -> bool {
        if force {
            return true;
        }
        let inner = self.inner.lock().await;
        match inner.fail_timer {
            None => true,
            Some(since) => since.elapsed() >= FAIL_TIMER_DURATION,
        }
    }

    pub async fn kill(&self) {
        self.inner.lock().await.killed = true;
    }

    pub async fn is_killed(&self) -> bool {
        self.inner.lock().await.killed
    }

    pub async fn note_interrupted(&self) {
        self.inner.lock().await.caught_interrupted = true;
    }

    pub async fn take_interrupted(&self) -> bool {
        let mut inner = self.inner.lock().await;
        std::mem::take(&mut inner.caught_interrupted)
    }
}
