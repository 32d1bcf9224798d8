//! Volume abstraction: hardware mixers (an external device the engine only
//! queries/sets through a trait), software mixing (folded into the
//! `Volume` filter), and a null mixer for outputs with no volume control.
//!
//! Grounded on `original_source/src/mixer/Mixer.hxx` for the trait shape
//! and `original_source/src/mixer/Listener.hxx`-style "last known value,
//! refreshed periodically" caching, generalized here as `MixerMemento`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::EngineError;

/// How stale a hardware mixer's cached volume is allowed to get before a
/// fresh query is made (spec's ambient-stack equivalent of the original's
/// periodic hardware poll).
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Something that can report and set a 0..=100 volume level. Hardware
/// implementations (ALSA, PulseAudio, …) are out of scope; only the
/// interface is.
#[async_trait]
pub trait Mixer: Send + Sync {
    async fn get_volume(&self) -> Result<Option<u8>, EngineError>;
    async fn set_volume(&self, volume: u8) -> Result<(), EngineError>;
}

/// Always reports no volume control; used by outputs with `mixer = "none"`.
pub struct NullMixer;

#[async_trait]
impl Mixer for NullMixer {
    async fn get_volume(&self) -> Result<Option<u8>, EngineError> {
        Ok(None)
    }

    async fn set_volume(&self, _volume: u8) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Keeps the current software volume level (0..=100) purely in memory, for
/// outputs with `mixer = "software"` — the actual attenuation happens in
/// the `Volume` filter, this just tracks the displayed/persisted level.
pub struct SoftwareMixer {
    level: Mutex<u8>,
}

impl Default for SoftwareMixer {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareMixer {
    pub fn new() -> Self {
        SoftwareMixer { level: Mutex::new(100) }
    }
}

#[async_trait]
impl Mixer for SoftwareMixer {
    async fn get_volume(&self) -> Result<Option<u8>, EngineError> {
        Ok(Some(*self.level.lock().await))
    }

    async fn set_volume(&self, volume: u8) -> Result<(), EngineError> {
        *self.level.lock().await = volume.min(100);
        Ok(())
    }
}

/// Throttles repeated hardware-volume queries: a real hardware mixer may be
/// slow (an ioctl, a D-Bus round-trip), so the engine re-reads at most once
/// per `REFRESH_INTERVAL` and serves the cached value in between.
pub struct MixerMemento {
    cached: Mutex<Option<(u8, Instant)>>,
}

impl Default for MixerMemento {
    fn default() -> Self {
        Self::new()
    }
}

impl MixerMemento {
    pub fn new() -> Self {
        MixerMemento { cached: Mutex::new(None) }
    }

    /// Returns the cached volume if still fresh, otherwise re-queries
    /// `mixer` and refreshes the cache.
    pub async fn volume(&self, mixer: &dyn Mixer) -> Result<Option<u8>, EngineError> {
        {
            let cache = self.cached.lock().await;
            if let Some((value, at)) = *cache {
                if at.elapsed() < REFRESH_INTERVAL {
                    return Ok(Some(value));
                }
            }
        }
        let fresh = mixer.get_volume().await?;
        if let Some(value) = fresh {
            *self.cached.lock().await = Some((value, Instant::now()));
        }
        Ok(fresh)
    }

    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn software_mixer_clamps_to_100() {
        let mixer = SoftwareMixer::new();
        mixer.set_volume(150).await.unwrap();
        assert_eq!(mixer.get_volume().await.unwrap(), Some(100));
    }

    #[tokio::test]
    async fn null_mixer_reports_no_volume() {
        let mixer = NullMixer;
        assert_eq!(mixer.get_volume().await.unwrap(), None);
    }

    #[tokio::test]
    async fn memento_serves_cached_value_within_refresh_window() {
        let mixer = SoftwareMixer::new();
        mixer.set_volume(42).await.unwrap();
        let memento = MixerMemento::new();
        assert_eq!(memento.volume(&mixer).await.unwrap(), Some(42));
        mixer.set_volume(99).await.unwrap();
        // still within the refresh window: cached value served
        assert_eq!(memento.volume(&mixer).await.unwrap(), Some(42));
    }
}
