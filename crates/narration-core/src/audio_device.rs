//! Audio output for synthesized narration.

use crate::error::{NarrationError, NarrationResult};
use crate::synthesis::SynthesizedAudio;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Where synthesized audio is played
#[async_trait]
pub trait AudioSink: Send + Sync + Debug {
    /// Play `audio`, resolving once playback completes naturally.
    ///
    /// # Errors
    ///
    /// Returns [`NarrationError::PlaybackBlocked`] when the environment
    /// refuses to start audio, and [`NarrationError::PlaybackError`] when the
    /// audio cannot be decoded or played
    async fn play(&self, audio: &SynthesizedAudio) -> NarrationResult<()>;

    /// Halt in-flight playback immediately
    fn halt(&self);
}

/// Audio device configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AudioConfig {
    /// Nominal bitrate used to estimate how long an MP3 payload plays
    pub bitrate_kbps: u32,
    /// Longest simulated playback
    pub max_duration: Duration,
    /// Output volume (0.0 to 1.0)
    pub volume: f32,
    /// Refuse playback until [`SimulatedAudioDevice::record_user_gesture`]
    pub require_user_gesture: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            bitrate_kbps: 128,
            max_duration: Duration::from_secs(60),
            volume: 1.0,
            require_user_gesture: false,
        }
    }
}

/// Audio device that plays payloads for their estimated duration without
/// producing sound. Used headless and in tests.
#[derive(Debug)]
pub struct SimulatedAudioDevice {
    config: AudioConfig,
    playing: AtomicBool,
    gesture_seen: AtomicBool,
    completed: AtomicU64,
    halted: Notify,
}

struct PlayingGuard<'a>(&'a AtomicBool);

impl Drop for PlayingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SimulatedAudioDevice {
    /// Create a device with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(AudioConfig::default())
    }

    /// Create a device with custom configuration
    #[must_use]
    pub fn with_config(config: AudioConfig) -> Self {
        info!("Creating simulated audio device with config: {:?}", config);
        Self {
            config,
            playing: AtomicBool::new(false),
            gesture_seen: AtomicBool::new(false),
            completed: AtomicU64::new(0),
            halted: Notify::new(),
        }
    }

    /// Record a user interaction, lifting the autoplay restriction
    pub fn record_user_gesture(&self) {
        self.gesture_seen.store(true, Ordering::SeqCst);
    }

    /// How long `audio` plays at the configured bitrate
    #[must_use]
    pub fn playback_duration(&self, audio: &SynthesizedAudio) -> Duration {
        let bits = audio.len() as u64 * 8;
        let bits_per_ms = u64::from(self.config.bitrate_kbps.max(1));
        Duration::from_millis(bits / bits_per_ms).min(self.config.max_duration)
    }

    /// Check if audio is currently playing
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    /// Number of payloads played to completion
    #[must_use]
    pub fn completed_count(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    /// Get current audio configuration
    #[must_use]
    pub const fn config(&self) -> &AudioConfig {
        &self.config
    }
}

impl Default for SimulatedAudioDevice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioSink for SimulatedAudioDevice {
    async fn play(&self, audio: &SynthesizedAudio) -> NarrationResult<()> {
        if audio.is_empty() {
            return Err(NarrationError::playback("Audio payload is empty"));
        }
        if self.config.require_user_gesture && !self.gesture_seen.load(Ordering::SeqCst) {
            warn!("Autoplay prevented - user interaction required first");
            return Err(NarrationError::playback_blocked(
                "user interaction required before audio can start",
            ));
        }
        if self.playing.swap(true, Ordering::SeqCst) {
            return Err(NarrationError::playback("Audio device is busy"));
        }
        let _guard = PlayingGuard(&self.playing);

        let duration = self.playback_duration(audio);
        debug!(
            "Simulating {} bytes of {} for {:?}",
            audio.len(),
            audio.mime_type,
            duration
        );

        tokio::select! {
            () = tokio::time::sleep(duration) => {
                self.completed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            () = self.halted.notified() => {
                debug!("Simulated playback halted");
                Ok(())
            }
        }
    }

    fn halt(&self) {
        if self.is_playing() {
            info!("Halting simulated audio playback");
        }
        self.halted.notify_waiters();
    }
}
