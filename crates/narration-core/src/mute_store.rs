//! Persistence of the voice mute flag across restarts.

use crate::error::NarrationResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Well-known key the mute flag is stored under
pub const MUTE_STORAGE_KEY: &str = "voiceMuted";

/// Storage for the mute flag
pub trait MuteStore: Send + Sync + Debug {
    /// Read the persisted flag; `false` when nothing was stored yet
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read
    fn load(&self) -> NarrationResult<bool>;

    /// Persist the flag
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written
    fn save(&self, muted: bool) -> NarrationResult<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct VoiceState {
    #[serde(rename = "voiceMuted")]
    voice_muted: bool,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

/// Mute flag stored in a small JSON document
#[derive(Debug, Clone)]
pub struct FileMuteStore {
    path: PathBuf,
}

impl FileMuteStore {
    /// Store the flag in the file at `path`
    #[must_use]
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MuteStore for FileMuteStore {
    fn load(&self) -> NarrationResult<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        let content = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str::<VoiceState>(&content) {
            Ok(state) => Ok(state.voice_muted),
            Err(err) => {
                warn!("Ignoring unreadable voice state {:?}: {}", self.path, err);
                Ok(false)
            }
        }
    }

    fn save(&self, muted: bool) -> NarrationResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let state = VoiceState {
            voice_muted: muted,
            updated_at: Some(Utc::now()),
        };
        std::fs::write(&self.path, serde_json::to_string_pretty(&state)?)?;
        debug!(muted, "Persisted voice state to {:?}", self.path);
        Ok(())
    }
}

/// Mute flag held in memory only
#[derive(Debug, Default)]
pub struct MemoryMuteStore {
    muted: AtomicBool,
}

impl MemoryMuteStore {
    /// Create a store starting at `muted`
    #[must_use]
    pub const fn new(muted: bool) -> Self {
        Self {
            muted: AtomicBool::new(muted),
        }
    }
}

impl MuteStore for MemoryMuteStore {
    fn load(&self) -> NarrationResult<bool> {
        Ok(self.muted.load(Ordering::SeqCst))
    }

    fn save(&self, muted: bool) -> NarrationResult<()> {
        self.muted.store(muted, Ordering::SeqCst);
        Ok(())
    }
}
