//! Narration requests: priority, voice selection and lifecycle hooks.

use crate::error::{NarrationError, NarrationResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Callback fired on start or end of a queue entry
pub type Hook = Arc<dyn Fn() + Send + Sync>;

/// Callback fired when a queue entry fails
pub type ErrorHook = Arc<dyn Fn(&NarrationError) + Send + Sync>;

/// Queue position of a narration request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Played before everything else
    High,
    /// Default priority
    #[default]
    Medium,
    /// Played after everything else
    Low,
}

impl Priority {
    /// Numeric weight used to order the queue (higher plays first)
    #[must_use]
    pub const fn weight(self) -> u8 {
        match self {
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

impl FromStr for Priority {
    type Err = NarrationError;

    fn from_str(s: &str) -> NarrationResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(NarrationError::invalid_input(format!(
                "Unknown priority '{other}', expected high, medium or low"
            ))),
        }
    }
}

/// Optional caller callbacks for a narration request
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    /// Fired when an entry starts synthesizing
    pub on_start: Option<Hook>,
    /// Fired when an entry finishes playing
    pub on_end: Option<Hook>,
    /// Fired once when an entry fails
    pub on_error: Option<ErrorHook>,
}

impl LifecycleHooks {
    /// Whether no hook is set
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.on_start.is_none() && self.on_end.is_none() && self.on_error.is_none()
    }
}

impl fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("on_start", &self.on_start.is_some())
            .field("on_end", &self.on_end.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Options accompanying `speak` / `speak_once`
#[derive(Debug, Clone, Default)]
pub struct SpeakOptions {
    /// Queue priority
    pub priority: Priority,
    /// Voice profile; the engine default is used when absent
    pub voice_id: Option<String>,
    /// Lifecycle callbacks
    pub hooks: LifecycleHooks,
}

impl SpeakOptions {
    /// Create options with medium priority, default voice and no hooks
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the queue priority
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Select a synthesis voice
    #[must_use]
    pub fn with_voice<S: Into<String>>(mut self, voice_id: S) -> Self {
        self.voice_id = Some(voice_id.into());
        self
    }

    /// Set the `on_start` hook
    #[must_use]
    pub fn on_start<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hooks.on_start = Some(Arc::new(hook));
        self
    }

    /// Set the `on_end` hook
    #[must_use]
    pub fn on_end<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hooks.on_end = Some(Arc::new(hook));
        self
    }

    /// Set the `on_error` hook
    #[must_use]
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&NarrationError) + Send + Sync + 'static,
    {
        self.hooks.on_error = Some(Arc::new(hook));
        self
    }
}
