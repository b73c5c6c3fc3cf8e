//! # Narration Core
//!
//! Spoken narration for interactive applications: a single-flight,
//! priority-ordered queue that turns text into speech through a remote
//! synthesis relay and plays it back one utterance at a time.
//!
//! ## Features
//!
//! - Priority queue (high, medium, low) with FIFO order inside a priority
//! - `|` pause markers that split text into segments with audible gaps
//! - Once-per-session narration keyed by caller-chosen strings
//! - Global mute persisted across restarts
//! - Lifecycle hooks for start, end and error
//! - Relay and direct ElevenLabs synthesizers, plus the relay's server side
//!
//! ## Example
//!
//! ```rust,no_run
//! use narration_core::{NarrationConfig, NarrationEngine, Priority, SpeakOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = NarrationEngine::from_config(NarrationConfig::default().with_env_overrides())?;
//!
//!     engine.speak_once(
//!         "welcome",
//!         "Welcome back.|Let's pick up where you left off.",
//!         SpeakOptions::new().with_priority(Priority::High),
//!     );
//!
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod audio_device;
pub mod config;
pub mod engine;
pub mod error;
pub mod mute_store;
pub mod queue;
pub mod relay;
pub mod request;
pub mod session;
pub mod splitter;
pub mod synthesis;

// Re-export main types for convenience
pub use audio_device::{AudioConfig, AudioSink, SimulatedAudioDevice};
pub use config::{NarrationConfig, DEFAULT_VOICE_ID};
pub use engine::{NarrationEngine, NarrationEngineBuilder, Notice};
pub use error::{NarrationError, NarrationResult};
pub use mute_store::{FileMuteStore, MemoryMuteStore, MuteStore};
pub use queue::{PendingQueue, PlaybackState, QueueEntry};
pub use relay::{RelayRequest, RelayResponse};
pub use request::{ErrorHook, Hook, LifecycleHooks, Priority, SpeakOptions};
pub use session::SessionMemory;
pub use splitter::{split_request, PAUSE_DELIMITER};
pub use synthesis::{
    ElevenLabsSynthesizer, RelaySynthesizer, SpeechSynthesizer, SynthesisRequest,
    SynthesizedAudio, VoiceSettings,
};

/// Version information for the narration-core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum text length accepted for a single segment
pub const MAX_TEXT_LENGTH: usize = 5_000;
