//! The narration engine: a single-flight, priority-ordered playback queue.
//!
//! Callers submit text through [`NarrationEngine::speak`] or
//! [`NarrationEngine::speak_once`]. A background worker drains the queue one
//! entry at a time: it pops the highest-priority entry, synthesizes it, plays
//! it, and moves on whether the entry succeeded or failed. [`stop`] and
//! muting discard everything pending and abandon the entry in flight.
//!
//! Every [`stop`] starts a new epoch. The worker tags the entry it pops with
//! the epoch it was popped in; state transitions and hooks for an entry from
//! an older epoch are dropped, so nothing discarded ever reports back.
//!
//! [`stop`]: NarrationEngine::stop

use crate::audio_device::{AudioSink, SimulatedAudioDevice};
use crate::config::NarrationConfig;
use crate::error::{NarrationError, NarrationResult};
use crate::mute_store::{FileMuteStore, MemoryMuteStore, MuteStore};
use crate::queue::{EndHook, PendingQueue, PlaybackState, QueueEntry};
use crate::request::SpeakOptions;
use crate::session::SessionMemory;
use crate::splitter::split_request_with_pause;
use crate::synthesis::{RelaySynthesizer, SpeechSynthesizer, SynthesisRequest, SynthesizedAudio};
use parking_lot::{Mutex, ReentrantMutex};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const NOTICE_CAPACITY: usize = 16;

/// User-facing notices raised by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The voice provider is out of credits
    QuotaExhausted {
        /// Short headline
        title: String,
        /// What the user should do
        description: String,
    },
}

impl Notice {
    fn quota_exhausted() -> Self {
        Self::QuotaExhausted {
            title: "ElevenLabs Credits Depleted".to_string(),
            description:
                "Please add more credits at elevenlabs.io to continue using voice features."
                    .to_string(),
        }
    }
}

#[derive(Default)]
struct Shared {
    queue: PendingQueue,
    muted: bool,
    epoch: u64,
}

struct Inner {
    config: NarrationConfig,
    shared: Mutex<Shared>,
    hook_gate: ReentrantMutex<()>,
    session: SessionMemory,
    mute_store: Arc<dyn MuteStore>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    sink: Arc<dyn AudioSink>,
    state_tx: watch::Sender<PlaybackState>,
    stop_tx: watch::Sender<u64>,
    notices: broadcast::Sender<Notice>,
    wake: Notify,
}

struct Worker(JoinHandle<()>);

impl Drop for Worker {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Handle to a narration engine.
///
/// Clones share the same queue, session memory and worker. The worker stops
/// when the last handle is dropped.
#[derive(Clone)]
pub struct NarrationEngine {
    inner: Arc<Inner>,
    _worker: Arc<Worker>,
}

impl std::fmt::Debug for NarrationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NarrationEngine")
            .field("state", &self.state())
            .field("pending", &self.pending_len())
            .field("muted", &self.is_muted())
            .field("synthesizer", &self.inner.synthesizer.name())
            .finish_non_exhaustive()
    }
}

/// Builder for [`NarrationEngine`]
#[derive(Debug)]
pub struct NarrationEngineBuilder {
    config: NarrationConfig,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    sink: Arc<dyn AudioSink>,
    session: Option<SessionMemory>,
    mute_store: Option<Arc<dyn MuteStore>>,
}

impl NarrationEngineBuilder {
    /// Use `config` instead of the defaults
    #[must_use]
    pub fn config(mut self, config: NarrationConfig) -> Self {
        self.config = config;
        self
    }

    /// Share `session` with other engines instead of starting a fresh one
    #[must_use]
    pub fn session_memory(mut self, session: SessionMemory) -> Self {
        self.session = Some(session);
        self
    }

    /// Persist the mute flag in `store` (in memory by default)
    #[must_use]
    pub fn mute_store(mut self, store: Arc<dyn MuteStore>) -> Self {
        self.mute_store = Some(store);
        self
    }

    /// Build the engine and start its worker on the current Tokio runtime
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or no Tokio runtime
    /// is running
    pub fn build(self) -> NarrationResult<NarrationEngine> {
        self.config.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            NarrationError::configuration("NarrationEngine must be built inside a Tokio runtime")
        })?;

        let mute_store: Arc<dyn MuteStore> = match self.mute_store {
            Some(store) => store,
            None => Arc::new(MemoryMuteStore::default()),
        };
        let muted = mute_store.load().unwrap_or_else(|err| {
            warn!("Failed to read persisted mute state: {}", err);
            false
        });

        let (state_tx, _) = watch::channel(PlaybackState::Idle);
        let (stop_tx, stop_rx) = watch::channel(0);
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);

        let inner = Arc::new(Inner {
            config: self.config,
            shared: Mutex::new(Shared {
                muted,
                ..Shared::default()
            }),
            hook_gate: ReentrantMutex::new(()),
            session: self.session.unwrap_or_default(),
            mute_store,
            synthesizer: self.synthesizer,
            sink: self.sink,
            state_tx,
            stop_tx,
            notices,
            wake: Notify::new(),
        });

        info!(
            synthesizer = inner.synthesizer.name(),
            muted, "Narration engine started"
        );
        let worker = runtime.spawn(inner.clone().run(stop_rx));

        Ok(NarrationEngine {
            inner,
            _worker: Arc::new(Worker(worker)),
        })
    }
}

impl NarrationEngine {
    /// Start building an engine around a synthesizer and an audio sink
    #[must_use]
    pub fn builder(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        sink: Arc<dyn AudioSink>,
    ) -> NarrationEngineBuilder {
        NarrationEngineBuilder {
            config: NarrationConfig::default(),
            synthesizer,
            sink,
            session: None,
            mute_store: None,
        }
    }

    /// Build an engine that talks to the configured relay, plays through a
    /// simulated device and persists mute state in the state directory
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the state directory
    /// cannot be resolved, or no Tokio runtime is running
    pub fn from_config(config: NarrationConfig) -> NarrationResult<Self> {
        let synthesizer = Arc::new(RelaySynthesizer::from_config(&config)?);
        let store = Arc::new(FileMuteStore::new(config.state_file()?));
        Self::builder(synthesizer, Arc::new(SimulatedAudioDevice::new()))
            .config(config)
            .mute_store(store)
            .build()
    }

    /// Queue `text` for narration.
    ///
    /// Returns the number of entries queued: zero when muted or when the text
    /// holds nothing but pause markers and whitespace. In that case no hook
    /// ever fires.
    pub fn speak(&self, text: &str, options: SpeakOptions) -> usize {
        self.submit(None, text, &options)
    }

    /// Queue `text` unless `key` was already spoken this session.
    ///
    /// A repeated key is a complete no-op and returns zero. While muted the
    /// key is left unrecorded, so the narration can still play after unmute.
    pub fn speak_once(&self, key: &str, text: &str, options: SpeakOptions) -> usize {
        self.submit(Some(key), text, &options)
    }

    fn submit(&self, key: Option<&str>, text: &str, options: &SpeakOptions) -> usize {
        let entries = split_request_with_pause(text, options, self.inner.config.segment_pause());
        let queued = entries.len();
        {
            let mut shared = self.inner.shared.lock();
            if shared.muted {
                debug!("Voice muted; dropping narration request");
                return 0;
            }
            if let Some(key) = key {
                if !self.inner.session.add(key) {
                    debug!(key, "Narration already spoken this session");
                    return 0;
                }
            }
            if entries.is_empty() {
                debug!("Narration request has no speakable segments");
                return 0;
            }
            for entry in entries {
                shared.queue.push(entry);
            }
        }
        debug!(queued, priority = %options.priority, "Queued narration");
        self.inner.wake.notify_one();
        queued
    }

    /// Discard every pending entry and halt the one in flight.
    ///
    /// Discarded entries are abandoned: none of their hooks fire. A hook
    /// already running finishes before this returns.
    pub fn stop(&self) {
        let discarded = self.inner.stop();
        info!(discarded, "Narration stopped");
    }

    /// Set the mute flag and persist it. Muting stops playback; unmuting
    /// does not bring back anything that was discarded.
    pub fn set_muted(&self, muted: bool) {
        self.inner.shared.lock().muted = muted;
        self.inner.apply_mute(muted);
    }

    /// Flip the mute flag, returning the new value
    pub fn toggle_mute(&self) -> bool {
        let muted = {
            let mut shared = self.inner.shared.lock();
            shared.muted = !shared.muted;
            shared.muted
        };
        self.inner.apply_mute(muted);
        muted
    }

    /// Forget every key recorded by [`speak_once`](Self::speak_once)
    pub fn clear_session_memory(&self) {
        self.inner.session.clear();
    }

    /// Whether an entry is synthesizing or playing
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.state().is_active()
    }

    /// Whether voice output is muted
    #[must_use]
    pub fn is_muted(&self) -> bool {
        self.inner.shared.lock().muted
    }

    /// Current playback state
    #[must_use]
    pub fn state(&self) -> PlaybackState {
        *self.inner.state_tx.borrow()
    }

    /// Observe playback state changes
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<PlaybackState> {
        self.inner.state_tx.subscribe()
    }

    /// Receive user-facing notices
    #[must_use]
    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.inner.notices.subscribe()
    }

    /// Number of entries waiting to play
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.inner.shared.lock().queue.len()
    }

    /// Session memory used by [`speak_once`](Self::speak_once)
    #[must_use]
    pub fn session_memory(&self) -> &SessionMemory {
        &self.inner.session
    }

    /// Engine configuration
    #[must_use]
    pub fn config(&self) -> &NarrationConfig {
        &self.inner.config
    }
}

impl Inner {
    async fn run(self: Arc<Self>, mut stop_rx: watch::Receiver<u64>) {
        loop {
            let Some((entry, epoch)) = self.next_entry() else {
                self.wake.notified().await;
                continue;
            };

            tokio::select! {
                biased;
                () = wait_for_stop(&mut stop_rx, epoch) => {
                    debug!(request = %entry_id(&entry), "Abandoned narration entry");
                }
                () = self.process(&entry, epoch) => {}
            }
            self.transition(epoch, PlaybackState::Idle);
        }
    }

    fn next_entry(&self) -> Option<(QueueEntry, u64)> {
        let mut shared = self.shared.lock();
        if shared.muted {
            return None;
        }
        let epoch = shared.epoch;
        shared.queue.pop().map(|entry| (entry, epoch))
    }

    /// Move to `next` unless a stop happened since `epoch`.
    fn transition(&self, epoch: u64, next: PlaybackState) -> bool {
        let shared = self.shared.lock();
        if shared.epoch != epoch {
            return false;
        }
        self.state_tx.send_if_modified(|state| {
            let changed = *state != next;
            *state = next;
            changed
        });
        true
    }

    /// Run `hook` unless a stop happened since `epoch`. A concurrent
    /// `stop` waits for a hook already running to return.
    fn fire_if_current(&self, epoch: u64, hook: impl FnOnce()) {
        let _gate = self.hook_gate.lock();
        if self.shared.lock().epoch == epoch {
            hook();
        }
    }

    fn stop(&self) -> usize {
        let _gate = self.hook_gate.lock();
        let mut shared = self.shared.lock();
        shared.epoch += 1;
        self.stop_tx.send_replace(shared.epoch);
        self.state_tx.send_replace(PlaybackState::Idle);
        // Halt before the worker can pop an entry of the new epoch.
        self.sink.halt();
        shared.queue.clear()
    }

    fn apply_mute(&self, muted: bool) {
        if let Err(err) = self.mute_store.save(muted) {
            warn!("Failed to persist mute state: {}", err);
        }
        if muted {
            let discarded = self.stop();
            info!(discarded, "Voice muted");
        } else {
            info!("Voice unmuted");
        }
    }

    async fn process(&self, entry: &QueueEntry, epoch: u64) {
        if !self.transition(epoch, PlaybackState::Synthesizing) {
            return;
        }
        self.fire_if_current(epoch, || entry.hooks.notify_start());

        let audio = match self.synthesize(entry).await {
            Ok(audio) => audio,
            Err(err) => {
                self.fail(entry, epoch, &err);
                return;
            }
        };

        if !self.transition(epoch, PlaybackState::Playing) {
            return;
        }
        let played = self.sink.play(&audio).await;
        drop(audio);

        match played {
            Ok(()) => self.finish(entry, epoch).await,
            Err(err) if err.is_soft_failure() => {
                warn!(request = %entry_id(entry), "Playback skipped: {}", err);
            }
            Err(err) => self.fail(entry, epoch, &err),
        }
    }

    async fn synthesize(&self, entry: &QueueEntry) -> NarrationResult<SynthesizedAudio> {
        let voice_id = entry
            .voice_id
            .clone()
            .unwrap_or_else(|| self.config.default_voice_id.clone());
        let request = SynthesisRequest::new(entry.text.clone(), voice_id);
        request.validate(self.config.max_text_length)?;

        let timeout = self.config.synthesis_timeout();
        let audio = tokio::time::timeout(timeout, self.synthesizer.synthesize(&request)).await??;

        if audio.is_empty() {
            return Err(NarrationError::synthesis("No audio content received"));
        }
        Ok(audio)
    }

    async fn finish(&self, entry: &QueueEntry, epoch: u64) {
        match &entry.hooks.on_end {
            EndHook::Immediate(hook) => {
                if let Some(hook) = hook {
                    self.fire_if_current(epoch, || hook());
                }
            }
            EndHook::Delayed { pause, hook } => {
                self.transition(epoch, PlaybackState::Idle);
                tokio::time::sleep(*pause).await;
                if let Some(hook) = hook {
                    self.fire_if_current(epoch, || hook());
                }
            }
        }
    }

    fn fail(&self, entry: &QueueEntry, epoch: u64, err: &NarrationError) {
        error!(
            request = %entry_id(entry),
            category = err.category(),
            "Narration failed: {}",
            err
        );
        if err.is_quota_exhausted() {
            // No subscribers is fine.
            let _ = self.notices.send(Notice::quota_exhausted());
        }
        self.fire_if_current(epoch, || entry.hooks.notify_error(err));
    }
}

async fn wait_for_stop(stop_rx: &mut watch::Receiver<u64>, epoch: u64) {
    loop {
        if *stop_rx.borrow_and_update() != epoch {
            return;
        }
        if stop_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn entry_id(entry: &QueueEntry) -> String {
    entry.request_id.simple().to_string()
}
