//! Test doubles shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use narration_core::{
    AudioSink, NarrationEngine, NarrationError, NarrationResult, SpeakOptions,
    SpeechSynthesizer, SynthesisRequest, SynthesizedAudio,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Counts operations running at the same time across synthesizer and sink
#[derive(Debug, Default)]
pub struct InFlightProbe {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlightProbe {
    pub fn enter(&self) -> InFlightGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlightGuard(self)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

pub struct InFlightGuard<'a>(&'a InFlightProbe);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// What the synthesizer does for a given text
#[derive(Debug, Clone)]
pub enum Script {
    Fail(NarrationError),
    Hang,
    Silence,
}

/// Synthesizer whose audio payload is the UTF-8 text itself
#[derive(Debug, Default)]
pub struct ScriptedSynthesizer {
    scripts: Mutex<HashMap<String, Script>>,
    latency: Duration,
    calls: Mutex<Vec<SynthesisRequest>>,
    probe: Arc<InFlightProbe>,
}

impl ScriptedSynthesizer {
    pub fn new(probe: Arc<InFlightProbe>) -> Self {
        Self {
            probe,
            ..Self::default()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn script(self, text: &str, script: Script) -> Self {
        self.scripts.lock().insert(text.to_string(), script);
        self
    }

    pub fn texts(&self) -> Vec<String> {
        self.calls.lock().iter().map(|call| call.text.clone()).collect()
    }

    pub fn voices(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .map(|call| call.voice_id.clone())
            .collect()
    }
}

#[async_trait]
impl SpeechSynthesizer for ScriptedSynthesizer {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> NarrationResult<SynthesizedAudio> {
        self.calls.lock().push(request.clone());
        let _guard = self.probe.enter();
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let script = self.scripts.lock().get(&request.text).cloned();
        match script {
            None => Ok(SynthesizedAudio::mpeg(request.text.as_bytes().to_vec())),
            Some(Script::Fail(err)) => Err(err),
            Some(Script::Silence) => Ok(SynthesizedAudio::mpeg(Vec::new())),
            Some(Script::Hang) => std::future::pending().await,
        }
    }
}

/// What the sink does for a given payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkScript {
    Blocked,
    Broken,
}

/// Audio sink that records when each payload started and finished
#[derive(Debug, Default)]
pub struct RecordingSink {
    duration: Duration,
    scripts: Mutex<HashMap<String, SinkScript>>,
    started: Mutex<Vec<(String, Instant)>>,
    finished: Mutex<Vec<(String, Instant)>>,
    halts: AtomicUsize,
    halted: Notify,
    probe: Arc<InFlightProbe>,
}

impl RecordingSink {
    pub fn new(probe: Arc<InFlightProbe>, duration: Duration) -> Self {
        Self {
            duration,
            probe,
            ..Self::default()
        }
    }

    pub fn script(self, text: &str, script: SinkScript) -> Self {
        self.scripts.lock().insert(text.to_string(), script);
        self
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().iter().map(|(t, _)| t.clone()).collect()
    }

    pub fn finished(&self) -> Vec<String> {
        self.finished.lock().iter().map(|(t, _)| t.clone()).collect()
    }

    pub fn started_at(&self, text: &str) -> Option<Instant> {
        self.started
            .lock()
            .iter()
            .find(|(t, _)| t == text)
            .map(|(_, at)| *at)
    }

    pub fn finished_at(&self, text: &str) -> Option<Instant> {
        self.finished
            .lock()
            .iter()
            .find(|(t, _)| t == text)
            .map(|(_, at)| *at)
    }

    pub fn halt_count(&self) -> usize {
        self.halts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioSink for RecordingSink {
    async fn play(&self, audio: &SynthesizedAudio) -> NarrationResult<()> {
        let text = String::from_utf8_lossy(&audio.bytes).into_owned();
        let script = self.scripts.lock().get(&text).copied();
        match script {
            Some(SinkScript::Blocked) => {
                return Err(NarrationError::playback_blocked("autoplay prevented"))
            }
            Some(SinkScript::Broken) => {
                return Err(NarrationError::playback("decoder rejected payload"))
            }
            None => {}
        }

        let _guard = self.probe.enter();
        self.started.lock().push((text.clone(), Instant::now()));
        tokio::select! {
            () = tokio::time::sleep(self.duration) => {
                self.finished.lock().push((text, Instant::now()));
            }
            () = self.halted.notified() => {}
        }
        Ok(())
    }

    fn halt(&self) {
        self.halts.fetch_add(1, Ordering::SeqCst);
        self.halted.notify_waiters();
    }
}

/// Ordered record of hook invocations
#[derive(Debug, Clone, Default)]
pub struct HookLog(Arc<Mutex<Vec<String>>>);

impl HookLog {
    /// Options whose hooks append `start:label`, `end:label` and
    /// `error:label:category`
    pub fn options(&self, label: &str) -> SpeakOptions {
        let (start, end, error) = (self.clone(), self.clone(), self.clone());
        let (l1, l2, l3) = (label.to_string(), label.to_string(), label.to_string());
        SpeakOptions::new()
            .on_start(move || start.push(format!("start:{l1}")))
            .on_end(move || end.push(format!("end:{l2}")))
            .on_error(move |err| error.push(format!("error:{l3}:{}", err.category())))
    }

    pub fn push(&self, event: String) {
        self.0.lock().push(event);
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.0
            .lock()
            .iter()
            .filter(|event| event.starts_with(prefix))
            .count()
    }
}

/// Engine wired to the given doubles with default configuration
pub fn engine(
    synthesizer: &Arc<ScriptedSynthesizer>,
    sink: &Arc<RecordingSink>,
) -> NarrationEngine {
    NarrationEngine::builder(synthesizer.clone(), sink.clone())
        .build()
        .expect("Should build engine")
}

/// Let the worker run until everything queued has settled
pub async fn settle() {
    tokio::time::sleep(Duration::from_secs(120)).await;
}
