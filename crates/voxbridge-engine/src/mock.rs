//! Scripted mock engine for testing the bridge
//!
//! `MockEngine` behaves like a well-behaved native engine with an internal
//! FIFO queue, while recording every call and exposing a `MockHandle` that
//! tests use to inspect state and drive lifecycle signals manually. Behavior
//! knobs on `MockConfig` simulate slow initialization, init failure, speak
//! rejection, callback loss, and voice enumeration outages.
//!
//! Requires a Tokio runtime (delayed readiness and auto-finish spawn timers).

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::engine::SpeechEngine;
use crate::error::{EngineError, EngineResult};
use crate::signal::{EngineSignal, SignalSender};
use crate::types::{EngineFeatures, NormalizedUtterance, VoiceInfo};

/// How the mock reports readiness after `initialize`
#[derive(Debug, Clone, PartialEq)]
pub enum Readiness {
    /// Signal `Ready` inside `initialize`
    Immediate,
    /// Signal `Ready` after the given delay
    DelayedMs(u64),
    /// Fail `initialize` synchronously with this message
    Failed(String),
    /// Signal nothing; the test drives readiness through the handle
    Manual,
}

/// Mock engine behavior configuration
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Voices returned by enumeration
    pub voices: Vec<VoiceInfo>,
    /// Readiness behavior
    pub readiness: Readiness,
    /// Whether pause/resume are supported
    pub pause_supported: bool,
    /// Automatically signal `Finished` this long after an utterance starts
    pub auto_finish_after_ms: Option<u64>,
    /// Reject every speak call with this synthesis error
    pub fail_speak: Option<String>,
    /// Voice enumeration fails after this many successful calls
    pub fail_voices_after: Option<usize>,
    /// Audio output activation fails
    pub fail_activate: bool,
    /// Accept utterances but never signal progress for them
    pub suppress_callbacks: bool,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            voices: default_voices(),
            readiness: Readiness::Immediate,
            pause_supported: true,
            auto_finish_after_ms: None,
            fail_speak: None,
            fail_voices_after: None,
            fail_activate: false,
            suppress_callbacks: false,
        }
    }
}

fn default_voices() -> Vec<VoiceInfo> {
    vec![
        VoiceInfo {
            id: "en-US-1".to_string(),
            name: "English (United States)".to_string(),
            language: "en-US".to_string(),
        },
        VoiceInfo {
            id: "en-GB-1".to_string(),
            name: "English (United Kingdom)".to_string(),
            language: "en-GB".to_string(),
        },
        VoiceInfo {
            id: "pt-BR-1".to_string(),
            name: "Portuguese (Brazil)".to_string(),
            language: "pt-BR".to_string(),
        },
    ]
}

/// Calls recorded by the mock, in invocation order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockCall {
    Initialize,
    Speak,
    Stop,
    Pause,
    Resume,
    Voices,
    IsSpeaking,
    ActivateOutput,
    DeactivateOutput,
    Shutdown,
}

#[derive(Default)]
struct MockState {
    signals: Option<SignalSender>,
    calls: Vec<MockCall>,
    utterances: Vec<NormalizedUtterance>,
    current: Option<u64>,
    queued: VecDeque<u64>,
    paused: bool,
    voices_calls: usize,
    auto_finish_after_ms: Option<u64>,
    voice_count: usize,
}

/// Scripted speech engine for tests
pub struct MockEngine {
    config: MockConfig,
    shared: Arc<Mutex<MockState>>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new(MockConfig::default())
    }
}

impl MockEngine {
    pub fn new(config: MockConfig) -> Self {
        let shared = Arc::new(Mutex::new(MockState {
            auto_finish_after_ms: config.auto_finish_after_ms,
            voice_count: config.voices.len(),
            ..Default::default()
        }));
        Self { config, shared }
    }

    /// Handle for inspecting and driving this engine from a test
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    fn record(&self, call: MockCall) {
        self.shared.lock().calls.push(call);
    }
}

/// Completes the current utterance and promotes the next queued one.
///
/// Shared by the auto-finish timer and `MockHandle::finish_current`. When
/// `only_if` is set, nothing happens unless that id is still current, so a
/// stale timer cannot finish a later utterance.
fn finish_current(shared: &Arc<Mutex<MockState>>, only_if: Option<u64>) {
    let (signals, finished, next) = {
        let mut st = shared.lock();
        if let Some(expected) = only_if {
            if st.current != Some(expected) {
                return;
            }
        }
        let finished = st.current.take();
        let next = st.queued.pop_front();
        st.current = next;
        st.paused = false;
        (st.signals.clone(), finished, next)
    };
    let Some(signals) = signals else { return };
    if let Some(id) = finished {
        signals.finished(id);
    }
    if let Some(id) = next {
        signals.started(id);
        schedule_auto_finish(shared, id);
    }
}

fn schedule_auto_finish(shared: &Arc<Mutex<MockState>>, id: u64) {
    let delay = shared.lock().auto_finish_after_ms;
    if let Some(ms) = delay {
        let shared = Arc::clone(shared);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            finish_current(&shared, Some(id));
        });
    }
}

#[async_trait]
impl SpeechEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    fn features(&self) -> EngineFeatures {
        EngineFeatures {
            rate: true,
            pitch: true,
            volume: true,
            pause: self.config.pause_supported,
            resume: self.config.pause_supported,
            is_speaking: true,
            utterance_callbacks: !self.config.suppress_callbacks,
        }
    }

    async fn initialize(&mut self, signals: SignalSender) -> EngineResult<()> {
        self.record(MockCall::Initialize);
        self.shared.lock().signals = Some(signals.clone());

        match &self.config.readiness {
            Readiness::Immediate => signals.ready(self.config.voices.len()),
            Readiness::DelayedMs(ms) => {
                let ms = *ms;
                let voice_count = self.config.voices.len();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    signals.ready(voice_count);
                });
            }
            Readiness::Failed(message) => {
                return Err(EngineError::Initialization(message.clone()));
            }
            Readiness::Manual => {}
        }
        Ok(())
    }

    async fn speak(&mut self, utterance: &NormalizedUtterance) -> EngineResult<()> {
        self.record(MockCall::Speak);
        if let Some(message) = &self.config.fail_speak {
            return Err(EngineError::Synthesis(message.clone()));
        }

        let signals = {
            let mut st = self.shared.lock();
            st.utterances.push(utterance.clone());
            if self.config.suppress_callbacks {
                if st.current.is_some() {
                    st.queued.push_back(utterance.id);
                } else {
                    st.current = Some(utterance.id);
                }
                return Ok(());
            }
            if st.current.is_some() {
                st.queued.push_back(utterance.id);
                return Ok(());
            }
            st.current = Some(utterance.id);
            st.signals.clone()
        };

        if let Some(signals) = signals {
            signals.started(utterance.id);
        }
        schedule_auto_finish(&self.shared, utterance.id);
        Ok(())
    }

    async fn stop(&mut self) -> EngineResult<()> {
        self.record(MockCall::Stop);
        let (signals, cancelled) = {
            let mut st = self.shared.lock();
            let mut ids: Vec<u64> = st.current.take().into_iter().collect();
            ids.extend(st.queued.drain(..));
            st.paused = false;
            (st.signals.clone(), ids)
        };
        if let Some(signals) = signals {
            for id in cancelled {
                signals.cancelled(id);
            }
        }
        Ok(())
    }

    async fn pause(&mut self) -> EngineResult<()> {
        self.record(MockCall::Pause);
        if !self.config.pause_supported {
            return Err(EngineError::NotSupported("pause"));
        }
        self.shared.lock().paused = true;
        Ok(())
    }

    async fn resume(&mut self) -> EngineResult<()> {
        self.record(MockCall::Resume);
        if !self.config.pause_supported {
            return Err(EngineError::NotSupported("resume"));
        }
        self.shared.lock().paused = false;
        Ok(())
    }

    async fn voices(&mut self) -> EngineResult<Vec<VoiceInfo>> {
        self.record(MockCall::Voices);
        let count = {
            let mut st = self.shared.lock();
            st.voices_calls += 1;
            st.voices_calls
        };
        if let Some(limit) = self.config.fail_voices_after {
            if count > limit {
                return Err(EngineError::EngineSpecific {
                    engine: "mock".to_string(),
                    message: "voice enumeration failed".to_string(),
                });
            }
        }
        Ok(self.config.voices.clone())
    }

    async fn is_speaking(&mut self) -> EngineResult<bool> {
        self.record(MockCall::IsSpeaking);
        Ok(self.shared.lock().current.is_some())
    }

    async fn activate_output(&mut self) -> EngineResult<()> {
        self.record(MockCall::ActivateOutput);
        if self.config.fail_activate {
            return Err(EngineError::EngineSpecific {
                engine: "mock".to_string(),
                message: "audio output unavailable".to_string(),
            });
        }
        Ok(())
    }

    async fn deactivate_output(&mut self) -> EngineResult<()> {
        self.record(MockCall::DeactivateOutput);
        Ok(())
    }

    async fn shutdown(&mut self) -> EngineResult<()> {
        self.record(MockCall::Shutdown);
        Ok(())
    }
}

/// Test-side handle to a `MockEngine`
#[derive(Clone)]
pub struct MockHandle {
    shared: Arc<Mutex<MockState>>,
}

impl MockHandle {
    pub fn calls(&self) -> Vec<MockCall> {
        self.shared.lock().calls.clone()
    }

    pub fn call_count(&self, call: MockCall) -> usize {
        self.shared.lock().calls.iter().filter(|c| **c == call).count()
    }

    /// All utterances the engine accepted, in order
    pub fn utterances(&self) -> Vec<NormalizedUtterance> {
        self.shared.lock().utterances.clone()
    }

    pub fn last_utterance(&self) -> Option<NormalizedUtterance> {
        self.shared.lock().utterances.last().cloned()
    }

    /// Id of the utterance the engine is currently rendering
    pub fn current(&self) -> Option<u64> {
        self.shared.lock().current
    }

    pub fn queued(&self) -> Vec<u64> {
        self.shared.lock().queued.iter().copied().collect()
    }

    pub fn is_paused(&self) -> bool {
        self.shared.lock().paused
    }

    /// Push a raw signal, as if the native engine had called back
    pub fn signal(&self, signal: EngineSignal) {
        let signals = self.shared.lock().signals.clone();
        match signals {
            Some(signals) => signals.send(signal),
            None => debug!("mock engine not initialized, dropping signal"),
        }
    }

    /// Drive a `Manual` readiness engine to `Ready`
    pub fn make_ready(&self) {
        let voice_count = self.shared.lock().voice_count;
        self.signal(EngineSignal::Ready { voice_count });
    }

    /// Drive a `Manual` readiness engine to `Failed`
    pub fn make_init_failed(&self, message: &str) {
        self.signal(EngineSignal::InitFailed {
            message: message.to_string(),
        });
    }

    /// Finish the current utterance and start the next queued one
    pub fn finish_current(&self) {
        finish_current(&self.shared, None);
    }

    /// Fail the current utterance and start the next queued one
    pub fn error_current(&self, message: &str) {
        let (signals, errored, next) = {
            let mut st = self.shared.lock();
            let errored = st.current.take();
            let next = st.queued.pop_front();
            st.current = next;
            st.paused = false;
            (st.signals.clone(), errored, next)
        };
        let Some(signals) = signals else { return };
        if let Some(id) = errored {
            signals.errored(Some(id), message);
        }
        if let Some(id) = next {
            signals.started(id);
        }
    }
}
