//! The bridge facade over one speech engine.
//!
//! Every command handler and the engine signal pump funnel through a single
//! `tokio::sync::Mutex`, so session state, the pending queue, and the voice
//! cache never observe interleaved mutation. Speak is fire-and-forget with
//! respect to audio: a successful response means the engine accepted the
//! utterance, and completion arrives later on the event channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

use voxbridge_engine::{
    next_utterance_id, EngineSignal, NormalizedUtterance, SignalSender, SpeechEngine,
    VoiceSelection,
};

use crate::catalog::VoiceCatalog;
use crate::clock::{real_clock, SharedClock};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::events::{EventSink, SpeechEvent};
use crate::gate::{GateState, PendingSpeak, ReadinessGate};
use crate::normalize::normalize;
use crate::session::SessionState;
use crate::types::{
    GetVoicesRequest, GetVoicesResponse, IsInitializedResponse, IsSpeakingResponse,
    PauseResumeResponse, PreviewVoiceRequest, QueueMode, SpeakRequest, SpeakResponse,
    StopResponse, DEFAULT_PREVIEW_TEXT,
};
use crate::validate::{validate, validate_text, validate_voice_id};
use crate::watchdog::{budget_ms, CompletionWatchdog};

/// Arbitration layer between untrusted callers and one [`SpeechEngine`].
///
/// Construction spawns the engine's initialization and the signal pump onto
/// the current Tokio runtime; readiness is reported asynchronously through
/// [`TtsBridge::readiness`] and the event channel. Dropping the bridge stops
/// both tasks.
pub struct TtsBridge {
    inner: Arc<Mutex<BridgeInner>>,
    events: EventSink,
    // Keeps the signal channel open so the pump outlives adapters that drop
    // their sender early.
    _signal_tx: SignalSender,
    tasks: Vec<JoinHandle<()>>,
}

struct BridgeInner {
    engine: Box<dyn SpeechEngine>,
    config: BridgeConfig,
    clock: SharedClock,
    gate: ReadinessGate,
    session: SessionState,
    catalog: VoiceCatalog,
    watchdog: CompletionWatchdog,
    events: EventSink,
}

impl TtsBridge {
    pub fn new(engine: Box<dyn SpeechEngine>, config: BridgeConfig) -> Self {
        Self::with_clock(engine, config, real_clock())
    }

    /// Construct with an explicit clock. Tests inject a virtual clock here
    /// to drive TTL and watchdog decisions deterministically.
    pub fn with_clock(
        engine: Box<dyn SpeechEngine>,
        config: BridgeConfig,
        clock: SharedClock,
    ) -> Self {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let signals = SignalSender::new(signal_tx);
        let events = EventSink::new(config.event_capacity);
        let poll = config.watchdog_poll();

        let inner = Arc::new(Mutex::new(BridgeInner {
            gate: ReadinessGate::new(config.queue_capacity, config.pending_ttl(), Arc::clone(&clock)),
            session: SessionState::default(),
            catalog: VoiceCatalog::new(config.voice_cache_ttl(), Arc::clone(&clock)),
            watchdog: CompletionWatchdog::new(Arc::clone(&clock)),
            events: events.clone(),
            engine,
            config,
            clock,
        }));

        let pump = tokio::spawn(signal_pump(Arc::clone(&inner), signal_rx, poll));

        let init_inner = Arc::clone(&inner);
        let init_signals = signals.clone();
        let init = tokio::spawn(async move {
            let mut inner = init_inner.lock().await;
            let engine_name = inner.engine.name().to_string();
            info!(engine = %engine_name, "initializing speech engine");
            if let Err(e) = inner.engine.initialize(init_signals.clone()).await {
                warn!(engine = %engine_name, error = %e, "engine initialization failed");
                init_signals.init_failed(e.to_string());
            }
        });

        Self {
            inner,
            events,
            _signal_tx: signals,
            tasks: vec![pump, init],
        }
    }

    /// Subscribe to outward speech lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SpeechEvent> {
        self.events.subscribe()
    }

    /// Subscribe to readiness transitions.
    pub async fn subscribe_readiness(&self) -> crossbeam_channel::Receiver<GateState> {
        self.inner.lock().await.gate.subscribe()
    }

    /// Current readiness of the underlying engine.
    pub async fn readiness(&self) -> GateState {
        self.inner.lock().await.gate.state().clone()
    }

    /// Speak text. Returns once the engine accepts (or rejects) the
    /// utterance; while the engine is still initializing the request parks
    /// in the pending queue and this call resolves after the ready
    /// transition replays it.
    pub async fn speak(&self, request: SpeakRequest) -> BridgeResult<SpeakResponse> {
        validate(&request)?;

        let rx = {
            let mut inner = self.inner.lock().await;
            match inner.gate.state().clone() {
                GateState::Ready => return inner.execute_speak(request).await,
                GateState::Failed { message } => return Err(BridgeError::InitFailed(message)),
                GateState::NotReady => {
                    let (tx, rx) = oneshot::channel();
                    let pending = PendingSpeak {
                        request,
                        enqueued_at: inner.clock.now(),
                        respond_to: tx,
                    };
                    inner.gate.enqueue(pending)?;
                    debug!(queued = inner.gate.queued(), "engine not ready, speak request parked");
                    rx
                }
            }
        };

        // Queue position held; the lock is released while we wait for the
        // ready transition to replay the request.
        rx.await.unwrap_or(Err(BridgeError::Shutdown))
    }

    /// Stop all speech. Idempotent; stopping an idle bridge succeeds.
    pub async fn stop(&self) -> StopResponse {
        let mut inner = self.inner.lock().await;
        inner.stop_all().await;
        StopResponse { success: true }
    }

    /// Pause the current utterance. Failures are in-band with a reason.
    pub async fn pause_speaking(&self) -> PauseResumeResponse {
        let mut inner = self.inner.lock().await;
        inner.pause_speaking().await
    }

    /// Resume a paused utterance. Failures are in-band with a reason.
    pub async fn resume_speaking(&self) -> PauseResumeResponse {
        let mut inner = self.inner.lock().await;
        inner.resume_speaking().await
    }

    /// List available voices, optionally filtered by language substring.
    /// Degrades to an empty list instead of failing.
    pub async fn get_voices(&self, request: GetVoicesRequest) -> GetVoicesResponse {
        let mut inner = self.inner.lock().await;
        inner.get_voices(request.language.as_deref()).await
    }

    pub async fn is_speaking(&self) -> IsSpeakingResponse {
        let inner = self.inner.lock().await;
        IsSpeakingResponse {
            speaking: inner.session.is_speaking(),
        }
    }

    pub async fn is_initialized(&self) -> IsInitializedResponse {
        let mut inner = self.inner.lock().await;
        inner.is_initialized().await
    }

    /// Speak a short sample with the given voice. An unknown voice id is an
    /// in-band failure, not a rejection.
    pub async fn preview_voice(&self, request: PreviewVoiceRequest) -> BridgeResult<SpeakResponse> {
        validate_voice_id(&request.voice_id)?;
        if let Some(text) = &request.text {
            validate_text(text)?;
        }

        let mut inner = self.inner.lock().await;
        if !inner.gate.is_ready() {
            return Err(BridgeError::NotInitialized);
        }
        inner.preview_voice(request).await
    }

    /// Host lifecycle input: a transient audio interruption began (phone
    /// call, alarm, another app claiming the output).
    pub async fn interruption_began(&self) {
        let mut inner = self.inner.lock().await;
        inner.interruption_began().await;
    }

    /// Host lifecycle input: the interruption ended. `should_resume` is the
    /// platform's hint that playback may continue.
    pub async fn interruption_ended(&self, should_resume: bool) {
        let mut inner = self.inner.lock().await;
        inner.interruption_ended(should_resume).await;
    }

    /// Host lifecycle input: the app moved to the background.
    pub async fn app_backgrounded(&self) {
        let mut inner = self.inner.lock().await;
        inner.app_backgrounded().await;
    }

    /// Host lifecycle input: the app is terminating. Speech stops without
    /// emitting events; nobody is listening anymore.
    pub async fn app_terminating(&self) {
        let mut inner = self.inner.lock().await;
        inner.app_terminating().await;
    }

    /// Stop speech, shut the engine down, and end the background tasks.
    pub async fn shutdown(&self) {
        {
            let mut inner = self.inner.lock().await;
            inner.app_terminating().await;
            if let Err(e) = inner.engine.shutdown().await {
                debug!(error = %e, "engine shutdown failed");
            }
        }
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl Drop for TtsBridge {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl BridgeInner {
    /// Issue one utterance to the engine. Only called in `Ready` state.
    async fn execute_speak(&mut self, request: SpeakRequest) -> BridgeResult<SpeakResponse> {
        let queue_mode = request.queue_mode;
        let (selection, warning) = self
            .resolve_voice(request.voice_id.as_deref(), request.language.as_deref())
            .await;
        let params = normalize(request.rate, request.pitch, request.volume);

        if queue_mode == QueueMode::Flush && self.session.is_speaking() {
            self.cancel_live().await;
        }

        if let Err(e) = self.engine.activate_output().await {
            warn!(error = %e, "audio output activation failed, attempting speech anyway");
        }

        let id = next_utterance_id();
        let utterance = NormalizedUtterance {
            id,
            text: request.text,
            selection,
            params,
        };

        if let Err(e) = self.engine.speak(&utterance).await {
            warn!(utterance_id = id, error = %e, "engine rejected utterance");
            if !self.session.is_speaking() {
                self.release_output().await;
            }
            return Err(BridgeError::Engine(e));
        }

        let budget = budget_ms(
            utterance.text.chars().count(),
            self.config.watchdog_base_ms,
            self.config.watchdog_per_char_ms,
        );
        self.session.push_issued(id, budget);
        self.rearm_watchdog();

        debug!(utterance_id = id, mode = ?queue_mode, "utterance issued");
        Ok(SpeakResponse {
            success: true,
            utterance_id: Some(id),
            warning,
        })
    }

    /// Map the caller's voice preference onto the catalog.
    ///
    /// Precedence: exact voice id, then language substring, then the engine
    /// default. Misses degrade with a warning instead of failing the
    /// request.
    async fn resolve_voice(
        &mut self,
        voice_id: Option<&str>,
        language: Option<&str>,
    ) -> (VoiceSelection, Option<String>) {
        if let Some(voice_id) = voice_id {
            match self.catalog.find_by_id(self.engine.as_mut(), voice_id).await {
                Ok(Some(voice)) => return (VoiceSelection::Voice(voice), None),
                Ok(None) => {
                    warn!(voice_id, "requested voice not found, falling back");
                    let (selection, _) = self.resolve_language(language).await;
                    let warning = format!("Voice '{voice_id}' not found, using default voice");
                    return (selection, Some(warning));
                }
                Err(e) => {
                    warn!(error = %e, "voice lookup failed, deferring to engine default");
                    return (VoiceSelection::EngineDefault, None);
                }
            }
        }
        self.resolve_language(language).await
    }

    async fn resolve_language(
        &mut self,
        language: Option<&str>,
    ) -> (VoiceSelection, Option<String>) {
        let Some(language) = language else {
            return (VoiceSelection::EngineDefault, None);
        };
        match self
            .catalog
            .find_by_language(self.engine.as_mut(), language)
            .await
        {
            Ok(Some(voice)) => (VoiceSelection::Voice(voice), None),
            Ok(None) => {
                let warning = format!("Language '{language}' not available, using default voice");
                (VoiceSelection::EngineDefault, Some(warning))
            }
            Err(e) => {
                // The engine may still resolve the tag natively.
                warn!(error = %e, "voice enumeration failed during language resolution");
                (VoiceSelection::Language(language.to_string()), None)
            }
        }
    }

    /// Stop the engine and emit exactly one cancel per live utterance. The
    /// engine's own cancellation signals arrive later and are dropped as
    /// unknown ids.
    async fn cancel_live(&mut self) {
        if let Err(e) = self.engine.stop().await {
            warn!(error = %e, "engine stop failed");
        }
        let was_interrupted = self.session.was_interrupted();
        for u in self.session.drain() {
            self.events.emit(SpeechEvent::cancel(u.id, was_interrupted));
        }
        self.watchdog.disarm();
    }

    async fn stop_all(&mut self) {
        if !self.gate.is_ready() {
            // Nothing can be speaking before the engine exists.
            return;
        }
        let had_live = self.session.is_speaking();
        self.cancel_live().await;
        if had_live {
            self.release_output().await;
        }
    }

    async fn pause_speaking(&mut self) -> PauseResumeResponse {
        if !self.gate.is_ready() {
            return PauseResumeResponse::denied("Engine not initialized");
        }
        if !self.session.is_speaking() {
            return PauseResumeResponse::denied("Not speaking");
        }
        if self.session.is_paused() {
            return PauseResumeResponse::denied("Already paused");
        }
        if !self.engine.features().pause {
            return PauseResumeResponse::denied("Pause is not supported by this engine");
        }
        match self.engine.pause().await {
            Ok(()) => {
                self.session.set_paused(true);
                self.watchdog.disarm();
                if let Some(id) = self.session.current_id() {
                    self.events.emit(SpeechEvent::pause(id));
                }
                PauseResumeResponse::granted()
            }
            Err(e) => {
                warn!(error = %e, "engine pause failed");
                PauseResumeResponse::denied(e.to_string())
            }
        }
    }

    async fn resume_speaking(&mut self) -> PauseResumeResponse {
        if !self.gate.is_ready() {
            return PauseResumeResponse::denied("Engine not initialized");
        }
        if !self.session.is_speaking() || !self.session.is_paused() {
            return PauseResumeResponse::denied("Not paused");
        }
        if !self.engine.features().resume {
            return PauseResumeResponse::denied("Resume is not supported by this engine");
        }
        match self.engine.resume().await {
            Ok(()) => {
                self.session.set_paused(false);
                self.rearm_watchdog();
                if let Some(id) = self.session.current_id() {
                    self.events.emit(SpeechEvent::resume(id));
                }
                PauseResumeResponse::granted()
            }
            Err(e) => {
                warn!(error = %e, "engine resume failed");
                PauseResumeResponse::denied(e.to_string())
            }
        }
    }

    async fn get_voices(&mut self, language: Option<&str>) -> GetVoicesResponse {
        if !self.gate.is_ready() {
            return GetVoicesResponse {
                voices: Vec::new(),
                initialized: Some(false),
            };
        }
        let voices = match self.catalog.filtered(self.engine.as_mut(), language).await {
            Ok(voices) => voices,
            Err(e) => {
                warn!(error = %e, "voice enumeration failed");
                Vec::new()
            }
        };
        GetVoicesResponse {
            voices,
            initialized: None,
        }
    }

    async fn is_initialized(&mut self) -> IsInitializedResponse {
        if !self.gate.is_ready() {
            return IsInitializedResponse {
                initialized: false,
                voice_count: 0,
            };
        }
        let voice_count = match self.catalog.all(self.engine.as_mut()).await {
            Ok(voices) => voices.len() as u32,
            Err(_) => 0,
        };
        IsInitializedResponse {
            initialized: true,
            voice_count,
        }
    }

    async fn preview_voice(&mut self, request: PreviewVoiceRequest) -> BridgeResult<SpeakResponse> {
        let found = self
            .catalog
            .find_by_id(self.engine.as_mut(), &request.voice_id)
            .await?;
        if found.is_none() {
            debug!(voice_id = %request.voice_id, "preview requested for unknown voice");
            return Ok(SpeakResponse {
                success: false,
                utterance_id: None,
                warning: Some(format!("Voice '{}' not found", request.voice_id)),
            });
        }

        let text = request
            .text
            .or_else(|| self.config.preview_text.clone())
            .unwrap_or_else(|| DEFAULT_PREVIEW_TEXT.to_string());
        let mut speak_request = SpeakRequest::plain(text);
        speak_request.voice_id = Some(request.voice_id);
        self.execute_speak(speak_request).await
    }

    async fn interruption_began(&mut self) {
        if !self.gate.is_ready() || !self.session.is_speaking() {
            return;
        }
        if self.session.is_paused() {
            debug!("interruption began while already paused");
            return;
        }
        if !self.engine.features().pause {
            debug!("interruption began but engine cannot pause");
            return;
        }
        if let Err(e) = self.engine.pause().await {
            warn!(error = %e, "engine pause failed during interruption");
            return;
        }
        self.session.set_paused(true);
        self.session.set_interrupted(true);
        self.watchdog.disarm();
        if let Some(id) = self.session.current_id() {
            self.events.emit(SpeechEvent::interrupted(id));
        }
        info!("speech paused by audio interruption");
    }

    async fn interruption_ended(&mut self, should_resume: bool) {
        if !self.session.was_interrupted() {
            return;
        }
        self.session.set_interrupted(false);
        if !should_resume || !self.session.is_paused() {
            return;
        }
        if let Err(e) = self.engine.activate_output().await {
            warn!(error = %e, "audio output reactivation failed, staying paused");
            return;
        }
        match self.engine.resume().await {
            Ok(()) => {
                self.session.set_paused(false);
                self.rearm_watchdog();
                if let Some(id) = self.session.current_id() {
                    self.events.emit(SpeechEvent::resume(id));
                }
                info!("speech resumed after interruption");
            }
            Err(e) => {
                warn!(error = %e, "engine resume failed after interruption, staying paused");
            }
        }
    }

    async fn app_backgrounded(&mut self) {
        if !self.gate.is_ready() || !self.session.is_speaking() || self.session.is_paused() {
            return;
        }
        if !self.engine.features().pause {
            debug!("app backgrounded but engine cannot pause, speech continues");
            return;
        }
        match self.engine.pause().await {
            Ok(()) => {
                self.session.set_paused(true);
                self.watchdog.disarm();
                if let Some(id) = self.session.current_id() {
                    self.events.emit(SpeechEvent::background_pause(id));
                }
                info!("speech paused for backgrounding");
            }
            Err(e) => warn!(error = %e, "engine pause failed on backgrounding"),
        }
    }

    async fn app_terminating(&mut self) {
        if self.gate.is_ready() {
            if let Err(e) = self.engine.stop().await {
                debug!(error = %e, "engine stop failed during termination");
            }
        }
        let had_live = self.session.is_speaking();
        self.session.drain();
        self.watchdog.disarm();
        if had_live {
            self.release_output().await;
        }
    }

    async fn handle_signal(&mut self, signal: EngineSignal) {
        match signal {
            EngineSignal::Ready { voice_count } => {
                debug!(voice_count, "engine signaled ready");
                let drained = self.gate.mark_ready();
                for pending in drained {
                    let result = if self.gate.is_stale(&pending) {
                        debug!("parked speak request expired before the engine became ready");
                        Err(BridgeError::NotReadyTimeout)
                    } else {
                        self.execute_speak(pending.request).await
                    };
                    if pending.respond_to.send(result).is_err() {
                        debug!("parked speak caller went away");
                    }
                }
            }
            EngineSignal::InitFailed { message } => {
                for pending in self.gate.mark_failed(&message) {
                    let _ = pending
                        .respond_to
                        .send(Err(BridgeError::InitFailed(message.clone())));
                }
            }
            EngineSignal::Started { id } => {
                if self.session.mark_started(id) {
                    self.events.emit(SpeechEvent::start(id));
                    self.rearm_watchdog();
                } else {
                    debug!(utterance_id = id, "ignoring start signal for unknown utterance");
                }
            }
            EngineSignal::Finished { id } => {
                if self.session.remove(id).is_some() {
                    self.events.emit(SpeechEvent::finish(id));
                    self.after_terminal().await;
                } else {
                    debug!(utterance_id = id, "ignoring finish signal for unknown utterance");
                }
            }
            EngineSignal::Cancelled { id } => {
                let was_interrupted = self.session.was_interrupted();
                if self.session.remove(id).is_some() {
                    self.events.emit(SpeechEvent::cancel(id, was_interrupted));
                    self.after_terminal().await;
                } else {
                    debug!(utterance_id = id, "ignoring cancel signal for unknown utterance");
                }
            }
            EngineSignal::Errored { id: Some(id), message } => {
                if self.session.remove(id).is_some() {
                    warn!(utterance_id = id, error = %message, "utterance failed");
                    self.events.emit(SpeechEvent::error(Some(id), message));
                    self.after_terminal().await;
                } else {
                    debug!(utterance_id = id, "ignoring error signal for unknown utterance");
                }
            }
            EngineSignal::Errored { id: None, message } => {
                warn!(error = %message, "engine reported failure, failing live session");
                let drained = self.session.drain();
                for u in &drained {
                    self.events.emit(SpeechEvent::error(Some(u.id), message.clone()));
                }
                self.watchdog.disarm();
                if !drained.is_empty() {
                    self.release_output().await;
                }
            }
        }
    }

    /// After an utterance leaves the session: either cover the next one
    /// with the watchdog or, when the session emptied, release the output.
    async fn after_terminal(&mut self) {
        if self.session.is_speaking() {
            self.rearm_watchdog();
        } else {
            self.watchdog.disarm();
            self.release_output().await;
        }
    }

    /// Fail everything live because the engine went silent past its budget.
    async fn handle_watchdog(&mut self) {
        warn!(
            live = self.session.live_count(),
            "no completion callback within the watchdog window, failing session"
        );
        self.watchdog.disarm();
        if let Err(e) = self.engine.stop().await {
            debug!(error = %e, "engine stop failed during watchdog recovery");
        }
        for u in self.session.drain() {
            self.events.emit(SpeechEvent::error(
                Some(u.id),
                "Engine produced no completion callback",
            ));
        }
        self.release_output().await;
    }

    fn rearm_watchdog(&mut self) {
        if self.session.is_paused() {
            return;
        }
        if let Some(budget) = self.session.front_budget_ms() {
            self.watchdog.arm(Duration::from_millis(budget));
        }
    }

    async fn release_output(&mut self) {
        if let Err(e) = self.engine.deactivate_output().await {
            debug!(error = %e, "audio output release failed");
        }
    }
}

async fn signal_pump(
    inner: Arc<Mutex<BridgeInner>>,
    mut signals: mpsc::UnboundedReceiver<EngineSignal>,
    poll: Duration,
) {
    let mut ticker = interval(poll);
    loop {
        tokio::select! {
            signal = signals.recv() => match signal {
                Some(signal) => inner.lock().await.handle_signal(signal).await,
                None => break,
            },
            _ = ticker.tick() => {
                let mut guard = inner.lock().await;
                if guard.watchdog.expired() {
                    guard.handle_watchdog().await;
                }
            }
        }
    }
    debug!("engine signal pump stopped");
}
