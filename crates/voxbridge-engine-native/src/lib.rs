//! Native platform speech engine adapter for VoxBridge
//!
//! Wraps the operating system's speech stack (Speech Dispatcher on Linux,
//! WinRT on Windows, AVFoundation on macOS) via the `tts` crate and
//! translates native utterance callbacks into bridge signals.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use tts::{Features, Tts, UtteranceId};

use voxbridge_engine::{
    EngineError, EngineFeatures, EngineResult, NormalizedUtterance, ParamPlan, SignalSender,
    SpeechEngine, VoiceInfo, VoiceSelection,
};

/// Native utterance handles paired with the bridge ids they belong to,
/// shared with the platform callbacks.
type UtteranceMap = Arc<Mutex<Vec<(UtteranceId, u64)>>>;

/// Speech engine backed by the platform's own synthesizer.
pub struct NativeEngine {
    engine: Option<Tts>,
    signals: Option<SignalSender>,
    features: EngineFeatures,
    tracked: UtteranceMap,
}

impl NativeEngine {
    pub fn new() -> Self {
        Self {
            engine: None,
            signals: None,
            features: EngineFeatures::default(),
            tracked: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn engine_mut(&mut self) -> EngineResult<&mut Tts> {
        self.engine
            .as_mut()
            .ok_or_else(|| EngineError::NotAvailable("engine not initialized".to_string()))
    }

    fn install_callbacks(engine: &Tts, signals: &SignalSender, tracked: &UtteranceMap) {
        let map = Arc::clone(tracked);
        let on_begin = signals.clone();
        let result = engine.on_utterance_begin(Some(Box::new(move |utterance| {
            if let Some(id) = find_tracked(&map, &utterance) {
                on_begin.started(id);
            }
        })));
        if let Err(e) = result {
            warn!("Failed to set utterance begin callback: {:?}", e);
        }

        let map = Arc::clone(tracked);
        let on_end = signals.clone();
        let result = engine.on_utterance_end(Some(Box::new(move |utterance| {
            if let Some(id) = remove_tracked(&map, &utterance) {
                on_end.finished(id);
            }
        })));
        if let Err(e) = result {
            warn!("Failed to set utterance end callback: {:?}", e);
        }

        let map = Arc::clone(tracked);
        let on_stop = signals.clone();
        let result = engine.on_utterance_stop(Some(Box::new(move |utterance| {
            if let Some(id) = remove_tracked(&map, &utterance) {
                on_stop.cancelled(id);
            }
        })));
        if let Err(e) = result {
            warn!("Failed to set utterance stop callback: {:?}", e);
        }
    }

    /// Select the requested voice for the next utterance, if it exists
    /// natively. Misses keep the engine's current voice.
    fn apply_voice(engine: &mut Tts, selection: &VoiceSelection) {
        if matches!(selection, VoiceSelection::EngineDefault) {
            return;
        }
        let voices = match engine.voices() {
            Ok(voices) => voices,
            Err(e) => {
                warn!("Unable to enumerate native voices: {}", e);
                return;
            }
        };
        let chosen = match selection {
            VoiceSelection::Voice(info) => voices.iter().find(|v| v.id() == info.id),
            VoiceSelection::Language(tag) => {
                let needle = tag.to_lowercase();
                voices
                    .iter()
                    .find(|v| v.language().to_string().to_lowercase().contains(&needle))
            }
            VoiceSelection::EngineDefault => None,
        };
        match chosen {
            Some(voice) => {
                if let Err(e) = engine.set_voice(voice) {
                    warn!("Failed to select voice: {}", e);
                }
            }
            None => debug!("Requested voice not present natively, keeping current voice"),
        }
    }

    /// Apply the parameter plan. Absent fields leave the engine's own
    /// settings untouched, so neutral requests never touch a setter.
    fn apply_params(engine: &mut Tts, features: EngineFeatures, params: &ParamPlan) {
        if let Some(rate) = params.rate {
            if features.rate {
                let scaled = scale_rate(
                    engine.min_rate(),
                    engine.normal_rate(),
                    engine.max_rate(),
                    rate,
                );
                if let Err(e) = engine.set_rate(scaled) {
                    debug!("Failed to set rate: {}", e);
                }
            }
        }
        // Pitch and volume share the external contract ranges natively.
        if let Some(pitch) = params.pitch {
            if features.pitch {
                if let Err(e) = engine.set_pitch(pitch) {
                    debug!("Failed to set pitch: {}", e);
                }
            }
        }
        if let Some(volume) = params.volume {
            if features.volume {
                if let Err(e) = engine.set_volume(volume) {
                    debug!("Failed to set volume: {}", e);
                }
            }
        }
    }
}

impl Default for NativeEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechEngine for NativeEngine {
    fn name(&self) -> &str {
        "native"
    }

    fn features(&self) -> EngineFeatures {
        self.features
    }

    async fn initialize(&mut self, signals: SignalSender) -> EngineResult<()> {
        let engine = Tts::default().map_err(describe_init_error)?;

        let Features {
            rate,
            pitch,
            volume,
            is_speaking,
            utterance_callbacks,
            ..
        } = engine.supported_features();
        self.features = EngineFeatures {
            rate,
            pitch,
            volume,
            // The platform backends expose no pause primitive through the
            // `tts` crate, so both are denied up front.
            pause: false,
            resume: false,
            is_speaking,
            utterance_callbacks,
        };

        if utterance_callbacks {
            Self::install_callbacks(&engine, &signals, &self.tracked);
            info!("Native utterance callbacks enabled");
        } else {
            warn!("Utterance callbacks not supported on this platform");
        }

        let voice_count = engine.voices().map(|v| v.len()).unwrap_or(0);
        self.engine = Some(engine);
        self.signals = Some(signals.clone());
        signals.ready(voice_count);
        Ok(())
    }

    async fn speak(&mut self, utterance: &NormalizedUtterance) -> EngineResult<()> {
        let features = self.features;
        let engine = self.engine_mut()?;

        Self::apply_voice(engine, &utterance.selection);
        Self::apply_params(engine, features, &utterance.params);

        // Flush-versus-add arbitration happens upstream, where an explicit
        // stop already preceded this call when the queue had to be flushed.
        // The native queue therefore only ever appends.
        match engine.speak(utterance.text.clone(), false) {
            Ok(Some(native_id)) => {
                self.tracked.lock().push((native_id, utterance.id));
                if !features.utterance_callbacks {
                    if let Some(signals) = &self.signals {
                        signals.started(utterance.id);
                    }
                }
            }
            Ok(None) => {
                // No native handle to correlate callbacks against, so
                // report the start optimistically.
                if let Some(signals) = &self.signals {
                    signals.started(utterance.id);
                }
            }
            Err(e) => return Err(EngineError::Synthesis(e.to_string())),
        }
        Ok(())
    }

    async fn stop(&mut self) -> EngineResult<()> {
        let engine = self.engine_mut()?;
        engine
            .stop()
            .map_err(|e| EngineError::Synthesis(e.to_string()))?;
        // Cancellation is reported upstream at the stop call itself. Clear
        // the correlation map so late native stop callbacks stay silent.
        self.tracked.lock().clear();
        Ok(())
    }

    async fn pause(&mut self) -> EngineResult<()> {
        Err(EngineError::NotSupported("pause"))
    }

    async fn resume(&mut self) -> EngineResult<()> {
        Err(EngineError::NotSupported("resume"))
    }

    async fn voices(&mut self) -> EngineResult<Vec<VoiceInfo>> {
        let engine = self.engine_mut()?;
        let voices = engine
            .voices()
            .map_err(|e| EngineError::EngineSpecific {
                engine: "native".to_string(),
                message: e.to_string(),
            })?;
        Ok(voices
            .into_iter()
            .map(|v| VoiceInfo {
                id: v.id().to_string(),
                name: v.name().to_string(),
                language: v.language().to_string(),
            })
            .collect())
    }

    async fn is_speaking(&mut self) -> EngineResult<bool> {
        if !self.features.is_speaking {
            return Ok(false);
        }
        let engine = self.engine_mut()?;
        engine.is_speaking().map_err(|e| EngineError::EngineSpecific {
            engine: "native".to_string(),
            message: e.to_string(),
        })
    }

    async fn shutdown(&mut self) -> EngineResult<()> {
        if let Some(engine) = self.engine.as_mut() {
            if let Err(e) = engine.stop() {
                debug!("Stop during shutdown failed: {}", e);
            }
        }
        self.tracked.lock().clear();
        self.engine = None;
        self.signals = None;
        debug!("Native engine shut down");
        Ok(())
    }
}

fn find_tracked(tracked: &Mutex<Vec<(UtteranceId, u64)>>, utterance: &UtteranceId) -> Option<u64> {
    tracked
        .lock()
        .iter()
        .find(|(native, _)| native == utterance)
        .map(|(_, id)| *id)
}

fn remove_tracked(
    tracked: &Mutex<Vec<(UtteranceId, u64)>>,
    utterance: &UtteranceId,
) -> Option<u64> {
    let mut entries = tracked.lock();
    let index = entries.iter().position(|(native, _)| native == utterance)?;
    Some(entries.swap_remove(index).1)
}

/// Map a user rate (1.0 = normal) onto the platform rate scale.
///
/// Platforms disagree wildly about rate ranges: AVFoundation spans 0.1-2.0
/// with normal at 0.5, WinRT 0.5-6.0 with normal at 1.0, Speech Dispatcher
/// -100..100 with normal at 0. Anchoring the user's 1.0 at the platform's
/// normal rate keeps a neutral request sounding neutral everywhere.
fn scale_rate(min: f32, normal: f32, max: f32, user_rate: f32) -> f32 {
    if user_rate <= 1.0 {
        // Map 0.25-1.0 onto min-normal
        let t = ((user_rate - 0.25) / 0.75).clamp(0.0, 1.0);
        min + t * (normal - min)
    } else {
        // Map 1.0-4.0 onto normal-max
        let t = ((user_rate - 1.0) / 3.0).clamp(0.0, 1.0);
        normal + t * (max - normal)
    }
}

fn describe_init_error(error: tts::Error) -> EngineError {
    #[cfg(target_os = "linux")]
    {
        let message = error.to_string();
        if message.contains("speech-dispatcher") || message.contains("Speech Dispatcher") {
            return EngineError::NotAvailable(
                "Speech Dispatcher not available. Please install it:\n\
                 Ubuntu/Debian: sudo apt install speech-dispatcher\n\
                 Fedora: sudo dnf install speech-dispatcher\n\
                 Arch: sudo pacman -S speech-dispatcher"
                    .to_string(),
            );
        }
    }
    EngineError::Initialization(error.to_string())
}
