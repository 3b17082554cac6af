//! Speech engine capability interface

use crate::error::EngineResult;
use crate::signal::SignalSender;
use crate::types::{EngineFeatures, NormalizedUtterance, VoiceInfo};
use async_trait::async_trait;

/// Core speech engine interface
///
/// Implementations wrap one native speech stack (AVSpeechSynthesizer, SAPI,
/// speech-dispatcher, an espeak process, ...). The bridge owns the engine
/// behind a single serialization boundary and is the only caller, so methods
/// take `&mut self` and adapters never need their own outer locking.
#[async_trait]
pub trait SpeechEngine: Send {
    /// Engine name/identifier
    fn name(&self) -> &str;

    /// Capabilities this adapter supports
    fn features(&self) -> EngineFeatures;

    /// Start engine initialization
    ///
    /// Must return promptly: adapters with asynchronous native init kick it
    /// off here and report the outcome later through `signals`. Exactly one
    /// of `Ready` or `InitFailed` must eventually arrive after this returns
    /// `Ok`; on `Err` the bridge reports the failure itself and the adapter
    /// must not signal.
    async fn initialize(&mut self, signals: SignalSender) -> EngineResult<()>;

    /// Issue one utterance to the native engine
    ///
    /// Fire-and-forget: returning `Ok` means the engine accepted the
    /// utterance, not that audio finished. Progress is reported through
    /// signals carrying `utterance.id`. Engines without begin callbacks
    /// synthesize `Started` at issue time. A second call while speaking
    /// appends to the engine's own queue; the bridge has already stopped
    /// playback when flush semantics apply.
    async fn speak(&mut self, utterance: &NormalizedUtterance) -> EngineResult<()>;

    /// Stop current playback and clear the engine's queue
    async fn stop(&mut self) -> EngineResult<()>;

    /// Pause the current utterance
    async fn pause(&mut self) -> EngineResult<()>;

    /// Resume a paused utterance
    async fn resume(&mut self) -> EngineResult<()>;

    /// Enumerate available voices
    async fn voices(&mut self) -> EngineResult<Vec<VoiceInfo>>;

    /// Whether the engine is currently rendering audio
    async fn is_speaking(&mut self) -> EngineResult<bool>;

    /// Claim the platform audio output path (audio session/focus)
    ///
    /// Idempotent; called before every speak/preview issue. Platforms
    /// without an explicit focus concept keep the default no-op.
    async fn activate_output(&mut self) -> EngineResult<()> {
        Ok(())
    }

    /// Release the platform audio output path
    async fn deactivate_output(&mut self) -> EngineResult<()> {
        Ok(())
    }

    /// Shut down the engine and release native resources
    async fn shutdown(&mut self) -> EngineResult<()> {
        Ok(())
    }
}
