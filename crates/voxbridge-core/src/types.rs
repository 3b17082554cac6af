//! Wire types for the bridge command surface.
//!
//! Everything here crosses the host boundary as JSON, so field names are
//! camelCase and optional response fields are omitted rather than null.

use serde::{Deserialize, Serialize};
use voxbridge_engine::VoiceInfo;

/// Sample text spoken by `previewVoice` when the caller supplies none.
pub const DEFAULT_PREVIEW_TEXT: &str = "Hello! This is a sample of how this voice sounds.";

/// How a speak request interacts with speech already in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueMode {
    /// Cancel anything in flight and start immediately.
    #[default]
    Flush,
    /// Park behind the current utterance and speak when it finishes.
    Add,
}

/// A caller's request to speak text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakRequest {
    /// Text to speak.
    pub text: String,
    /// BCP 47-ish language preference, e.g. "en-US" or "pt".
    #[serde(default)]
    pub language: Option<String>,
    /// Voice id from `getVoices`; takes precedence over `language`.
    #[serde(default)]
    pub voice_id: Option<String>,
    /// Speech rate, 0.1 (slowest) to 4.0 (fastest), 1.0 neutral.
    #[serde(default)]
    pub rate: Option<f32>,
    /// Pitch, 0.5 (low) to 2.0 (high), 1.0 neutral.
    #[serde(default)]
    pub pitch: Option<f32>,
    /// Volume, 0.0 (silent) to 1.0 (full), 1.0 neutral.
    #[serde(default)]
    pub volume: Option<f32>,
    #[serde(default)]
    pub queue_mode: QueueMode,
}

impl SpeakRequest {
    /// A plain-text request with every optional field absent.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: None,
            voice_id: None,
            rate: None,
            pitch: None,
            volume: None,
            queue_mode: QueueMode::default(),
        }
    }
}

/// Result of `speak` and `previewVoice`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakResponse {
    pub success: bool,
    /// Id to correlate lifecycle events with; absent on in-band failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utterance_id: Option<u64>,
    /// Non-fatal degradation notice, e.g. a voice fallback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Result of `stop`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopResponse {
    pub success: bool,
}

/// Result of `pauseSpeaking` and `resumeSpeaking`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseResumeResponse {
    pub success: bool,
    /// Human-readable reason when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PauseResumeResponse {
    pub fn granted() -> Self {
        Self {
            success: true,
            reason: None,
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: Some(reason.into()),
        }
    }
}

/// Parameters for `getVoices`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetVoicesRequest {
    /// Case-insensitive substring match on the voice language tag.
    #[serde(default)]
    pub language: Option<String>,
}

/// Result of `getVoices`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetVoicesResponse {
    pub voices: Vec<VoiceInfo>,
    /// Present (false) only when the list is empty because the engine has
    /// not finished initializing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initialized: Option<bool>,
}

/// Result of `isSpeaking`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsSpeakingResponse {
    pub speaking: bool,
}

/// Result of `isInitialized`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsInitializedResponse {
    pub initialized: bool,
    pub voice_count: u32,
}

/// Parameters for `previewVoice`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewVoiceRequest {
    /// Voice id to audition; must already exist in the catalog.
    pub voice_id: String,
    /// Optional replacement for [`DEFAULT_PREVIEW_TEXT`].
    #[serde(default)]
    pub text: Option<String>,
}
