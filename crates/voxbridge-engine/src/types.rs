//! Transport types shared between the bridge core and engine adapters

use serde::{Deserialize, Serialize};

/// A voice available on the system
///
/// The `id` is the exact token the engine expects back when the caller later
/// selects the voice for a speak or preview request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceInfo {
    /// Unique voice identifier
    pub id: String,
    /// Human-readable voice name
    pub name: String,
    /// Language tag (e.g. "en-US", "pt-BR")
    pub language: String,
}

/// Capabilities an engine adapter advertises
///
/// The bridge consults these before issuing optional operations so that
/// unsupported primitives get an honest failure instead of a silent no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineFeatures {
    /// Engine accepts a speaking-rate override
    pub rate: bool,
    /// Engine accepts a pitch override
    pub pitch: bool,
    /// Engine accepts a volume override
    pub volume: bool,
    /// Engine can pause the current utterance
    pub pause: bool,
    /// Engine can resume a paused utterance
    pub resume: bool,
    /// Engine can report whether it is speaking
    pub is_speaking: bool,
    /// Engine delivers per-utterance lifecycle callbacks
    pub utterance_callbacks: bool,
}

/// Parameter application plan produced by the normalizer
///
/// `None` means the engine's own setting is left untouched. Neutral values
/// never appear here: some engines corrupt internal state when an identity
/// value is written through an explicit setter call, so neutral parameters
/// are expressed as absence.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParamPlan {
    /// Speaking rate in the external 0.1–4.0 contract, absent when neutral
    pub rate: Option<f32>,
    /// Pitch in 0.5–2.0, absent when neutral
    pub pitch: Option<f32>,
    /// Volume in 0.0–1.0, absent when neutral
    pub volume: Option<f32>,
}

impl ParamPlan {
    /// True when no setter should be touched at all
    pub fn is_noop(&self) -> bool {
        self.rate.is_none() && self.pitch.is_none() && self.volume.is_none()
    }
}

/// Outcome of voice/language resolution for one utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceSelection {
    /// A specific voice was matched and should be selected
    Voice(VoiceInfo),
    /// No voice matched; the engine should pick its default for this language
    Language(String),
    /// Use whatever the engine considers its default voice
    EngineDefault,
}

/// A validated, normalized utterance handed to an engine adapter
///
/// Owned transiently for the duration of one speak call. The `id` is the
/// token the adapter must echo back in every signal about this utterance.
#[derive(Debug, Clone)]
pub struct NormalizedUtterance {
    /// Bridge-minted utterance id
    pub id: u64,
    /// Validated text to render
    pub text: String,
    /// Resolved voice selection
    pub selection: VoiceSelection,
    /// Parameter application plan
    pub params: ParamPlan,
}
