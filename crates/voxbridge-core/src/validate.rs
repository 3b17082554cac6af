//! Input validation for caller-supplied requests.
//!
//! Validation runs before any engine call and has no side effects, so a
//! rejected request never reaches native code. Lengths are measured in
//! characters, not bytes.

use thiserror::Error;

use crate::types::SpeakRequest;

/// Maximum speakable text length.
pub const MAX_TEXT_LENGTH: usize = 10_000;
/// Maximum voice id length.
pub const MAX_VOICE_ID_LENGTH: usize = 256;
/// Maximum language tag length (longest registered BCP 47 tags are shorter).
pub const MAX_LANGUAGE_LENGTH: usize = 35;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Text cannot be empty")]
    EmptyText,
    #[error("Text exceeds maximum length of 10000 characters")]
    TextTooLong,
    #[error("Voice id exceeds maximum length of 256 characters")]
    VoiceIdTooLong,
    #[error("Voice id may only contain letters, digits, '.', '_' and '-'")]
    InvalidVoiceId,
    #[error("Language tag exceeds maximum length of 35 characters")]
    LanguageTooLong,
}

impl ValidationError {
    /// Stable machine-readable code for the host shell.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::EmptyText => "EMPTY_TEXT",
            ValidationError::TextTooLong => "TEXT_TOO_LONG",
            ValidationError::VoiceIdTooLong => "VOICE_ID_TOO_LONG",
            ValidationError::InvalidVoiceId => "INVALID_VOICE_ID",
            ValidationError::LanguageTooLong => "LANGUAGE_TOO_LONG",
        }
    }
}

/// Validate a full speak request.
pub fn validate(request: &SpeakRequest) -> Result<(), ValidationError> {
    validate_text(&request.text)?;
    if let Some(voice_id) = &request.voice_id {
        validate_voice_id(voice_id)?;
    }
    if let Some(language) = &request.language {
        validate_language(language)?;
    }
    Ok(())
}

pub fn validate_text(text: &str) -> Result<(), ValidationError> {
    if text.is_empty() {
        return Err(ValidationError::EmptyText);
    }
    if text.chars().count() > MAX_TEXT_LENGTH {
        return Err(ValidationError::TextTooLong);
    }
    Ok(())
}

/// Voice ids travel into shell-adjacent engine invocations, so the accepted
/// alphabet is a strict allowlist.
pub fn validate_voice_id(voice_id: &str) -> Result<(), ValidationError> {
    if voice_id.chars().count() > MAX_VOICE_ID_LENGTH {
        return Err(ValidationError::VoiceIdTooLong);
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-');
    if !voice_id.chars().all(allowed) {
        return Err(ValidationError::InvalidVoiceId);
    }
    Ok(())
}

pub fn validate_language(language: &str) -> Result<(), ValidationError> {
    if language.chars().count() > MAX_LANGUAGE_LENGTH {
        return Err(ValidationError::LanguageTooLong);
    }
    Ok(())
}
