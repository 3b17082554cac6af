//! Error types for speech engine adapters

use thiserror::Error;

/// Engine-side error types
#[derive(Error, Debug)]
pub enum EngineError {
    /// Engine is not available or not installed
    #[error("Engine not available: {0}")]
    NotAvailable(String),

    /// Engine initialization failed
    #[error("Engine initialization failed: {0}")]
    Initialization(String),

    /// Voice not found or not supported
    #[error("Voice not found: {0}")]
    VoiceNotFound(String),

    /// Speech synthesis failed at issue time
    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    /// Operation is not supported by this engine
    #[error("{0} is not supported by this engine")]
    NotSupported(&'static str),

    /// IO error (process spawning, pipe handling)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Engine-specific error
    #[error("Engine error ({engine}): {message}")]
    EngineSpecific { engine: String, message: String },
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
