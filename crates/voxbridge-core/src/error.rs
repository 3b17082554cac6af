//! Bridge error types.
//!
//! Errors serialize as `{code, message}` so host shells can branch on the
//! code without parsing prose.

use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use thiserror::Error;
use voxbridge_engine::EngineError;

use crate::validate::ValidationError;

pub type BridgeResult<T> = std::result::Result<T, BridgeError>;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Speech queue is full ({capacity} requests pending)")]
    QueueFull { capacity: usize },

    #[error("Request expired before the engine became ready")]
    NotReadyTimeout,

    #[error("Engine initialization failed: {0}")]
    InitFailed(String),

    #[error("Engine not initialized")]
    NotInitialized,

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Bridge is shutting down")]
    Shutdown,
}

impl BridgeError {
    /// Stable machine-readable code for the host shell.
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::Validation(e) => e.code(),
            BridgeError::QueueFull { .. } => "QUEUE_FULL",
            BridgeError::NotReadyTimeout => "NOT_READY_TIMEOUT",
            BridgeError::InitFailed(_) => "INIT_FAILED",
            BridgeError::NotInitialized => "NOT_INITIALIZED",
            BridgeError::Engine(_) => "ENGINE_ERROR",
            BridgeError::Shutdown => "SHUTDOWN",
        }
    }
}

impl Serialize for BridgeError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("BridgeError", 2)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}
