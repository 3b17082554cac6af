//! Null engine that accepts everything and renders nothing
//!
//! Useful as a safe fallback on hosts with no usable speech stack: callers
//! get the full command surface and well-formed lifecycle events, just no
//! audio.

use async_trait::async_trait;

use crate::engine::SpeechEngine;
use crate::error::{EngineError, EngineResult};
use crate::signal::SignalSender;
use crate::types::{EngineFeatures, NormalizedUtterance, VoiceInfo};

#[derive(Debug, Default)]
pub struct NullEngine {
    signals: Option<SignalSender>,
}

impl NullEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SpeechEngine for NullEngine {
    fn name(&self) -> &str {
        "null"
    }

    fn features(&self) -> EngineFeatures {
        EngineFeatures {
            is_speaking: true,
            utterance_callbacks: true,
            ..Default::default()
        }
    }

    async fn initialize(&mut self, signals: SignalSender) -> EngineResult<()> {
        signals.ready(0);
        self.signals = Some(signals);
        Ok(())
    }

    async fn speak(&mut self, utterance: &NormalizedUtterance) -> EngineResult<()> {
        // Complete instantly; there is nothing to render
        if let Some(signals) = &self.signals {
            signals.started(utterance.id);
            signals.finished(utterance.id);
        }
        Ok(())
    }

    async fn stop(&mut self) -> EngineResult<()> {
        Ok(())
    }

    async fn pause(&mut self) -> EngineResult<()> {
        Err(EngineError::NotSupported("pause"))
    }

    async fn resume(&mut self) -> EngineResult<()> {
        Err(EngineError::NotSupported("resume"))
    }

    async fn voices(&mut self) -> EngineResult<Vec<VoiceInfo>> {
        Ok(Vec::new())
    }

    async fn is_speaking(&mut self) -> EngineResult<bool> {
        Ok(false)
    }
}
