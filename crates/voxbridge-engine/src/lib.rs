//! Speech engine abstraction layer for VoxBridge
//!
//! This crate provides the foundational types and traits for driving native
//! text-to-speech engines: the `SpeechEngine` capability trait, the signal
//! sink adapters use to report lifecycle changes back to the bridge, and the
//! transport types shared between the bridge core and its adapters.

use std::sync::atomic::{AtomicU64, Ordering};

pub mod engine;
pub mod error;
pub mod mock;
pub mod null;
pub mod signal;
pub mod types;

pub use engine::SpeechEngine;
pub use error::{EngineError, EngineResult};
pub use mock::{MockCall, MockConfig, MockEngine, MockHandle, Readiness};
pub use null::NullEngine;
pub use signal::{EngineSignal, SignalSender};
pub use types::{EngineFeatures, NormalizedUtterance, ParamPlan, VoiceInfo, VoiceSelection};

/// Generates unique utterance IDs
static UTTERANCE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate a unique utterance ID
///
/// IDs are process-wide and never reused; every speak or preview call mints
/// a fresh one.
pub fn next_utterance_id() -> u64 {
    UTTERANCE_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}
