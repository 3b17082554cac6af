//! Request arbitration and validated-parameter normalization for VoxBridge.
//!
//! This crate sits between an untrusted caller surface (IPC from a UI
//! process, an RPC endpoint, a test harness) and one native speech engine
//! behind the [`SpeechEngine`](voxbridge_engine::SpeechEngine) trait. It
//! owns the things every platform gets wrong slightly differently:
//!
//! - input validation, so malformed or hostile requests never reach native
//!   code ([`validate`])
//! - prosody normalization, clamping rate/pitch/volume and expressing
//!   neutral values as absence ([`normalize`])
//! - the readiness gate, parking early speak requests in a bounded queue
//!   until the engine initializes ([`gate`])
//! - the speech session controller with flush/add semantics, pause state,
//!   and interruption recovery ([`TtsBridge`])
//! - the voice catalog cache ([`catalog`])
//!
//! All state lives behind a single async mutex inside [`TtsBridge`]; the
//! caller surface just forwards commands and subscribes to
//! [`SpeechEvent`]s.

pub mod bridge;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod gate;
pub mod normalize;
pub mod types;
pub mod validate;

mod session;
mod watchdog;

pub use bridge::TtsBridge;
pub use config::BridgeConfig;
pub use error::{BridgeError, BridgeResult};
pub use events::{SpeechEvent, SpeechEventKind};
pub use gate::GateState;
pub use normalize::normalize;
pub use types::{
    GetVoicesRequest, GetVoicesResponse, IsInitializedResponse, IsSpeakingResponse,
    PauseResumeResponse, PreviewVoiceRequest, QueueMode, SpeakRequest, SpeakResponse,
    StopResponse, DEFAULT_PREVIEW_TEXT,
};
pub use validate::{validate, ValidationError};

pub use voxbridge_engine::{EngineFeatures, SpeechEngine, VoiceInfo};
