//! Bridge configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for the bridge core. Hosts deserialize partial overrides from
/// their own settings layer; anything omitted keeps the default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BridgeConfig {
    /// Maximum speak requests parked while the engine initializes.
    pub queue_capacity: usize,
    /// Parked requests older than this at drain time are rejected (ms).
    pub pending_ttl_ms: u64,
    /// Voice list cache lifetime (ms).
    pub voice_cache_ttl_ms: u64,
    /// Base completion-watchdog allowance per utterance (ms).
    pub watchdog_base_ms: u64,
    /// Extra watchdog allowance per character of text (ms).
    pub watchdog_per_char_ms: u64,
    /// Cadence at which the signal pump polls the watchdog (ms).
    pub watchdog_poll_ms: u64,
    /// Outward event channel capacity.
    pub event_capacity: usize,
    /// Host override for the voice preview sample text.
    pub preview_text: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 50,
            pending_ttl_ms: 30_000,
            voice_cache_ttl_ms: 60_000,
            watchdog_base_ms: 30_000,
            watchdog_per_char_ms: 200,
            watchdog_poll_ms: 1_000,
            event_capacity: 64,
            preview_text: None,
        }
    }
}

impl BridgeConfig {
    pub fn pending_ttl(&self) -> Duration {
        Duration::from_millis(self.pending_ttl_ms)
    }

    pub fn voice_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.voice_cache_ttl_ms)
    }

    pub fn watchdog_poll(&self) -> Duration {
        Duration::from_millis(self.watchdog_poll_ms)
    }
}
