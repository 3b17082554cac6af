//! Voice catalog cache.
//!
//! Voice enumeration hits the platform on every call and is slow on several
//! engines, so results are cached with a TTL. Platforms do not reliably
//! notify when the installed voice set changes; expiry is the only
//! invalidation. When a refresh fails and a stale entry exists, the stale
//! entry is served rather than surfacing the outage.

use std::time::{Duration, Instant};

use tracing::{debug, warn};
use voxbridge_engine::{EngineError, SpeechEngine, VoiceInfo};

use crate::clock::SharedClock;

struct CacheEntry {
    voices: Vec<VoiceInfo>,
    fetched_at: Instant,
}

pub struct VoiceCatalog {
    ttl: Duration,
    clock: SharedClock,
    entry: Option<CacheEntry>,
}

impl VoiceCatalog {
    pub fn new(ttl: Duration, clock: SharedClock) -> Self {
        Self {
            ttl,
            clock,
            entry: None,
        }
    }

    fn fresh_entry(&self) -> Option<&CacheEntry> {
        self.entry
            .as_ref()
            .filter(|e| self.clock.now().duration_since(e.fetched_at) < self.ttl)
    }

    /// Full voice list, served from cache while fresh.
    pub async fn all(&mut self, engine: &mut dyn SpeechEngine) -> Result<Vec<VoiceInfo>, EngineError> {
        if let Some(entry) = self.fresh_entry() {
            return Ok(entry.voices.clone());
        }
        match engine.voices().await {
            Ok(voices) => {
                debug!(count = voices.len(), "voice list refreshed");
                self.entry = Some(CacheEntry {
                    voices: voices.clone(),
                    fetched_at: self.clock.now(),
                });
                Ok(voices)
            }
            Err(e) => match &self.entry {
                Some(stale) => {
                    warn!(error = %e, "voice enumeration failed, serving stale cache");
                    Ok(stale.voices.clone())
                }
                None => Err(e),
            },
        }
    }

    /// Voice list filtered by a case-insensitive substring match on the
    /// language tag. "en" matches "en-US" and "en-GB"; `None` returns all.
    pub async fn filtered(
        &mut self,
        engine: &mut dyn SpeechEngine,
        language: Option<&str>,
    ) -> Result<Vec<VoiceInfo>, EngineError> {
        let voices = self.all(engine).await?;
        Ok(filter_by_language(voices, language))
    }

    /// Exact id lookup.
    pub async fn find_by_id(
        &mut self,
        engine: &mut dyn SpeechEngine,
        id: &str,
    ) -> Result<Option<VoiceInfo>, EngineError> {
        Ok(self.all(engine).await?.into_iter().find(|v| v.id == id))
    }

    /// First voice whose language tag contains the filter, case-insensitive.
    pub async fn find_by_language(
        &mut self,
        engine: &mut dyn SpeechEngine,
        language: &str,
    ) -> Result<Option<VoiceInfo>, EngineError> {
        let needle = language.to_lowercase();
        Ok(self
            .all(engine)
            .await?
            .into_iter()
            .find(|v| v.language.to_lowercase().contains(&needle)))
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}

fn filter_by_language(voices: Vec<VoiceInfo>, language: Option<&str>) -> Vec<VoiceInfo> {
    match language {
        Some(filter) => {
            let needle = filter.to_lowercase();
            voices
                .into_iter()
                .filter(|v| v.language.to_lowercase().contains(&needle))
                .collect()
        }
        None => voices,
    }
}
