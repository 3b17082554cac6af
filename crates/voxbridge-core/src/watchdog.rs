//! Completion watchdog.
//!
//! Some engines accept an utterance and then never deliver a completion
//! callback (lost delegate, dead speech service, platform bug). The bridge
//! arms a deadline whenever an utterance should be making progress and the
//! signal pump polls it; when the deadline passes, the session is failed so
//! no callback loss can leave the controller stuck in Speaking.

use std::time::{Duration, Instant};

use crate::clock::SharedClock;

pub(crate) struct CompletionWatchdog {
    clock: SharedClock,
    deadline: Option<Instant>,
}

impl CompletionWatchdog {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            deadline: None,
        }
    }

    /// Arm or re-arm the deadline `budget` from now.
    pub fn arm(&mut self, budget: Duration) {
        self.deadline = Some(self.clock.now() + budget);
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| self.clock.now() >= d)
    }
}

/// Budget for one utterance: a base allowance plus a per-character
/// allowance, so long text at slow rates does not false-trigger.
pub(crate) fn budget_ms(text_chars: usize, base_ms: u64, per_char_ms: u64) -> u64 {
    base_ms.saturating_add((text_chars as u64).saturating_mul(per_char_ms))
}
