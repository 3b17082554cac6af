//! Active speech session bookkeeping.
//!
//! Tracks the utterances the engine has accepted but not yet terminated (at
//! most one rendering, the rest parked in the engine's own queue under add
//! mode) plus the pause and interruption flags. Engine calls and event
//! emission stay in the bridge; keeping the rules here makes them testable
//! without an engine.

use std::collections::VecDeque;

/// One utterance the engine has accepted but not yet terminated.
#[derive(Debug, Clone)]
pub(crate) struct LiveUtterance {
    pub id: u64,
    pub started: bool,
    /// Completion-watchdog allowance derived from the utterance text length.
    pub watchdog_budget_ms: u64,
}

#[derive(Debug, Default)]
pub(crate) struct SessionState {
    live: VecDeque<LiveUtterance>,
    paused: bool,
    was_interrupted: bool,
}

impl SessionState {
    pub fn is_speaking(&self) -> bool {
        !self.live.is_empty()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn was_interrupted(&self) -> bool {
        self.was_interrupted
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn set_interrupted(&mut self, interrupted: bool) {
        self.was_interrupted = interrupted;
    }

    /// Id of the utterance currently rendering (front of the queue).
    pub fn current_id(&self) -> Option<u64> {
        self.live.front().map(|u| u.id)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Record a newly issued utterance at the back of the queue.
    pub fn push_issued(&mut self, id: u64, watchdog_budget_ms: u64) {
        self.live.push_back(LiveUtterance {
            id,
            started: false,
            watchdog_budget_ms,
        });
    }

    /// Mark an utterance started. False when the id is not being tracked
    /// (signals racing a flush) or already started (duplicate callbacks),
    /// so the caller emits at most one start per id.
    pub fn mark_started(&mut self, id: u64) -> bool {
        match self.live.iter_mut().find(|u| u.id == id) {
            Some(u) if !u.started => {
                u.started = true;
                true
            }
            _ => false,
        }
    }

    /// Remove one utterance on its terminal. The pause and interruption
    /// flags only describe live speech, so they clear when the last
    /// utterance goes.
    pub fn remove(&mut self, id: u64) -> Option<LiveUtterance> {
        let idx = self.live.iter().position(|u| u.id == id)?;
        let removed = self.live.remove(idx);
        if self.live.is_empty() {
            self.paused = false;
            self.was_interrupted = false;
        }
        removed
    }

    /// Drain everything for a stop or flush. The caller owes each returned
    /// utterance exactly one terminal event.
    pub fn drain(&mut self) -> Vec<LiveUtterance> {
        self.paused = false;
        self.was_interrupted = false;
        self.live.drain(..).collect()
    }

    /// Watchdog budget of the utterance expected to be making progress.
    pub fn front_budget_ms(&self) -> Option<u64> {
        self.live.front().map(|u| u.watchdog_budget_ms)
    }
}
