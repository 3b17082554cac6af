//! Engine readiness gate.
//!
//! Native engines initialize asynchronously, and on some platforms the app
//! issues speech within milliseconds of launch. Speak requests that arrive
//! before the engine reports ready park here in a bounded FIFO queue and are
//! replayed on the ready transition. Entries older than the pending TTL at
//! drain time are rejected instead of fired long after the caller gave up.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::clock::SharedClock;
use crate::error::{BridgeError, BridgeResult};
use crate::types::{SpeakRequest, SpeakResponse};

/// Readiness of the underlying engine. `NotReady -> Ready` and
/// `NotReady -> Failed` are the only transitions; both targets are terminal
/// for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    NotReady,
    Ready,
    Failed { message: String },
}

/// A speak request parked while the engine initializes.
pub(crate) struct PendingSpeak {
    pub request: SpeakRequest,
    pub enqueued_at: Instant,
    pub respond_to: oneshot::Sender<BridgeResult<SpeakResponse>>,
}

pub(crate) struct ReadinessGate {
    state: GateState,
    queue: VecDeque<PendingSpeak>,
    capacity: usize,
    pending_ttl: Duration,
    clock: SharedClock,
    state_tx: Sender<GateState>,
    state_rx: Receiver<GateState>,
}

impl ReadinessGate {
    pub fn new(capacity: usize, pending_ttl: Duration, clock: SharedClock) -> Self {
        let (state_tx, state_rx) = crossbeam_channel::unbounded();
        Self {
            state: GateState::NotReady,
            queue: VecDeque::new(),
            capacity,
            pending_ttl,
            clock,
            state_tx,
            state_rx,
        }
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, GateState::Ready)
    }

    /// Subscribe to readiness transitions. Each transition is sent at most
    /// once, in order.
    pub fn subscribe(&self) -> Receiver<GateState> {
        self.state_rx.clone()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Park a request; fails without queuing when the queue is at capacity.
    pub fn enqueue(&mut self, pending: PendingSpeak) -> Result<(), BridgeError> {
        if self.queue.len() >= self.capacity {
            debug!(queued = self.queue.len(), "pending queue full, rejecting speak");
            return Err(BridgeError::QueueFull {
                capacity: self.capacity,
            });
        }
        self.queue.push_back(pending);
        Ok(())
    }

    /// Transition to `Ready` and hand back the parked requests in arrival
    /// order. Signals received in any other state are ignored.
    pub fn mark_ready(&mut self) -> Vec<PendingSpeak> {
        if !matches!(self.state, GateState::NotReady) {
            warn!(state = ?self.state, "ignoring ready signal");
            return Vec::new();
        }
        info!(queued = self.queue.len(), "engine ready, draining pending queue");
        self.state = GateState::Ready;
        let _ = self.state_tx.send(GateState::Ready);
        self.queue.drain(..).collect()
    }

    /// Transition to `Failed` and hand back the parked requests for
    /// rejection. Signals received in any other state are ignored.
    pub fn mark_failed(&mut self, message: &str) -> Vec<PendingSpeak> {
        if !matches!(self.state, GateState::NotReady) {
            warn!(state = ?self.state, "ignoring init-failure signal");
            return Vec::new();
        }
        warn!(error = message, queued = self.queue.len(), "engine initialization failed");
        self.state = GateState::Failed {
            message: message.to_string(),
        };
        let _ = self.state_tx.send(self.state.clone());
        self.queue.drain(..).collect()
    }

    /// Whether a drained entry outlived the pending TTL. Evaluated at drain
    /// time so replay decisions use the entry's full wait, not its age when
    /// enqueued.
    pub fn is_stale(&self, pending: &PendingSpeak) -> bool {
        self.clock.now().duration_since(pending.enqueued_at) > self.pending_ttl
    }
}
