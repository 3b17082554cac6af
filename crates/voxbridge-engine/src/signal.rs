//! Signals flowing from engine adapters back to the bridge
//!
//! Native engines report lifecycle changes through delegate callbacks,
//! listener interfaces, or process exits depending on the platform. Adapters
//! translate all of them into `EngineSignal` values pushed through a
//! `SignalSender`; the bridge consumes them on its own execution context.

use tokio::sync::mpsc;
use tracing::debug;

/// Lifecycle signal emitted by an engine adapter
#[derive(Debug, Clone, PartialEq)]
pub enum EngineSignal {
    /// Engine finished initializing and can accept requests
    Ready { voice_count: usize },
    /// Engine initialization failed; terminal for the process lifetime
    InitFailed { message: String },
    /// The engine began rendering the utterance
    Started { id: u64 },
    /// The utterance completed naturally
    Finished { id: u64 },
    /// The utterance was stopped before completion
    Cancelled { id: u64 },
    /// The engine failed while rendering; `id` is absent when the failure
    /// cannot be attributed to a single utterance
    Errored { id: Option<u64>, message: String },
}

/// Handle adapters use to push signals to the bridge
///
/// Cloneable and cheap; adapters typically keep one copy for inline use and
/// move clones into callback closures or worker tasks. Sending never blocks.
/// Every adapter must eventually send exactly one of `Ready` or `InitFailed`
/// after `initialize` is called.
#[derive(Debug, Clone)]
pub struct SignalSender {
    tx: mpsc::UnboundedSender<EngineSignal>,
}

impl SignalSender {
    pub fn new(tx: mpsc::UnboundedSender<EngineSignal>) -> Self {
        Self { tx }
    }

    /// Push a signal; a dropped receiver means the bridge is shutting down
    /// and the signal is discarded.
    pub fn send(&self, signal: EngineSignal) {
        if self.tx.send(signal).is_err() {
            debug!("engine signal dropped, bridge receiver closed");
        }
    }

    pub fn ready(&self, voice_count: usize) {
        self.send(EngineSignal::Ready { voice_count });
    }

    pub fn init_failed(&self, message: impl Into<String>) {
        self.send(EngineSignal::InitFailed {
            message: message.into(),
        });
    }

    pub fn started(&self, id: u64) {
        self.send(EngineSignal::Started { id });
    }

    pub fn finished(&self, id: u64) {
        self.send(EngineSignal::Finished { id });
    }

    pub fn cancelled(&self, id: u64) {
        self.send(EngineSignal::Cancelled { id });
    }

    pub fn errored(&self, id: Option<u64>, message: impl Into<String>) {
        self.send(EngineSignal::Errored {
            id,
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signals_arrive_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sender = SignalSender::new(tx);

        sender.ready(3);
        sender.started(1);
        sender.finished(1);

        assert_eq!(rx.recv().await, Some(EngineSignal::Ready { voice_count: 3 }));
        assert_eq!(rx.recv().await, Some(EngineSignal::Started { id: 1 }));
        assert_eq!(rx.recv().await, Some(EngineSignal::Finished { id: 1 }));
    }

    #[tokio::test]
    async fn send_after_receiver_dropped_does_not_panic() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sender = SignalSender::new(tx);
        drop(rx);
        sender.started(7);
    }
}
