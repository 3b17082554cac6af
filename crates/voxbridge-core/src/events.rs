//! Outward speech lifecycle events.
//!
//! Events fan out on a broadcast channel. Host shells forward each event to
//! their own event system under the channel name from
//! [`SpeechEventKind::channel`]; the payload serializes with the kind
//! stripped, since the kind becomes the channel itself.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SpeechEventKind {
    Start,
    Finish,
    Cancel,
    Pause,
    Resume,
    Error,
    Interrupted,
    BackgroundPause,
}

impl SpeechEventKind {
    /// Channel name the host emits this event under.
    pub fn channel(self) -> &'static str {
        match self {
            SpeechEventKind::Start => "speech:start",
            SpeechEventKind::Finish => "speech:finish",
            SpeechEventKind::Cancel => "speech:cancel",
            SpeechEventKind::Pause => "speech:pause",
            SpeechEventKind::Resume => "speech:resume",
            SpeechEventKind::Error => "speech:error",
            SpeechEventKind::Interrupted => "speech:interrupted",
            SpeechEventKind::BackgroundPause => "speech:backgroundPause",
        }
    }
}

/// One lifecycle event as delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechEvent {
    #[serde(skip)]
    pub kind: SpeechEventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interrupted: Option<bool>,
}

impl SpeechEvent {
    fn new(kind: SpeechEventKind) -> Self {
        Self {
            kind,
            id: None,
            error: None,
            interrupted: None,
        }
    }

    pub fn start(id: u64) -> Self {
        Self {
            id: Some(id),
            ..Self::new(SpeechEventKind::Start)
        }
    }

    pub fn finish(id: u64) -> Self {
        Self {
            id: Some(id),
            ..Self::new(SpeechEventKind::Finish)
        }
    }

    /// `interrupted` records whether the cancellation happened while the
    /// session was recovering from a transient interruption.
    pub fn cancel(id: u64, interrupted: bool) -> Self {
        Self {
            id: Some(id),
            interrupted: Some(interrupted),
            ..Self::new(SpeechEventKind::Cancel)
        }
    }

    pub fn pause(id: u64) -> Self {
        Self {
            id: Some(id),
            ..Self::new(SpeechEventKind::Pause)
        }
    }

    pub fn resume(id: u64) -> Self {
        Self {
            id: Some(id),
            ..Self::new(SpeechEventKind::Resume)
        }
    }

    pub fn error(id: Option<u64>, message: impl Into<String>) -> Self {
        Self {
            id,
            error: Some(message.into()),
            ..Self::new(SpeechEventKind::Error)
        }
    }

    pub fn interrupted(id: u64) -> Self {
        Self {
            id: Some(id),
            interrupted: Some(true),
            ..Self::new(SpeechEventKind::Interrupted)
        }
    }

    pub fn background_pause(id: u64) -> Self {
        Self {
            id: Some(id),
            ..Self::new(SpeechEventKind::BackgroundPause)
        }
    }
}

/// Broadcast fan-out for speech events. Emission never blocks and never
/// fails; an event with no subscribers is simply dropped.
#[derive(Clone)]
pub(crate) struct EventSink {
    tx: broadcast::Sender<SpeechEvent>,
}

impl EventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SpeechEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: SpeechEvent) {
        trace!(channel = event.kind.channel(), id = event.id, "speech event");
        let _ = self.tx.send(event);
    }
}
