use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::JobEvent;

/// Envelope wrapping an event with its emission time
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: JobEvent,
}

/// Handle for emitting events
///
/// Cheaply cloneable. Publishing is best-effort: failures are logged and never
/// reach the caller.
#[derive(Clone)]
pub struct EventHandle {
    tx: mpsc::Sender<EventEnvelope>,
}

impl EventHandle {
    pub fn new(tx: mpsc::Sender<EventEnvelope>) -> Self {
        Self { tx }
    }

    /// Handle whose events go nowhere; for tests and tools.
    pub fn disconnected() -> Self {
        let (tx, _) = mpsc::channel(1);
        Self { tx }
    }

    /// Emit an event, waiting for channel capacity.
    pub async fn emit(&self, event: JobEvent) {
        let envelope = EventEnvelope {
            timestamp: Utc::now(),
            event,
        };
        if let Err(e) = self.tx.send(envelope).await {
            tracing::error!("Failed to emit event: {}", e);
        }
    }

    /// Emit without waiting. Returns true if the event was queued.
    pub fn try_emit(&self, event: JobEvent) -> bool {
        let envelope = EventEnvelope {
            timestamp: Utc::now(),
            event,
        };
        match self.tx.try_send(envelope) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to emit event: {}", e);
                false
            }
        }
    }
}
