//! Lifecycle events emitted by a backend client.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Event emitted by a messaging backend while negotiating a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendEvent {
    /// A new login challenge must be scanned. May repeat before `Ready`.
    Qr { token: String },
    /// The session is authenticated and usable.
    Ready,
}

impl BackendEvent {
    /// Create a QR event.
    #[must_use]
    pub fn qr(token: impl Into<String>) -> Self {
        Self::Qr {
            token: token.into(),
        }
    }
}

/// Channel end a backend client pushes its events into.
///
/// One sink per client handle; the receiving side is owned by the session
/// manager.
pub type EventSink = mpsc::UnboundedSender<BackendEvent>;

/// Receiving side of an [`EventSink`].
pub type EventStream = mpsc::UnboundedReceiver<BackendEvent>;

/// Create a connected sink/stream pair.
#[must_use]
pub fn event_channel() -> (EventSink, EventStream) {
    mpsc::unbounded_channel()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_string(&BackendEvent::qr("ABC123")).unwrap();
        assert_eq!(json, r#"{"type":"qr","token":"ABC123"}"#);

        let ready: BackendEvent = serde_json::from_str(r#"{"type":"ready"}"#).unwrap();
        assert_eq!(ready, BackendEvent::Ready);
    }

    #[tokio::test]
    async fn test_channel_delivers_in_order() {
        let (tx, mut rx) = event_channel();
        tx.send(BackendEvent::qr("one")).unwrap();
        tx.send(BackendEvent::Ready).unwrap();
        drop(tx);

        assert_eq!(rx.recv().await, Some(BackendEvent::qr("one")));
        assert_eq!(rx.recv().await, Some(BackendEvent::Ready));
        assert_eq!(rx.recv().await, None);
    }
}
