//! Session lifecycle state machine.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::qr::{self, QrError};

/// Lifecycle of the single backend session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session negotiated on the current client handle.
    #[default]
    Uninitialized,
    /// A login challenge is waiting to be scanned.
    AwaitingQr,
    /// Authenticated; messages can be sent.
    Ready,
    /// Backend torn down, credentials not yet wiped.
    Disconnected,
}

impl SessionState {
    /// Whether messages can be sent.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Human readable status line.
    #[must_use]
    pub const fn status_message(self) -> &'static str {
        if self.is_connected() {
            "WhatsApp is connected"
        } else {
            "WhatsApp is not connected"
        }
    }
}

/// The latest unscanned login challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrChallenge {
    /// Token as issued by the backend.
    pub token: String,
    /// Token rendered as a PNG data URI.
    pub data_uri: String,
}

impl QrChallenge {
    /// Render a challenge from a backend token.
    ///
    /// # Errors
    /// Returns error if the token cannot be rendered.
    pub fn render(token: impl Into<String>) -> Result<Self, QrError> {
        let token = token.into();
        let data_uri = qr::render_data_uri(&token)?;
        Ok(Self { token, data_uri })
    }
}

/// A state change.
#[derive(Debug, Clone)]
pub enum Transition {
    /// Backend issued (or re-issued) a challenge.
    QrIssued(QrChallenge),
    /// Backend reported the session ready.
    Ready,
    /// Backend was torn down.
    Disconnected,
    /// Credentials wiped, fresh client handle in place.
    Reset,
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub qr: Option<QrChallenge>,
}

impl SessionSnapshot {
    fn apply(&mut self, transition: Transition) {
        match transition {
            Transition::QrIssued(challenge) => {
                self.state = SessionState::AwaitingQr;
                self.qr = Some(challenge);
            }
            Transition::Ready => {
                self.state = SessionState::Ready;
                self.qr = None;
            }
            Transition::Disconnected => {
                self.state = SessionState::Disconnected;
                self.qr = None;
            }
            Transition::Reset => {
                self.state = SessionState::Uninitialized;
                self.qr = None;
            }
        }
    }
}

/// Owner of the session snapshot.
///
/// `apply` is the only way the snapshot changes; readers get clones or a
/// watch receiver.
#[derive(Debug)]
pub struct SessionMachine {
    tx: watch::Sender<SessionSnapshot>,
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionMachine {
    /// Create a machine in `Uninitialized`.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SessionSnapshot::default());
        Self { tx }
    }

    /// Apply a transition and notify subscribers.
    pub fn apply(&self, transition: Transition) {
        self.tx.send_modify(|snapshot| snapshot.apply(transition));
    }

    /// Handle a QR event from the backend.
    pub fn on_qr_issued(&self, token: &str) {
        match QrChallenge::render(token) {
            Ok(challenge) => {
                self.apply(Transition::QrIssued(challenge));
                tracing::info!("New QR Code generated");
            }
            Err(e) => tracing::error!("Failed to render QR Code: {e}"),
        }
    }

    /// Handle the ready event from the backend.
    pub fn on_ready(&self) {
        self.apply(Transition::Ready);
        tracing::info!("Client is ready!");
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.tx.borrow().clone()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.tx.borrow().state
    }

    /// Receiver notified on every transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_uninitialized() {
        let machine = SessionMachine::new();
        assert_eq!(machine.snapshot(), SessionSnapshot::default());
        assert_eq!(machine.state(), SessionState::Uninitialized);
        assert!(!machine.state().is_connected());
    }

    #[test]
    fn test_qr_then_ready() {
        let machine = SessionMachine::new();
        machine.on_qr_issued("ABC123");

        let snap = machine.snapshot();
        assert_eq!(snap.state, SessionState::AwaitingQr);
        assert_eq!(snap.qr.unwrap().token, "ABC123");

        machine.on_ready();
        let snap = machine.snapshot();
        assert_eq!(snap.state, SessionState::Ready);
        assert!(snap.qr.is_none());
        assert_eq!(snap.state.status_message(), "WhatsApp is connected");
    }

    #[test]
    fn test_reissued_qr_replaces_challenge() {
        let machine = SessionMachine::new();
        for token in ["one", "two", "three"] {
            machine.on_qr_issued(token);
            assert_eq!(machine.state(), SessionState::AwaitingQr);
        }
        assert_eq!(machine.snapshot().qr.unwrap().token, "three");

        machine.on_ready();
        assert_eq!(machine.state(), SessionState::Ready);
    }

    #[test]
    fn test_ready_without_prior_qr() {
        let machine = SessionMachine::new();
        machine.on_ready();
        assert_eq!(machine.state(), SessionState::Ready);
    }

    #[test]
    fn test_qr_after_ready_awaits_scan_again() {
        let machine = SessionMachine::new();
        machine.on_ready();
        machine.on_qr_issued("renewed");
        assert_eq!(machine.state(), SessionState::AwaitingQr);
    }

    #[test]
    fn test_disconnect_and_reset_clear_challenge() {
        let machine = SessionMachine::new();
        machine.on_qr_issued("ABC123");
        machine.apply(Transition::Disconnected);
        assert_eq!(machine.state(), SessionState::Disconnected);
        assert!(machine.snapshot().qr.is_none());

        machine.apply(Transition::Reset);
        assert_eq!(machine.snapshot(), SessionSnapshot::default());
    }

    #[test]
    fn test_unrenderable_qr_is_dropped() {
        let machine = SessionMachine::new();
        machine.on_qr_issued(&"x".repeat(8000));
        assert_eq!(machine.state(), SessionState::Uninitialized);
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let machine = SessionMachine::new();
        let mut rx = machine.subscribe();
        machine.on_ready();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().state, SessionState::Ready);
    }
}
