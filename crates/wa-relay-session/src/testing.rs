//! Recording mock backend for tests.

use std::{
    io,
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::watch;
use wa_relay_core::{
    BackendError, BackendEvent, BackendFactory, Chat, ChatId, CredentialError, CredentialStore,
    EventSink, MessageContent, MessagingBackend,
};

use crate::state::SessionSnapshot;

/// A call the relay made into the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Connect,
    Destroy,
    GetChat(ChatId),
    Send { chat: ChatId, content: MessageContent },
}

/// Shared knobs and recordings of every handle a [`MockFactory`] creates.
#[derive(Debug, Default)]
pub struct MockControl {
    calls: Mutex<Vec<BackendCall>>,
    sinks: Mutex<Vec<EventSink>>,
    fail_destroy: AtomicBool,
    fail_send: AtomicBool,
    hang_send: AtomicBool,
}

impl MockControl {
    fn record(&self, call: BackendCall) {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(call);
    }

    /// Every call recorded so far, across handles.
    #[must_use]
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Number of client handles created.
    #[must_use]
    pub fn handles_created(&self) -> usize {
        self.sinks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Emit an event from the most recently created handle.
    ///
    /// Returns false if no handle exists or its receiver is gone.
    pub fn emit(&self, event: BackendEvent) -> bool {
        self.sinks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .last()
            .is_some_and(|sink| sink.send(event).is_ok())
    }

    /// Emit an event from the handle created `index`-th (0-based).
    pub fn emit_from(&self, index: usize, event: BackendEvent) -> bool {
        self.sinks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(index)
            .is_some_and(|sink| sink.send(event).is_ok())
    }

    /// Make `destroy` fail.
    pub fn fail_destroy(&self, fail: bool) {
        self.fail_destroy.store(fail, Ordering::SeqCst);
    }

    /// Make `send_message` fail.
    pub fn fail_send(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }

    /// Make `send_message` never complete.
    pub fn hang_send(&self, hang: bool) {
        self.hang_send.store(hang, Ordering::SeqCst);
    }
}

/// Factory of [`MockBackend`] handles sharing one [`MockControl`].
#[derive(Debug, Clone, Default)]
pub struct MockFactory {
    control: Arc<MockControl>,
}

impl MockFactory {
    /// Create a factory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared control.
    #[must_use]
    pub fn control(&self) -> Arc<MockControl> {
        Arc::clone(&self.control)
    }
}

impl BackendFactory for MockFactory {
    fn create(&self, events: EventSink) -> Arc<dyn MessagingBackend> {
        self.control
            .sinks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(events);
        Arc::new(MockBackend {
            control: Arc::clone(&self.control),
        })
    }
}

/// Backend handle that records calls and never talks to anything.
#[derive(Debug)]
pub struct MockBackend {
    control: Arc<MockControl>,
}

#[async_trait]
impl MessagingBackend for MockBackend {
    async fn connect(&self) -> Result<(), BackendError> {
        self.control.record(BackendCall::Connect);
        Ok(())
    }

    async fn destroy(&self) -> Result<(), BackendError> {
        self.control.record(BackendCall::Destroy);
        if self.control.fail_destroy.load(Ordering::SeqCst) {
            return Err(BackendError::Failed("browser already closed".to_string()));
        }
        Ok(())
    }

    async fn chat(&self, id: &ChatId) -> Result<Arc<dyn Chat>, BackendError> {
        self.control.record(BackendCall::GetChat(id.clone()));
        Ok(Arc::new(MockChat {
            id: id.clone(),
            control: Arc::clone(&self.control),
        }))
    }
}

#[derive(Debug)]
struct MockChat {
    id: ChatId,
    control: Arc<MockControl>,
}

#[async_trait]
impl Chat for MockChat {
    async fn send_message(&self, content: MessageContent) -> Result<(), BackendError> {
        if self.control.hang_send.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.control.record(BackendCall::Send {
            chat: self.id.clone(),
            content,
        });
        if self.control.fail_send.load(Ordering::SeqCst) {
            return Err(BackendError::Failed("evaluation failed".to_string()));
        }
        Ok(())
    }
}

/// Credentials that are always present and can never be removed.
#[derive(Debug, Default)]
pub struct StuckCredentials;

#[async_trait]
impl CredentialStore for StuckCredentials {
    async fn exists(&self) -> bool {
        true
    }

    async fn delete(&self) -> Result<(), CredentialError> {
        Err(CredentialError::Io {
            path: PathBuf::from(self.location()),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only file system"),
        })
    }

    fn location(&self) -> String {
        "/readonly/.wwebjs_auth/session".to_string()
    }
}

/// Wait until the snapshot satisfies `pred`, for at most one second.
///
/// # Panics
/// Panics if the condition is not reached in time.
pub async fn wait_for<F>(mut rx: watch::Receiver<SessionSnapshot>, pred: F) -> SessionSnapshot
where
    F: FnMut(&SessionSnapshot) -> bool,
{
    let snapshot = tokio::time::timeout(Duration::from_secs(1), rx.wait_for(pred))
        .await
        .expect("session did not reach the expected state")
        .expect("session machine dropped")
        .clone();
    snapshot
}
