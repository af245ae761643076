//! Session manager owning the single backend client handle.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::{
    sync::{RwLock, watch},
    task::JoinHandle,
};
use wa_relay_core::{
    BackendError, BackendEvent, BackendFactory, ChatId, CredentialError, CredentialStore,
    MediaPayload, MessageContent, MessagingBackend, event_channel,
};

use crate::state::{QrChallenge, SessionMachine, SessionSnapshot, SessionState, Transition};

/// How long `shutdown` waits for the backend to close.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Session manager error.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("WhatsApp is not connected")]
    NotConnected,
    #[error("WhatsApp is already connected")]
    AlreadyConnected,
    #[error("QR Code not generated yet")]
    ChallengeUnavailable,
    #[error("{0}")]
    InvalidArgument(String),
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("Credential error: {0}")]
    Credentials(#[from] CredentialError),
}

/// Session manager settings.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Upper bound for backend teardown, chat lookup and send. `None` waits forever.
    pub backend_timeout: Option<Duration>,
    /// Start negotiating again on the fresh handle created by a disconnect.
    pub reconnect_after_disconnect: bool,
}

/// Connection status as reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub connected: bool,
    pub message: &'static str,
}

/// A message to send.
#[derive(Debug, Clone, Default)]
pub struct OutboundMessage {
    /// Phone-number-like recipient handle.
    pub recipient: String,
    /// Message text; the caption when an image is attached.
    pub text: String,
    /// Optional inline image.
    pub image: Option<MediaPayload>,
}

struct ClientHandle {
    backend: Arc<dyn MessagingBackend>,
    pump: JoinHandle<()>,
}

impl Drop for ClientHandle {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

/// Session manager for the single WhatsApp Web session.
///
/// Owns the current backend client handle. State only changes through
/// backend events (delivered by one pump task per handle) and
/// [`SessionManager::disconnect`].
pub struct SessionManager<F, C>
where
    F: BackendFactory,
    C: CredentialStore,
{
    factory: F,
    credentials: C,
    config: SessionConfig,
    machine: Arc<SessionMachine>,
    client: RwLock<ClientHandle>,
}

impl<F, C> SessionManager<F, C>
where
    F: BackendFactory,
    C: CredentialStore,
{
    /// Create a manager and its first client handle.
    ///
    /// Must be called from within a Tokio runtime. Does not connect; call
    /// [`SessionManager::initialize`].
    #[must_use]
    pub fn new(factory: F, credentials: C, config: SessionConfig) -> Self {
        let machine = Arc::new(SessionMachine::new());
        let client = spawn_client(&factory, &machine);
        Self {
            factory,
            credentials,
            config,
            machine,
            client: RwLock::new(client),
        }
    }

    /// Start negotiating the session in the background.
    ///
    /// Returns immediately; progress shows up as state transitions.
    pub async fn initialize(&self) {
        let backend = Arc::clone(&self.client.read().await.backend);
        spawn_connect(backend);
    }

    /// Current status, derived from state only.
    #[must_use]
    pub fn status(&self) -> Status {
        let state = self.machine.state();
        Status {
            connected: state.is_connected(),
            message: state.status_message(),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.machine.state()
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.machine.snapshot()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.machine.subscribe()
    }

    /// The cached login challenge.
    ///
    /// # Errors
    /// `AlreadyConnected` when ready, `ChallengeUnavailable` when no
    /// challenge has been issued.
    pub fn qr_challenge(&self) -> Result<QrChallenge, ManagerError> {
        let snapshot = self.machine.snapshot();
        if snapshot.state.is_connected() {
            return Err(ManagerError::AlreadyConnected);
        }
        snapshot.qr.ok_or(ManagerError::ChallengeUnavailable)
    }

    /// Tear the session down and wipe its credentials.
    ///
    /// Leaves a fresh, unconnected client handle in place unless
    /// `reconnect_after_disconnect` is set.
    ///
    /// # Errors
    /// Returns error if backend teardown or credential removal fails. A
    /// failed teardown leaves the state untouched.
    pub async fn disconnect(&self) -> Result<(), ManagerError> {
        let mut client = self.client.write().await;

        self.bounded("destroy", client.backend.destroy()).await?;
        client.pump.abort();
        self.machine.apply(Transition::Disconnected);
        tracing::info!("WhatsApp client destroyed");

        if self.credentials.exists().await {
            self.credentials.delete().await?;
            tracing::info!("Auth data deleted from {}", self.credentials.location());
        }

        *client = spawn_client(&self.factory, &self.machine);
        self.machine.apply(Transition::Reset);

        if self.config.reconnect_after_disconnect {
            spawn_connect(Arc::clone(&client.backend));
        }
        Ok(())
    }

    /// Send a text message, or a captioned image when one is attached.
    ///
    /// # Errors
    /// `NotConnected` unless ready, `InvalidArgument` when recipient or text
    /// is empty, `Backend` when the lookup or send fails.
    pub async fn send_message(&self, message: OutboundMessage) -> Result<(), ManagerError> {
        if !self.state().is_connected() {
            return Err(ManagerError::NotConnected);
        }

        let recipient = message.recipient.trim();
        if recipient.is_empty() || message.text.is_empty() {
            return Err(ManagerError::InvalidArgument(
                "Number and message are required".to_string(),
            ));
        }

        let chat_id = ChatId::from_number(recipient);
        let backend = Arc::clone(&self.client.read().await.backend);
        let chat = self.bounded("chat lookup", backend.chat(&chat_id)).await?;

        let content = match message.image {
            Some(media) => MessageContent::Media {
                media,
                caption: message.text,
            },
            None => MessageContent::Text(message.text),
        };
        let with_media = content.is_media();
        self.bounded("send", chat.send_message(content)).await?;

        tracing::debug!("Message sent to {chat_id} (media: {with_media})");
        Ok(())
    }

    /// Best-effort teardown on process exit. Credentials are kept.
    pub async fn shutdown(&self) {
        let client = self.client.read().await;
        match tokio::time::timeout(SHUTDOWN_GRACE, client.backend.destroy()).await {
            Ok(Ok(())) => tracing::info!("WhatsApp client closed"),
            Ok(Err(e)) => tracing::warn!("Failed to close WhatsApp client: {e}"),
            Err(_) => tracing::warn!("Timed out closing WhatsApp client"),
        }
    }

    async fn bounded<T, Fut>(&self, operation: &'static str, fut: Fut) -> Result<T, BackendError>
    where
        Fut: Future<Output = Result<T, BackendError>>,
    {
        match self.config.backend_timeout {
            Some(after) => tokio::time::timeout(after, fut)
                .await
                .map_err(|_| BackendError::Timeout { operation, after })?,
            None => fut.await,
        }
    }
}

fn spawn_client<F: BackendFactory>(factory: &F, machine: &Arc<SessionMachine>) -> ClientHandle {
    let (events, mut stream) = event_channel();
    let backend = factory.create(events);

    let machine = Arc::clone(machine);
    let pump = tokio::spawn(async move {
        while let Some(event) = stream.recv().await {
            match event {
                BackendEvent::Qr { token } => machine.on_qr_issued(&token),
                BackendEvent::Ready => machine.on_ready(),
            }
        }
    });

    ClientHandle { backend, pump }
}

fn spawn_connect(backend: Arc<dyn MessagingBackend>) {
    tokio::spawn(async move {
        tracing::info!("Connecting to WhatsApp Web");
        if let Err(e) = backend.connect().await {
            tracing::error!("Failed to initialize WhatsApp client: {e}");
        }
    });
}
