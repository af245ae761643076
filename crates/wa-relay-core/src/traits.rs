//! Core traits for the messaging backend and credential storage.

use std::{path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;

use crate::{ChatId, EventSink, MessageContent};

/// Backend error.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Backend client has not been started")]
    NotStarted,
    #[error("Backend failure: {0}")]
    Failed(String),
    #[error("Backend {operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A chat the backend can deliver messages to.
#[async_trait]
pub trait Chat: Send + Sync {
    /// Send a message to this chat.
    async fn send_message(&self, content: MessageContent) -> Result<(), BackendError>;
}

/// One client handle of the messaging backend.
///
/// The handle reports lifecycle changes through the [`EventSink`] it was
/// created with.
#[async_trait]
pub trait MessagingBackend: Send + Sync {
    /// Negotiate the session.
    ///
    /// Emits zero or more QR events and at most one ready event. There is no
    /// bound on how long this takes.
    async fn connect(&self) -> Result<(), BackendError>;

    /// Tear the session down.
    async fn destroy(&self) -> Result<(), BackendError>;

    /// Look a chat up by identifier.
    async fn chat(&self, id: &ChatId) -> Result<Arc<dyn Chat>, BackendError>;
}

/// Constructs backend client handles.
pub trait BackendFactory: Send + Sync {
    /// Create a client bound to local credential storage.
    ///
    /// Must not start connecting.
    fn create(&self, events: EventSink) -> Arc<dyn MessagingBackend>;
}

/// Credential storage error.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Failed to remove credentials at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Opaque, backend-owned session credentials.
///
/// The relay never looks inside; it only asks whether they exist and wipes
/// them.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Whether credentials are currently persisted.
    async fn exists(&self) -> bool;

    /// Delete the credentials. Absence is not an error.
    async fn delete(&self) -> Result<(), CredentialError>;

    /// Human readable location, for logs.
    fn location(&self) -> String;
}
