//! Core abstractions for the WhatsApp Web relay.
//!
//! This crate provides the fundamental building blocks:
//! - `MessagingBackend` / `Chat` - The capability interface of the backend
//! - `BackendEvent` - Lifecycle events emitted by a backend client
//! - `ChatId`, `MessageContent`, `MediaPayload` - Outbound message values
//! - `BackendOptions` - How a backend client is bound to local storage
//! - `CredentialStore` - Exists/delete contract over session credentials

pub mod event;
pub mod message;
pub mod options;
pub mod traits;

pub use event::{BackendEvent, EventSink, EventStream, event_channel};
pub use message::{CHAT_SUFFIX, ChatId, MediaPayload, MessageContent};
pub use options::{BackendOptions, DEFAULT_AUTH_DIR};
pub use traits::{
    BackendError, BackendFactory, Chat, CredentialError, CredentialStore, MessagingBackend,
};
