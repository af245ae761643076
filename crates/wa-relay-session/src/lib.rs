//! Session state machine and credential storage for the WhatsApp Web relay.
//!
//! Provides:
//! - `SessionManager` - Own the backend client and its lifecycle
//! - `SessionMachine` - Snapshot-publishing state machine
//! - QR challenge rendering
//! - Credential storage implementations (filesystem, memory)

pub mod credentials;
pub mod manager;
pub mod qr;
pub mod state;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use credentials::LocalCredentials;
#[cfg(feature = "memory")]
pub use credentials::MemoryCredentials;
pub use manager::{ManagerError, OutboundMessage, SessionConfig, SessionManager, Status};
pub use state::{QrChallenge, SessionMachine, SessionSnapshot, SessionState, Transition};
