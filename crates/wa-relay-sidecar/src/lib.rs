//! WhatsApp Web backend driven through a whatsapp-web.js bridge process.
//!
//! Provides:
//! - `SidecarBackend` / `SidecarFactory` - `MessagingBackend` implementation
//! - Bridge protocol types (JSON lines over stdio)
//! - Command building utilities

pub mod client;
pub mod command;
pub mod protocol;

pub use client::{SidecarBackend, SidecarChat, SidecarConfig, SidecarFactory};
pub use command::{CommandBuildError, CommandBuilder, CommandParts, DEFAULT_BRIDGE_COMMAND};
pub use protocol::{BridgeMessage, BridgeOp, BridgeRequest, ProtocolError, ProtocolPeer};
