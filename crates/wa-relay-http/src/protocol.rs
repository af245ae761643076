//! JSON bodies of the HTTP interface.

use serde::{Deserialize, Serialize};
use wa_relay_core::MediaPayload;
use wa_relay_session::{OutboundMessage, Status};

/// `GET /status` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub connected: bool,
    pub message: String,
}

impl From<Status> for StatusResponse {
    fn from(status: Status) -> Self {
        Self {
            connected: status.connected,
            message: status.message.to_string(),
        }
    }
}

/// `GET /qrcode` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrCodeResponse {
    /// PNG data URI.
    pub qrcode: String,
}

/// Successful `POST` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

impl SuccessResponse {
    /// Create a successful response.
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Recipient as sent by clients: a string, or a bare JSON number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recipient {
    Text(String),
    Number(serde_json::Number),
}

impl From<Recipient> for String {
    fn from(recipient: Recipient) -> Self {
        match recipient {
            Recipient::Text(text) => text,
            Recipient::Number(number) => number.to_string(),
        }
    }
}

/// `POST /send-message` body.
///
/// Every field is optional at the wire level; emptiness is checked by the
/// session manager after the connection check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub number: Option<Recipient>,
    #[serde(default)]
    pub message: Option<String>,
    /// Base64 image, optionally as a data URI.
    #[serde(default)]
    pub image_base64: Option<String>,
}

impl SendMessageRequest {
    /// Convert into an outbound message.
    ///
    /// # Errors
    /// Returns error if `image_base64` is present but not valid base64.
    pub fn into_outbound(self) -> Result<OutboundMessage, base64::DecodeError> {
        let image = match self.image_base64.as_deref().map(str::trim) {
            Some(encoded) if !encoded.is_empty() => Some(MediaPayload::from_base64(encoded)?),
            _ => None,
        };
        Ok(OutboundMessage {
            recipient: self.number.map(String::from).unwrap_or_default(),
            text: self.message.unwrap_or_default(),
            image,
        })
    }
}
