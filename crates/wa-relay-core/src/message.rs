//! Outbound message values.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Domain suffix the backend uses for individual chats.
pub const CHAT_SUFFIX: &str = "@c.us";

/// Mimetype assumed when the payload's format cannot be recognised.
const DEFAULT_IMAGE_MIMETYPE: &str = "image/png";

/// Backend-side chat identifier (`<number>@c.us`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(String);

impl ChatId {
    /// Resolve a phone-number-like handle to a chat identifier.
    #[must_use]
    pub fn from_number(number: &str) -> Self {
        Self(format!("{}{CHAT_SUFFIX}", number.trim()))
    }

    /// The raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inline media attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPayload {
    /// MIME type of `data`.
    pub mimetype: String,
    /// Raw (decoded) bytes.
    pub data: Bytes,
}

impl MediaPayload {
    /// Create a payload from raw bytes, sniffing the image mimetype.
    #[must_use]
    pub fn image(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let mimetype = sniff_image_mimetype(&data)
            .unwrap_or(DEFAULT_IMAGE_MIMETYPE)
            .to_string();
        Self { mimetype, data }
    }

    /// Decode a base64 image, optionally wrapped in a `data:<mime>;base64,` URI.
    ///
    /// # Errors
    /// Returns error if the payload is not valid base64.
    pub fn from_base64(input: &str) -> Result<Self, base64::DecodeError> {
        let input = input.trim();
        let (declared, encoded) = match input.strip_prefix("data:") {
            Some(rest) => match rest.split_once(',') {
                Some((header, body)) => (
                    header.strip_suffix(";base64").filter(|m| !m.is_empty()),
                    body,
                ),
                None => (None, rest),
            },
            None => (None, input),
        };

        let mut payload = Self::image(BASE64.decode(encoded)?);
        if let Some(mimetype) = declared {
            payload.mimetype = mimetype.to_string();
        }
        Ok(payload)
    }

    /// Encode the bytes as standard base64.
    #[must_use]
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.data)
    }
}

/// What gets sent to a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    /// Plain text.
    Text(String),
    /// Media with a caption; one backend send, never two.
    Media {
        media: MediaPayload,
        caption: String,
    },
}

impl MessageContent {
    /// Whether this carries an attachment.
    #[must_use]
    pub const fn is_media(&self) -> bool {
        matches!(self, Self::Media { .. })
    }
}

fn sniff_image_mimetype(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_id_appends_suffix() {
        let id = ChatId::from_number("5511999999999");
        assert_eq!(id.as_str(), "5511999999999@c.us");
        assert_eq!(id.to_string(), "5511999999999@c.us");
    }

    #[test]
    fn test_media_sniffs_jpeg() {
        let jpeg = BASE64.encode([0xFF, 0xD8, 0xFF, 0xE0, 0x00]);
        let media = MediaPayload::from_base64(&jpeg).unwrap();
        assert_eq!(media.mimetype, "image/jpeg");
        assert_eq!(media.data.len(), 5);
    }

    #[test]
    fn test_media_defaults_to_png() {
        let media = MediaPayload::from_base64("aGVsbG8=").unwrap();
        assert_eq!(media.mimetype, "image/png");
        assert_eq!(&media.data[..], b"hello");
    }

    #[test]
    fn test_media_accepts_data_uri() {
        let media = MediaPayload::from_base64("data:image/gif;base64,aGVsbG8=").unwrap();
        assert_eq!(media.mimetype, "image/gif");
        assert_eq!(&media.data[..], b"hello");
    }

    #[test]
    fn test_media_rejects_garbage() {
        assert!(MediaPayload::from_base64("not base64!!").is_err());
    }

    #[test]
    fn test_content_media_flag() {
        let content = MessageContent::Media {
            media: MediaPayload::image(Bytes::from_static(b"x")),
            caption: "look".to_string(),
        };
        assert!(content.is_media());
        assert!(!MessageContent::Text("hi".into()).is_media());
    }
}
