//! HTTP dispatcher for the WhatsApp Web relay.
//!
//! Provides:
//! - `create_router` - Axum router over a `SessionManager`
//! - Wire protocol (JSON bodies, base64 images)
//! - Error to status code mapping

pub mod error;
pub mod protocol;
pub mod routes;

pub use error::ApiError;
pub use protocol::{
    ErrorResponse, QrCodeResponse, Recipient, SendMessageRequest, StatusResponse,
    SuccessResponse,
};
pub use routes::{MAX_BODY_BYTES, create_router};
