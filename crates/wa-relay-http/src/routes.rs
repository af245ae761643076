//! Routes and handlers.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use wa_relay_core::{BackendFactory, CredentialStore};
use wa_relay_session::{ManagerError, SessionManager};

use crate::{
    error::ApiError,
    protocol::{QrCodeResponse, SendMessageRequest, StatusResponse, SuccessResponse},
};

/// Request body limit; leaves room for inline base64 images.
pub const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

const DISCONNECT_FAILED: &str = "Failed to disconnect properly";
const SEND_FAILED: &str = "Failed to send message";

type Manager<F, C> = Arc<SessionManager<F, C>>;

/// Create the relay router.
///
/// # Example
/// ```ignore
/// let app = create_router(Arc::new(manager));
/// axum::serve(listener, app).await?;
/// ```
#[must_use]
pub fn create_router<F, C>(manager: Manager<F, C>) -> Router
where
    F: BackendFactory + 'static,
    C: CredentialStore + 'static,
{
    Router::new()
        .route("/status", get(status::<F, C>))
        .route("/qrcode", get(qrcode::<F, C>))
        .route("/disconnect", post(disconnect::<F, C>))
        .route("/send-message", post(send_message::<F, C>))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(manager)
}

async fn status<F, C>(State(manager): State<Manager<F, C>>) -> Json<StatusResponse>
where
    F: BackendFactory,
    C: CredentialStore,
{
    Json(manager.status().into())
}

async fn qrcode<F, C>(
    State(manager): State<Manager<F, C>>,
) -> Result<Json<QrCodeResponse>, ApiError>
where
    F: BackendFactory,
    C: CredentialStore,
{
    let challenge = manager
        .qr_challenge()
        .map_err(|e| ApiError::from_session(e, "Failed to read QR Code"))?;
    Ok(Json(QrCodeResponse {
        qrcode: challenge.data_uri,
    }))
}

async fn disconnect<F, C>(
    State(manager): State<Manager<F, C>>,
) -> Result<Json<SuccessResponse>, ApiError>
where
    F: BackendFactory,
    C: CredentialStore,
{
    manager
        .disconnect()
        .await
        .map_err(|e| ApiError::from_session(e, DISCONNECT_FAILED))?;
    Ok(Json(SuccessResponse::ok(
        "WhatsApp disconnected and auth data deleted",
    )))
}

async fn send_message<F, C>(
    State(manager): State<Manager<F, C>>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ApiError>
where
    F: BackendFactory,
    C: CredentialStore,
{
    // The connection check comes before any look at the body.
    if !manager.status().connected {
        return Err(ApiError::from_session(ManagerError::NotConnected, SEND_FAILED));
    }

    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return Err(ApiError::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request body too large",
            ));
        }
        Err(rejection) => {
            tracing::warn!("Unreadable send-message body: {rejection}");
            SendMessageRequest::default()
        }
    };

    let outbound = request.into_outbound().map_err(|e| {
        tracing::warn!("Invalid image_base64: {e}");
        ApiError::new(StatusCode::BAD_REQUEST, "image_base64 is not valid base64")
    })?;

    manager
        .send_message(outbound)
        .await
        .map_err(|e| ApiError::from_session(e, SEND_FAILED))?;
    Ok(Json(SuccessResponse::ok("Message sent successfully")))
}
