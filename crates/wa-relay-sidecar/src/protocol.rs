//! JSON-lines protocol spoken with the bridge process.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    sync::{Mutex, oneshot},
};
use uuid::Uuid;
use wa_relay_core::{BackendError, BackendEvent, EventSink, MessageContent};

/// Protocol error.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Bridge reported an error: {0}")]
    Remote(String),
    #[error("Bridge closed the connection")]
    Closed,
}

impl From<ProtocolError> for BackendError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Io(e) => Self::Io(e),
            other => Self::Failed(other.to_string()),
        }
    }
}

/// Request written to the bridge's stdin.
#[derive(Debug, Clone, Serialize)]
pub struct BridgeRequest {
    pub id: String,
    #[serde(flatten)]
    pub op: BridgeOp,
}

/// Operation carried by a [`BridgeRequest`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeOp {
    /// Launch the browser session and start emitting events.
    Initialize,
    /// Close the browser session.
    Destroy,
    /// Resolve a chat by id.
    GetChat { chat_id: String },
    /// Send to a chat.
    SendMessage {
        chat_id: String,
        content: WireContent,
    },
}

/// Message content as the bridge expects it.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WireContent {
    Text {
        body: String,
    },
    Media {
        mimetype: String,
        /// Base64 encoded.
        data: String,
        caption: String,
    },
}

impl From<&MessageContent> for WireContent {
    fn from(content: &MessageContent) -> Self {
        match content {
            MessageContent::Text(body) => Self::Text { body: body.clone() },
            MessageContent::Media { media, caption } => Self::Media {
                mimetype: media.mimetype.clone(),
                data: media.to_base64(),
                caption: caption.clone(),
            },
        }
    }
}

/// Line read from the bridge's stdout.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeMessage {
    /// Login challenge issued.
    Qr { qr: String },
    /// Session authenticated.
    Ready,
    /// Completion of a request.
    Response {
        id: String,
        ok: bool,
        #[serde(default)]
        error: Option<String>,
    },
    /// Diagnostic output.
    Log {
        #[serde(default)]
        level: String,
        message: String,
    },
}

type PendingMap = HashMap<String, oneshot::Sender<Result<(), String>>>;

/// Request/response correlation over the bridge's stdio.
#[derive(Clone)]
pub struct ProtocolPeer {
    writer: Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>,
    pending: Arc<Mutex<PendingMap>>,
    closed: Arc<AtomicBool>,
}

impl ProtocolPeer {
    /// Spawn a new protocol peer.
    ///
    /// This starts a background task reading `reader`; lifecycle messages go
    /// to `events`, responses complete pending requests.
    #[must_use]
    pub fn spawn<R, W>(reader: R, writer: W, events: EventSink) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let peer = Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
            pending: Arc::new(Mutex::new(HashMap::new())),
            closed: Arc::new(AtomicBool::new(false)),
        };

        let reader_peer = peer.clone();
        tokio::spawn(async move {
            if let Err(e) = reader_peer.read_loop(reader, &events).await {
                tracing::error!("Bridge reader loop error: {e}");
            }
            reader_peer.close().await;
        });

        peer
    }

    /// Whether the bridge's output stream has ended.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    async fn read_loop<R>(&self, reader: R, events: &EventSink) -> Result<(), ProtocolError>
    where
        R: AsyncRead + Unpin,
    {
        let mut reader = BufReader::new(reader);
        let mut buffer = String::new();

        loop {
            buffer.clear();
            if reader.read_line(&mut buffer).await? == 0 {
                break;
            }
            let line = buffer.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<BridgeMessage>(line) {
                Ok(BridgeMessage::Qr { qr }) => {
                    tracing::debug!("Bridge issued a QR challenge");
                    let _ = events.send(BackendEvent::qr(qr));
                }
                Ok(BridgeMessage::Ready) => {
                    tracing::debug!("Bridge reported ready");
                    let _ = events.send(BackendEvent::Ready);
                }
                Ok(BridgeMessage::Response { id, ok, error }) => {
                    let result = if ok {
                        Ok(())
                    } else {
                        Err(error.unwrap_or_else(|| "unknown bridge error".to_string()))
                    };
                    match self.pending.lock().await.remove(&id) {
                        Some(tx) => {
                            let _ = tx.send(result);
                        }
                        None => tracing::warn!("Response for unknown request {id}"),
                    }
                }
                Ok(BridgeMessage::Log { level, message }) => match level.as_str() {
                    "error" => tracing::error!(target: "wa_bridge", "{message}"),
                    "warn" => tracing::warn!(target: "wa_bridge", "{message}"),
                    "debug" => tracing::debug!(target: "wa_bridge", "{message}"),
                    _ => tracing::info!(target: "wa_bridge", "{message}"),
                },
                Err(_) => tracing::debug!(target: "wa_bridge", "{line}"),
            }
        }
        Ok(())
    }

    async fn close(&self) {
        let mut pending = self.pending.lock().await;
        self.closed.store(true, Ordering::Release);
        // Dropping the senders fails every waiter with `Closed`.
        pending.clear();
    }

    /// Send a request and wait for its response.
    ///
    /// # Errors
    /// Returns error if the write fails, the bridge reports a failure, or the
    /// bridge exits before answering.
    pub async fn request(&self, op: BridgeOp) -> Result<(), ProtocolError> {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            if self.is_closed() {
                return Err(ProtocolError::Closed);
            }
            pending.insert(id.clone(), tx);
        }

        if let Err(e) = self.send_json(&BridgeRequest { id: id.clone(), op }).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        match rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(message)) => Err(ProtocolError::Remote(message)),
            Err(_) => Err(ProtocolError::Closed),
        }
    }

    async fn send_json<T: Serialize>(&self, message: &T) -> Result<(), ProtocolError> {
        let json = serde_json::to_string(message)?;
        let mut writer = self.writer.lock().await;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }
}
