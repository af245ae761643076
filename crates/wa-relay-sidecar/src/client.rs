//! Messaging backend backed by a bridge process.

use std::{process::Stdio, sync::Arc};

use async_trait::async_trait;
use command_group::{AsyncCommandGroup, AsyncGroupChild};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::Command,
    sync::Mutex,
};
use wa_relay_core::{
    BackendError, BackendFactory, BackendOptions, Chat, ChatId, EventSink, MessageContent,
    MessagingBackend,
};

use crate::{
    command::CommandBuilder,
    protocol::{BridgeOp, ProtocolError, ProtocolPeer},
};

/// Configuration for launching the bridge.
#[derive(Debug, Clone, Default)]
pub struct SidecarConfig {
    /// Bridge command line.
    pub command: CommandBuilder,
    /// Credential location and browser flags.
    pub options: BackendOptions,
}

/// Creates [`SidecarBackend`] handles.
#[derive(Debug, Clone, Default)]
pub struct SidecarFactory {
    config: SidecarConfig,
}

impl SidecarFactory {
    /// Create a new factory.
    #[must_use]
    pub fn new(config: SidecarConfig) -> Self {
        Self { config }
    }
}

impl BackendFactory for SidecarFactory {
    fn create(&self, events: EventSink) -> Arc<dyn MessagingBackend> {
        Arc::new(SidecarBackend::new(self.config.clone(), events))
    }
}

struct BridgeProcess {
    child: AsyncGroupChild,
    peer: ProtocolPeer,
}

impl Drop for BridgeProcess {
    fn drop(&mut self) {
        // Best-effort: the browser lives in the same process group.
        let _ = self.child.start_kill();
    }
}

/// One client handle, owning at most one bridge process.
///
/// The process is launched lazily by [`MessagingBackend::connect`].
pub struct SidecarBackend {
    config: SidecarConfig,
    events: EventSink,
    process: Mutex<Option<BridgeProcess>>,
}

impl SidecarBackend {
    /// Create a handle that reports into `events`.
    #[must_use]
    pub fn new(config: SidecarConfig, events: EventSink) -> Self {
        Self {
            config,
            events,
            process: Mutex::new(None),
        }
    }

    async fn ensure_started(&self) -> Result<ProtocolPeer, BackendError> {
        let mut process = self.process.lock().await;
        if let Some(running) = process.as_mut() {
            if matches!(running.child.try_wait(), Ok(None)) && !running.peer.is_closed() {
                return Ok(running.peer.clone());
            }
            tracing::warn!("Bridge process exited, restarting");
        }

        let running = self.spawn_process().await?;
        let peer = running.peer.clone();
        *process = Some(running);
        Ok(peer)
    }

    async fn running_peer(&self) -> Result<ProtocolPeer, BackendError> {
        self.process
            .lock()
            .await
            .as_ref()
            .map(|running| running.peer.clone())
            .ok_or(BackendError::NotStarted)
    }

    async fn spawn_process(&self) -> Result<BridgeProcess, BackendError> {
        let (program, args) = self
            .config
            .command
            .build()
            .map_err(|e| BackendError::Failed(e.to_string()))?
            .into_resolved()
            .await
            .map_err(|e| BackendError::Failed(e.to_string()))?;

        let options = &self.config.options;
        let browser_args = serde_json::to_string(&options.browser_args)
            .map_err(|e| BackendError::Failed(e.to_string()))?;

        tracing::info!(
            "Starting bridge process {} (credentials in {})",
            program.display(),
            options.session_dir().display()
        );

        let mut cmd = Command::new(&program);
        cmd.args(&args)
            .env("WA_RELAY_AUTH_DIR", &options.auth_dir)
            .env("WA_RELAY_HEADLESS", if options.headless { "1" } else { "0" })
            .env("WA_RELAY_BROWSER_ARGS", browser_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(client_id) = &options.client_id {
            cmd.env("WA_RELAY_CLIENT_ID", client_id);
        }

        let mut child = cmd.group_spawn()?;
        let (stdin, stdout, stderr) = {
            let inner = child.inner();
            (inner.stdin.take(), inner.stdout.take(), inner.stderr.take())
        };
        let (Some(stdin), Some(stdout)) = (stdin, stdout) else {
            let _ = child.start_kill();
            return Err(BackendError::Failed(
                "bridge process stdio unavailable".to_string(),
            ));
        };

        if let Some(stderr) = stderr {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::warn!(target: "wa_bridge", "{line}");
                }
            });
        }

        let peer = ProtocolPeer::spawn(stdout, stdin, self.events.clone());
        Ok(BridgeProcess { child, peer })
    }
}

#[async_trait]
impl MessagingBackend for SidecarBackend {
    async fn connect(&self) -> Result<(), BackendError> {
        let peer = self.ensure_started().await?;
        peer.request(BridgeOp::Initialize).await?;
        Ok(())
    }

    async fn destroy(&self) -> Result<(), BackendError> {
        let Some(mut running) = self.process.lock().await.take() else {
            return Ok(());
        };

        match running.peer.request(BridgeOp::Destroy).await {
            // A bridge that already went away has nothing left to tear down.
            Ok(()) | Err(ProtocolError::Closed) => {}
            Err(e) => {
                tracing::error!("Bridge failed to destroy session: {e}");
                *self.process.lock().await = Some(running);
                return Err(e.into());
            }
        }

        if let Err(e) = running.child.kill().await {
            tracing::debug!("Bridge process already gone: {e}");
        }
        tracing::info!("Bridge process stopped");
        Ok(())
    }

    async fn chat(&self, id: &ChatId) -> Result<Arc<dyn Chat>, BackendError> {
        let peer = self.running_peer().await?;
        peer.request(BridgeOp::GetChat {
            chat_id: id.to_string(),
        })
        .await?;
        Ok(Arc::new(SidecarChat {
            id: id.clone(),
            peer,
        }))
    }
}

/// Chat resolved through the bridge.
pub struct SidecarChat {
    id: ChatId,
    peer: ProtocolPeer,
}

#[async_trait]
impl Chat for SidecarChat {
    async fn send_message(&self, content: MessageContent) -> Result<(), BackendError> {
        self.peer
            .request(BridgeOp::SendMessage {
                chat_id: self.id.to_string(),
                content: (&content).into(),
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use wa_relay_core::event_channel;

    use super::*;

    fn backend() -> SidecarBackend {
        let (events, _rx) = event_channel();
        SidecarBackend::new(SidecarConfig::default(), events)
    }

    #[tokio::test]
    async fn test_destroy_before_start_is_noop() {
        tokio_test::assert_ok!(backend().destroy().await);
    }

    #[tokio::test]
    async fn test_chat_before_start_fails() {
        let result = backend().chat(&ChatId::from_number("1")).await;
        assert!(matches!(result, Err(BackendError::NotStarted)));
    }

    /// Answers every request, but refuses to tear the session down.
    #[cfg(unix)]
    const STUB_REFUSING_DESTROY: &str = r##"
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -e 's/.*"id":"\([^"]*\)".*/\1/')
  case "$line" in
    *'"type":"destroy"'*)
      printf '{"type":"response","id":"%s","ok":false,"error":"browser already closed"}\n' "$id" ;;
    *)
      printf '{"type":"response","id":"%s","ok":true}\n' "$id" ;;
  esac
done
"##;

    /// Answers the first request, then exits.
    #[cfg(unix)]
    const STUB_EXITING: &str = r##"
IFS= read -r line
id=$(printf '%s\n' "$line" | sed -e 's/.*"id":"\([^"]*\)".*/\1/')
printf '{"type":"response","id":"%s","ok":true}\n' "$id"
"##;

    #[cfg(unix)]
    fn stub_backend(dir: &tempfile::TempDir, script: &str) -> SidecarBackend {
        let path = dir.path().join("bridge.sh");
        std::fs::write(&path, script).unwrap();
        let (events, _rx) = event_channel();
        let config = SidecarConfig {
            command: CommandBuilder::new(format!("sh {}", path.display())),
            ..SidecarConfig::default()
        };
        SidecarBackend::new(config, events)
    }

    #[cfg(unix)]
    async fn bridge_pid(backend: &SidecarBackend) -> Option<u32> {
        backend.process.lock().await.as_ref().and_then(|p| p.child.id())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_destroy_keeps_bridge() {
        let dir = tempfile::tempdir().unwrap();
        let backend = stub_backend(&dir, STUB_REFUSING_DESTROY);
        tokio_test::assert_ok!(backend.connect().await);
        let pid = bridge_pid(&backend).await;
        assert!(pid.is_some());

        let result = backend.destroy().await;
        assert!(matches!(
            result,
            Err(BackendError::Failed(msg)) if msg.contains("browser already closed")
        ));

        // The same bridge is still in place and usable.
        assert_eq!(bridge_pid(&backend).await, pid);
        tokio_test::assert_ok!(backend.chat(&ChatId::from_number("1")).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exited_bridge_is_restarted() {
        let dir = tempfile::tempdir().unwrap();
        let backend = stub_backend(&dir, STUB_EXITING);
        tokio_test::assert_ok!(backend.connect().await);
        let first = bridge_pid(&backend).await;
        assert!(first.is_some());

        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            loop {
                let exited = {
                    let mut process = backend.process.lock().await;
                    let running = process.as_mut().unwrap();
                    running.peer.is_closed() && matches!(running.child.try_wait(), Ok(Some(_)))
                };
                if exited {
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        tokio_test::assert_ok!(backend.connect().await);
        let second = bridge_pid(&backend).await;
        assert!(second.is_some());
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_connect_fails_without_executable() {
        let (events, _rx) = event_channel();
        let config = SidecarConfig {
            command: CommandBuilder::new("definitely-not-a-real-binary-xyz bridge.js"),
            ..SidecarConfig::default()
        };
        let result = SidecarBackend::new(config, events).connect().await;
        assert!(matches!(result, Err(BackendError::Failed(_))));
    }
}
