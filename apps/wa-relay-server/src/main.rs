//! REST relay in front of a single WhatsApp Web session.
//!
//! Run with: cargo run -p wa-relay-server
//!
//! Then `GET http://localhost:3000/qrcode` and scan the code with the phone.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wa_relay_core::{BackendOptions, DEFAULT_AUTH_DIR};
use wa_relay_session::{LocalCredentials, SessionConfig, SessionManager};
use wa_relay_sidecar::{CommandBuilder, DEFAULT_BRIDGE_COMMAND, SidecarConfig, SidecarFactory};

/// Relay configuration.
#[derive(Debug, Parser)]
#[command(name = "wa-relay", version, about)]
struct Config {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Address to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Directory the session credentials are kept under.
    #[arg(long, env = "WA_RELAY_AUTH_DIR", default_value = DEFAULT_AUTH_DIR)]
    auth_dir: PathBuf,

    /// Separate credentials for several relays sharing one auth dir.
    #[arg(long, env = "WA_RELAY_CLIENT_ID")]
    client_id: Option<String>,

    /// Run the browser headless with sandbox-free flags.
    #[arg(long, env = "WA_RELAY_HEADLESS", default_value_t = true, action = clap::ArgAction::Set)]
    headless: bool,

    /// Command line launching the bridge process.
    #[arg(long, env = "WA_RELAY_SIDECAR_CMD", default_value = DEFAULT_BRIDGE_COMMAND)]
    sidecar_cmd: String,

    /// Bound on backend teardown, chat lookup and send. Unbounded when unset.
    #[arg(long, env = "WA_RELAY_BACKEND_TIMEOUT_SECS")]
    backend_timeout_secs: Option<u64>,

    /// Start a new login right after a disconnect.
    #[arg(long, env = "WA_RELAY_RECONNECT")]
    reconnect: bool,
}

impl Config {
    fn backend_options(&self) -> BackendOptions {
        let mut options = BackendOptions::new(self.auth_dir.clone());
        if let Some(id) = self.client_id.as_deref().filter(|id| !id.is_empty()) {
            options = options.with_client_id(id);
        }
        if self.headless {
            options = options.headless();
        }
        options
    }

    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            backend_timeout: self.backend_timeout_secs.map(Duration::from_secs),
            reconnect_after_disconnect: self.reconnect,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::parse();
    let options = config.backend_options();

    let command = CommandBuilder::new(config.sidecar_cmd.as_str());
    command
        .build()
        .with_context(|| format!("invalid bridge command `{}`", config.sidecar_cmd))?;

    let credentials = LocalCredentials::for_backend(&options);
    let factory = SidecarFactory::new(SidecarConfig { command, options });
    let manager = Arc::new(SessionManager::new(
        factory,
        credentials,
        config.session_config(),
    ));
    manager.initialize().await;

    let app = wa_relay_http::create_router(Arc::clone(&manager));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Server running on port {}", config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Shutting down");
    manager.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["wa-relay"]).unwrap();
        assert!(config.headless);
        assert!(!config.reconnect);

        let options = config.backend_options();
        assert_eq!(options.session_dir(), PathBuf::from(".wwebjs_auth/session"));
        assert!(options.browser_args.iter().any(|a| a == "--no-sandbox"));
        assert!(config.session_config().backend_timeout.is_none());
    }

    #[test]
    fn test_flags() {
        let config = Config::try_parse_from([
            "wa-relay",
            "--port",
            "8080",
            "--client-id",
            "sales",
            "--headless",
            "false",
            "--backend-timeout-secs",
            "30",
            "--reconnect",
        ])
        .unwrap();
        assert_eq!(config.port, 8080);

        let options = config.backend_options();
        assert_eq!(
            options.session_dir(),
            PathBuf::from(".wwebjs_auth/session-sales")
        );
        assert!(options.browser_args.is_empty());

        let session = config.session_config();
        assert_eq!(session.backend_timeout, Some(Duration::from_secs(30)));
        assert!(session.reconnect_after_disconnect);
    }
}
