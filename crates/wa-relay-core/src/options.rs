//! How a backend client is bound to local storage and launched.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default directory the backend keeps its session credentials under.
pub const DEFAULT_AUTH_DIR: &str = ".wwebjs_auth";

/// Browser flags for running inside containers without a display.
pub const HEADLESS_BROWSER_ARGS: [&str; 2] = ["--no-sandbox", "--disable-setuid-sandbox"];

/// Options a backend client is constructed with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendOptions {
    /// Root directory for persisted credentials.
    pub auth_dir: PathBuf,

    /// Distinguishes several sessions sharing one `auth_dir`.
    #[serde(default)]
    pub client_id: Option<String>,

    /// Run the automated browser without a window.
    #[serde(default)]
    pub headless: bool,

    /// Extra flags passed to the automated browser.
    #[serde(default)]
    pub browser_args: Vec<String>,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self::new(PathBuf::from(DEFAULT_AUTH_DIR))
    }
}

impl BackendOptions {
    /// Create options rooted at `auth_dir`.
    #[must_use]
    pub fn new(auth_dir: PathBuf) -> Self {
        Self {
            auth_dir,
            client_id: None,
            headless: false,
            browser_args: Vec::new(),
        }
    }

    /// Set the client id.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Run headless with the container-friendly browser flags.
    #[must_use]
    pub fn headless(mut self) -> Self {
        self.headless = true;
        for arg in HEADLESS_BROWSER_ARGS {
            if !self.browser_args.iter().any(|a| a == arg) {
                self.browser_args.push(arg.to_string());
            }
        }
        self
    }

    /// Directory holding this client's credentials.
    ///
    /// `<auth_dir>/session` or `<auth_dir>/session-<client_id>`.
    #[must_use]
    pub fn session_dir(&self) -> PathBuf {
        match self.client_id.as_deref() {
            Some(id) if !id.is_empty() => self.auth_dir.join(format!("session-{id}")),
            _ => self.auth_dir.join("session"),
        }
    }
}
