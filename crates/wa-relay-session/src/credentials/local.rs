//! Filesystem credential storage.

use std::{io::ErrorKind, path::PathBuf};

use async_trait::async_trait;
use wa_relay_core::{BackendOptions, CredentialError, CredentialStore};

/// Credentials kept by the backend in a local directory.
///
/// Deleting removes the whole directory.
#[derive(Debug, Clone)]
pub struct LocalCredentials {
    dir: PathBuf,
}

impl LocalCredentials {
    /// Credentials stored at `dir`.
    #[must_use]
    pub const fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Credentials of the client described by `options`.
    #[must_use]
    pub fn for_backend(options: &BackendOptions) -> Self {
        Self::new(options.session_dir())
    }
}

#[async_trait]
impl CredentialStore for LocalCredentials {
    async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.dir).await.unwrap_or(false)
    }

    async fn delete(&self) -> Result<(), CredentialError> {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {
                tracing::info!("Auth folder {} deleted successfully", self.dir.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CredentialError::Io {
                path: self.dir.clone(),
                source,
            }),
        }
    }

    fn location(&self) -> String {
        self.dir.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delete_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let opts = BackendOptions::new(root.path().to_path_buf()).with_client_id("test");
        let creds = LocalCredentials::for_backend(&opts);

        tokio::fs::create_dir_all(opts.session_dir().join("Default"))
            .await
            .unwrap();
        tokio::fs::write(opts.session_dir().join("Default/state"), b"opaque")
            .await
            .unwrap();
        assert!(creds.exists().await);

        tokio_test::assert_ok!(creds.delete().await);
        assert!(!creds.exists().await);
        assert!(root.path().exists());
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let root = tempfile::tempdir().unwrap();
        let creds = LocalCredentials::new(root.path().join("session"));
        assert!(!creds.exists().await);
        tokio_test::assert_ok!(creds.delete().await);
        tokio_test::assert_ok!(creds.delete().await);
    }

    #[test]
    fn test_location() {
        let creds = LocalCredentials::for_backend(&BackendOptions::default());
        assert_eq!(creds.location(), ".wwebjs_auth/session");
    }
}
