//! In-memory credential storage.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use wa_relay_core::{CredentialError, CredentialStore};

/// In-memory credential flag.
///
/// Useful for tests and for backends that keep no local state.
#[derive(Debug, Default)]
pub struct MemoryCredentials {
    present: AtomicBool,
}

impl MemoryCredentials {
    /// Create storage, optionally already holding credentials.
    #[must_use]
    pub const fn new(present: bool) -> Self {
        Self {
            present: AtomicBool::new(present),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentials {
    async fn exists(&self) -> bool {
        self.present.load(Ordering::SeqCst)
    }

    async fn delete(&self) -> Result<(), CredentialError> {
        self.present.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delete_clears_credentials() {
        assert!(!MemoryCredentials::default().exists().await);

        let creds = MemoryCredentials::new(true);
        assert!(creds.exists().await);
        tokio_test::assert_ok!(creds.delete().await);
        assert!(!creds.exists().await);
        tokio_test::assert_ok!(creds.delete().await);
    }
}
