//! services/api/src/adapters/session_file.rs
//!
//! This module contains the file-backed implementation of the `SessionFlag` port.
//! The flag is "set" while the flag file exists; its content is the login time.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use study_assistant_core::ports::{PortError, PortResult, SessionFlag};
use tracing::info;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A `SessionFlag` that persists across restarts as a file on disk.
#[derive(Debug, Clone)]
pub struct FileSessionFlag {
    path: PathBuf,
}

impl FileSessionFlag {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

//=========================================================================================
// `SessionFlag` Trait Implementation
//=========================================================================================

#[async_trait]
impl SessionFlag for FileSessionFlag {
    async fn is_authenticated(&self) -> PortResult<bool> {
        tokio::fs::try_exists(&self.path)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }

    async fn login(&self) -> PortResult<()> {
        tokio::fs::write(&self.path, Utc::now().to_rfc3339())
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        info!("Session flag set at {}", self.path.display());
        Ok(())
    }

    async fn logout(&self) -> PortResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!("Session flag cleared at {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PortError::Unexpected(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn temp_flag(name: &str) -> FileSessionFlag {
        let path = std::env::temp_dir().join(format!("{}-{}", name, uuid::Uuid::new_v4()));
        FileSessionFlag::new(path)
    }

    #[tokio::test]
    #[traced_test]
    async fn login_and_logout_toggle_the_flag() {
        let flag = temp_flag("session-flag");
        assert!(!flag.is_authenticated().await.unwrap());

        flag.login().await.unwrap();
        assert!(flag.is_authenticated().await.unwrap());

        flag.logout().await.unwrap();
        assert!(!flag.is_authenticated().await.unwrap());
        assert!(logs_contain("Session flag cleared"));
    }

    #[tokio::test]
    async fn logout_without_login_is_ok() {
        let flag = temp_flag("session-flag-idle");
        assert!(flag.logout().await.is_ok());
    }
}
