//! User preference storage.
//!
//! [`PreferenceStore`] is the contract the orchestrator consumes;
//! [`JsonFilePreferenceStore`] keeps everything in one JSON document on disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::model::UserMetadata;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("preference file IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("preference file {path} is not valid JSON: {source}")]
    Deserialize {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode preferences: {0}")]
    Encode(#[source] serde_json::Error),
}

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Stored search preferences, or `None` if the user never configured any.
    async fn user_metadata(&self) -> Result<Option<UserMetadata>, StoreError>;

    async fn save_user_metadata(&self, metadata: &UserMetadata) -> Result<(), StoreError>;

    async fn set_logged_in(&self, logged_in: bool) -> Result<(), StoreError>;

    async fn is_logged_in(&self) -> Result<bool, StoreError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PreferenceDocument {
    #[serde(default)]
    metadata: Option<UserMetadata>,
    #[serde(default)]
    logged_in: bool,
}

/// File-backed store. A missing file reads as an empty document.
///
/// Writes go through a sibling temp file and a rename so a crash never leaves
/// a half-written document behind.
pub struct JsonFilePreferenceStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl JsonFilePreferenceStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<PreferenceDocument, StoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PreferenceDocument::default());
            }
            Err(e) => {
                return Err(StoreError::Io {
                    path: self.path.display().to_string(),
                    source: e,
                })
            }
        };

        serde_json::from_str(&raw).map_err(|e| StoreError::Deserialize {
            path: self.path.display().to_string(),
            source: e,
        })
    }

    async fn write_document(&self, document: &PreferenceDocument) -> Result<(), StoreError> {
        let io_err = |source: std::io::Error| StoreError::Io {
            path: self.path.display().to_string(),
            source,
        };

        let body = serde_json::to_vec_pretty(document).map_err(StoreError::Encode)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}

#[async_trait]
impl PreferenceStore for JsonFilePreferenceStore {
    async fn user_metadata(&self) -> Result<Option<UserMetadata>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_document().await?.metadata)
    }

    async fn save_user_metadata(&self, metadata: &UserMetadata) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut document = self.read_document().await?;
        document.metadata = Some(metadata.clone());
        self.write_document(&document).await
    }

    async fn set_logged_in(&self, logged_in: bool) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut document = self.read_document().await?;
        document.logged_in = logged_in;
        self.write_document(&document).await?;
        tracing::debug!(logged_in, "preferences: login flag updated");
        Ok(())
    }

    async fn is_logged_in(&self) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_document().await?.logged_in)
    }
}
