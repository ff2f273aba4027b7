//! Retrieval of the monitoring config document
//!
//! The document lives as `config.json` inside a blob container (or a local
//! directory for development). Sources hand back raw bytes; parsing belongs
//! to the caller.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use super::azure::{AzureCredential, AzureError};
use crate::core::constants::{AZURE_STORAGE_API_VERSION, AZURE_STORAGE_SCOPE, CONFIG_FILE_NAME};

#[derive(Error, Debug)]
pub enum ConfigSourceError {
    #[error("Config request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Config blob returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config location: {0}")]
    Location(String),

    #[error(transparent)]
    Azure(#[from] AzureError),
}

#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Raw bytes of `config.json`
    async fn fetch(&self) -> Result<Vec<u8>, ConfigSourceError>;

    /// Where the document is read from, without credentials
    fn describe(&self) -> String;
}

/// Pick a source for a `CONFIG_BLOB_URI` value: `http(s)://` is a blob
/// container, `file://` or anything else is a local path.
pub fn from_location(
    location: &str,
    http: reqwest::Client,
    credential: Option<Arc<AzureCredential>>,
) -> Result<Box<dyn ConfigSource>, ConfigSourceError> {
    if location.starts_with("https://") || location.starts_with("http://") {
        return Ok(Box::new(BlobConfigSource::new(http, location, credential)?));
    }
    let path = location.strip_prefix("file://").unwrap_or(location);
    if path.trim().is_empty() {
        return Err(ConfigSourceError::Location("empty location".to_string()));
    }
    Ok(Box::new(FileConfigSource::new(path)))
}

/// `config.json` in an Azure Blob container
pub struct BlobConfigSource {
    http: reqwest::Client,
    blob_url: reqwest::Url,
    credential: Option<Arc<AzureCredential>>,
}

impl BlobConfigSource {
    /// `container_uri` may carry a SAS query string; it is kept as-is.
    pub fn new(
        http: reqwest::Client,
        container_uri: &str,
        credential: Option<Arc<AzureCredential>>,
    ) -> Result<Self, ConfigSourceError> {
        let mut blob_url = reqwest::Url::parse(container_uri)
            .map_err(|e| ConfigSourceError::Location(format!("{}: {}", container_uri, e)))?;
        blob_url
            .path_segments_mut()
            .map_err(|_| ConfigSourceError::Location(container_uri.to_string()))?
            .pop_if_empty()
            .push(CONFIG_FILE_NAME);

        Ok(Self {
            http,
            blob_url,
            credential,
        })
    }
}

#[async_trait]
impl ConfigSource for BlobConfigSource {
    async fn fetch(&self) -> Result<Vec<u8>, ConfigSourceError> {
        let mut request = self.http.get(self.blob_url.clone());
        if let Some(credential) = &self.credential {
            let token = credential.token(AZURE_STORAGE_SCOPE).await?;
            request = request
                .bearer_auth(token.expose())
                .header("x-ms-version", AZURE_STORAGE_API_VERSION);
        }

        let resp = request.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ConfigSourceError::Status { status, body });
        }

        Ok(resp.bytes().await?.to_vec())
    }

    fn describe(&self) -> String {
        let mut url = self.blob_url.clone();
        url.set_query(None);
        url.to_string()
    }
}

/// `config.json` on local disk; a directory path resolves to the file inside it
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn resolved(&self) -> PathBuf {
        if self.path.is_dir() {
            self.path.join(CONFIG_FILE_NAME)
        } else {
            self.path.clone()
        }
    }
}

#[async_trait]
impl ConfigSource for FileConfigSource {
    async fn fetch(&self) -> Result<Vec<u8>, ConfigSourceError> {
        let path = self.resolved();
        tokio::fs::read(&path)
            .await
            .map_err(|source| ConfigSourceError::Io { path, source })
    }

    fn describe(&self) -> String {
        self.resolved().display().to_string()
    }
}
