//! Bundle loading from various sources.
//!
//! Handles loading schema bundles from files, strings, and HTTP URLs, and
//! the [`BundleSource`] abstraction used by [`Gateway::poll`].
//!
//! [`Gateway::poll`]: crate::Gateway::poll

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::LoadError;
use crate::types::SchemaBundle;

/// Default timeout for HTTP requests (10 seconds).
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Load a schema bundle from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidJson` if the file isn't a valid bundle.
pub fn load_bundle(path: &Path) -> Result<SchemaBundle, LoadError> {
    load_file(path)
}

/// Load any JSON document (variables, policy tables) from a file path.
///
/// # Errors
///
/// Same as [`load_bundle`].
pub fn load_json(path: &Path) -> Result<Value, LoadError> {
    load_file(path)
}

fn load_file<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| LoadError::InvalidJson { source })
}

/// Load a schema bundle from a JSON string.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` if the string isn't a valid bundle.
pub fn load_bundle_str(content: &str) -> Result<SchemaBundle, LoadError> {
    serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })
}

/// Load a schema bundle from an HTTP/HTTPS URL.
///
/// # Errors
///
/// Returns `LoadError::NetworkError` if the request fails or the response
/// isn't a valid bundle.
pub async fn load_bundle_url(url: &str) -> Result<SchemaBundle, LoadError> {
    let network_error = |source| LoadError::NetworkError {
        url: url.to_string(),
        source,
    };

    let client = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(network_error)?;

    let response = client.get(url).send().await.map_err(network_error)?;

    // Check for HTTP errors before parsing
    let response = response.error_for_status().map_err(network_error)?;

    response.json().await.map_err(network_error)
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load a schema bundle from a file path or URL.
///
/// Automatically detects whether the source is a URL or file path.
///
/// # Errors
///
/// Returns appropriate errors based on the source type.
pub async fn load_bundle_auto(source: &str) -> Result<SchemaBundle, LoadError> {
    if is_url(source) {
        load_bundle_url(source).await
    } else {
        read_bundle_file(Path::new(source)).await
    }
}

/// Async counterpart of [`load_bundle`], reading through `tokio::fs`.
async fn read_bundle_file(path: &Path) -> Result<SchemaBundle, LoadError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => LoadError::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => LoadError::ReadError {
                path: path.to_path_buf(),
                source,
            },
        })?;
    load_bundle_str(&content)
}

/// Somewhere a gateway can fetch the latest bundle from.
#[async_trait]
pub trait BundleSource: Send + Sync {
    async fn fetch(&self) -> Result<SchemaBundle, LoadError>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// Reads a bundle file on every fetch.
#[derive(Debug, Clone)]
pub struct FileBundleSource {
    path: PathBuf,
}

impl FileBundleSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl BundleSource for FileBundleSource {
    async fn fetch(&self) -> Result<SchemaBundle, LoadError> {
        read_bundle_file(&self.path).await
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Fetches a bundle from a registry URL on every fetch.
#[derive(Debug, Clone)]
pub struct HttpBundleSource {
    url: String,
}

impl HttpBundleSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl BundleSource for HttpBundleSource {
    async fn fetch(&self) -> Result<SchemaBundle, LoadError> {
        load_bundle_url(&self.url).await
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
