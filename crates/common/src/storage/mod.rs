//! Object storage for manuscript files
//!
//! Blobs are keyed by path inside a single bucket. The storage service
//! accepts uploads and mints time-limited signed download URLs.

use crate::config::StorageConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use regex_lite::Regex;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Trait for object storage backends
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store a blob at `path`, replacing any existing object
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;

    /// Mint a download URL for `path` valid for `ttl`
    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<String>;

    /// Backend name for logs
    fn name(&self) -> &str;
}

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("file name pattern is valid"))
}

/// Make a client-supplied file name safe to embed in a storage path
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned = unsafe_chars().replace_all(base.trim(), "_");
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == '_');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.chars().take(120).collect()
    }
}

/// Storage path for a manuscript version file
pub fn version_path(manuscript_id: Uuid, version_id: Uuid, file_name: &str) -> String {
    format!(
        "manuscripts/{}/{}-{}",
        manuscript_id,
        version_id,
        sanitize_file_name(file_name)
    )
}

/// Storage path for the editable source document of a manuscript
pub fn word_path(manuscript_id: Uuid, file_name: &str) -> String {
    format!(
        "manuscripts/{}/source-{}",
        manuscript_id,
        sanitize_file_name(file_name)
    )
}

/// Hex-encoded SHA-256 of the blob
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Whether an upload is a PDF, by declared content type or file suffix
pub fn is_pdf(content_type: Option<&str>, file_name: Option<&str>) -> bool {
    let by_type = content_type
        .map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .eq_ignore_ascii_case(PDF_CONTENT_TYPE)
        })
        .unwrap_or(false);
    let by_name = file_name
        .map(|n| n.trim().to_ascii_lowercase().ends_with(".pdf"))
        .unwrap_or(false);
    by_type || by_name
}

// ============================================================================
// Hosted storage service
// ============================================================================

/// REST client for the hosted storage service
pub struct HttpObjectStorage {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
    bucket: String,
}

#[derive(Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

impl HttpObjectStorage {
    pub fn new(
        base_url: String,
        service_key: String,
        bucket: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create storage HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
            bucket,
        })
    }

    fn object_url(&self, action: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}{}/{}",
            self.base_url,
            action,
            self.bucket,
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl ObjectStorage for HttpObjectStorage {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let size = bytes.len();
        let response = self
            .client
            .post(self.object_url("", path))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .header("content-type", content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await
            .map_err(|e| AppError::upstream("storage", format!("Upload failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::upstream(
                "storage",
                format!("Upload error {}: {}", status, body),
            ));
        }

        tracing::debug!(path = %path, size, "Object uploaded");
        Ok(())
    }

    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<String> {
        let response = self
            .client
            .post(self.object_url("sign/", path))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .json(&serde_json::json!({ "expiresIn": ttl.as_secs() }))
            .send()
            .await
            .map_err(|e| AppError::upstream("storage", format!("Sign request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::upstream(
                "storage",
                format!("Sign error {}: {}", status, body),
            ));
        }

        let signed: SignResponse = response.json().await.map_err(|e| {
            AppError::upstream("storage", format!("Failed to parse sign response: {}", e))
        })?;

        // The service answers with a path relative to /storage/v1
        if signed.signed_url.starts_with("http") {
            Ok(signed.signed_url)
        } else {
            Ok(format!(
                "{}/storage/v1/{}",
                self.base_url,
                signed.signed_url.trim_start_matches('/')
            ))
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

// ============================================================================
// In-memory storage
// ============================================================================

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// In-process storage for tests and local runs
#[derive(Default)]
pub struct MemoryStorage {
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, path: &str) -> Option<StoredObject> {
        self.objects.read().await.get(path).cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        self.objects.write().await.insert(
            path.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<String> {
        if !self.objects.read().await.contains_key(path) {
            return Err(AppError::not_found("object", path));
        }
        Ok(format!(
            "memory://{}?token={}&expires_in={}",
            path,
            Uuid::new_v4().simple(),
            ttl.as_secs()
        ))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Create a storage backend based on configuration
pub fn create_storage(config: &StorageConfig) -> Result<Arc<dyn ObjectStorage>> {
    match config.provider.as_str() {
        "http" => {
            let base_url = config.base_url.clone().ok_or_else(|| AppError::Configuration {
                message: "storage.base_url is required for the http provider".to_string(),
            })?;
            let service_key = config.service_key.clone().ok_or_else(|| AppError::Configuration {
                message: "storage.service_key is required for the http provider".to_string(),
            })?;
            Ok(Arc::new(HttpObjectStorage::new(
                base_url,
                service_key,
                config.bucket.clone(),
                Duration::from_secs(config.timeout_secs),
            )?))
        }
        "memory" => {
            tracing::warn!("Using in-memory object storage, files are lost on restart");
            Ok(Arc::new(MemoryStorage::new()))
        }
        other => Err(AppError::Configuration {
            message: format!("Unknown storage provider: {}", other),
        }),
    }
}
