//! Object storage for downloaded videos
//! Uses Apache Arrow object_store crate against any S3-compatible endpoint

use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::{
    Attribute, Attributes, MultipartUpload, ObjectStore, PutMultipartOpts, PutPayload, PutResult,
    path::Path as StoragePath,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::config::StorageConfig;

/// Parts uploaded concurrently while streaming a file
const MAX_INFLIGHT_PARTS: usize = 2;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage not configured, missing: {}", .0.join(", "))]
    NotConfigured(Vec<&'static str>),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Upload timed out after {0:?}")]
    Timeout(Duration),

    #[error("Cannot read local file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Metadata returned after upload
#[derive(Debug, Clone)]
pub struct UploadMetadata {
    pub key: String,
    pub etag: Option<String>,
    pub size: u64,
}

/// Pushes a local file to remote storage
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Upload `path` under `remote_name`, defaulting to the file's basename
    async fn upload(&self, path: &Path, remote_name: Option<&str>) -> Result<UploadMetadata>;
}

#[derive(Clone)]
enum Backend {
    Ready {
        store: Arc<dyn ObjectStore>,
        bucket: String,
    },
    Unconfigured {
        missing: Vec<&'static str>,
    },
}

/// Storage client wrapping object_store
#[derive(Clone)]
pub struct StorageClient {
    backend: Backend,
    key_prefix: Option<String>,
    content_type: String,
    part_size: usize,
    upload_timeout: Duration,
}

impl StorageClient {
    /// Create new storage client with any object_store backend
    pub fn new(store: Arc<dyn ObjectStore>, bucket: String) -> Self {
        let defaults = StorageConfig::default();
        let upload_timeout = defaults.upload_timeout();
        Self {
            backend: Backend::Ready { store, bucket },
            key_prefix: None,
            content_type: defaults.content_type,
            part_size: defaults.part_size,
            upload_timeout,
        }
    }

    /// Create in-memory storage for testing/development
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(object_store::memory::InMemory::new()),
            "vidferry-local".to_string(),
        )
    }

    /// Build an S3 client from configuration
    ///
    /// Missing settings do not fail here: the client is returned unconfigured
    /// and every upload is refused before touching the network.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let missing = config.missing_settings();

        let backend = match (
            missing.is_empty(),
            &config.endpoint,
            &config.access_key,
            &config.secret_key,
            &config.bucket,
        ) {
            (true, Some(endpoint), Some(access_key), Some(secret_key), Some(bucket)) => {
                let store = AmazonS3Builder::new()
                    .with_endpoint(endpoint)
                    .with_allow_http(endpoint.starts_with("http://"))
                    .with_access_key_id(access_key)
                    .with_secret_access_key(secret_key)
                    .with_bucket_name(bucket)
                    .with_region(&config.region)
                    .build()?;

                tracing::info!(%endpoint, %bucket, "Object storage configured");
                Backend::Ready {
                    store: Arc::new(store),
                    bucket: bucket.clone(),
                }
            }
            _ => {
                tracing::warn!(missing = ?missing, "Object storage credentials not configured");
                Backend::Unconfigured { missing }
            }
        };

        Ok(Self {
            backend,
            key_prefix: config.key_prefix.clone().filter(|p| !p.is_empty()),
            content_type: config.content_type.clone(),
            part_size: config.part_size,
            upload_timeout: config.upload_timeout(),
        })
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    pub fn is_configured(&self) -> bool {
        matches!(self.backend, Backend::Ready { .. })
    }

    pub fn bucket(&self) -> Option<&str> {
        match &self.backend {
            Backend::Ready { bucket, .. } => Some(bucket),
            Backend::Unconfigured { .. } => None,
        }
    }

    /// Object key for a local file
    pub fn object_key(&self, path: &Path, remote_name: Option<&str>) -> Result<String> {
        let name = match remote_name {
            Some(name) => name.to_string(),
            None => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    StorageError::UploadFailed(format!("no file name in {}", path.display()))
                })?,
        };

        Ok(match &self.key_prefix {
            Some(prefix) => format!("{prefix}{name}"),
            None => name,
        })
    }

    /// Stream a local file into storage as a multipart upload
    ///
    /// Parts are invisible until the upload completes. Any error or the
    /// upload deadline, including during completion, aborts the upload, so no
    /// partial object is left behind under `key`.
    pub async fn upload_file(
        &self,
        path: &Path,
        remote_name: Option<&str>,
    ) -> Result<UploadMetadata> {
        let (store, bucket) = match &self.backend {
            Backend::Ready { store, bucket } => (store, bucket),
            Backend::Unconfigured { missing } => {
                tracing::error!(missing = ?missing, "Storage credentials not configured");
                return Err(StorageError::NotConfigured(missing.clone()));
            }
        };

        let key = self.object_key(path, remote_name)?;
        let location = StoragePath::from(key.as_str());
        let deadline = Instant::now() + self.upload_timeout;

        tracing::info!(%key, %bucket, "Uploading to storage");

        let mut file = tokio::fs::File::open(path).await?;

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, self.content_type.clone().into());
        let opts = PutMultipartOpts {
            attributes,
            ..Default::default()
        };

        let mut upload = store.put_multipart_opts(&location, opts).await?;
        let (size, put_result) = upload_or_abort(
            &mut file,
            upload.as_mut(),
            self.part_size,
            deadline,
            self.upload_timeout,
            &key,
        )
        .await?;

        tracing::info!(%key, %bucket, size, "Uploaded to storage");

        Ok(UploadMetadata {
            key,
            etag: put_result.e_tag,
            size,
        })
    }

    /// Download from storage
    #[cfg(test)]
    pub async fn download(&self, key: &str) -> Result<Vec<u8>> {
        let store = self.store()?;
        let result = store.get(&StoragePath::from(key)).await?;
        let bytes = result.bytes().await?;

        tracing::debug!(key, size = bytes.len(), "Downloaded from storage");

        Ok(bytes.to_vec())
    }

    /// Content type recorded for `key`
    #[cfg(test)]
    pub async fn content_type_of(&self, key: &str) -> Result<Option<String>> {
        let store = self.store()?;
        let result = store.get(&StoragePath::from(key)).await?;

        Ok(result
            .attributes
            .get(&Attribute::ContentType)
            .map(|value| AsRef::<str>::as_ref(value).to_string()))
    }

    /// Check if key exists
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let store = self.store()?;

        match store.head(&StoragePath::from(key)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self) -> Result<&Arc<dyn ObjectStore>> {
        match &self.backend {
            Backend::Ready { store, .. } => Ok(store),
            Backend::Unconfigured { missing } => Err(StorageError::NotConfigured(missing.clone())),
        }
    }
}

#[async_trait]
impl Uploader for StorageClient {
    async fn upload(&self, path: &Path, remote_name: Option<&str>) -> Result<UploadMetadata> {
        self.upload_file(path, remote_name).await
    }
}

/// Drive `upload` to completion before `deadline`, aborting it on any failure
async fn upload_or_abort(
    file: &mut tokio::fs::File,
    upload: &mut dyn MultipartUpload,
    part_size: usize,
    deadline: Instant,
    timeout: Duration,
    key: &str,
) -> Result<(u64, PutResult)> {
    let driven = tokio::time::timeout_at(deadline, send_parts(file, &mut *upload, part_size))
        .await
        .unwrap_or(Err(StorageError::Timeout(timeout)));

    if driven.is_err() {
        if let Err(e) = upload.abort().await {
            tracing::warn!(key, error = %e, "Failed to abort multipart upload");
        } else {
            tracing::info!(key, "Aborted multipart upload");
        }
    }

    driven
}

async fn send_parts(
    file: &mut tokio::fs::File,
    upload: &mut dyn MultipartUpload,
    part_size: usize,
) -> Result<(u64, PutResult)> {
    let mut buf = vec![0u8; part_size];
    let mut parts = JoinSet::new();
    let mut total = 0u64;

    loop {
        let read = fill_part(file, &mut buf).await?;
        if read == 0 {
            break;
        }

        while parts.len() >= MAX_INFLIGHT_PARTS {
            join_part(&mut parts).await?;
        }
        let payload = PutPayload::from(Bytes::copy_from_slice(&buf[..read]));
        parts.spawn(upload.put_part(payload));
        total += read as u64;

        if read < part_size {
            break;
        }
    }

    while !parts.is_empty() {
        join_part(&mut parts).await?;
    }

    let put_result = upload.complete().await?;
    Ok((total, put_result))
}

/// Read until `buf` is full or the file ends; every part but the last is full size
async fn fill_part(file: &mut tokio::fs::File, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let read = file.read(&mut buf[filled..]).await?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(filled)
}

async fn join_part(parts: &mut JoinSet<object_store::Result<()>>) -> Result<()> {
    match parts.join_next().await {
        Some(Ok(part)) => Ok(part?),
        Some(Err(e)) => Err(StorageError::UploadFailed(e.to_string())),
        None => Ok(()),
    }
}
