use crate::traits::{
    ByteStream, CompletedObject, ObjectStore, PartEtag, StorageError, StorageResult,
};
use async_trait::async_trait;
use bytes::Bytes;
use coursecast_core::StorageBackend;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Directory under the base path where in-flight multipart parts are staged.
/// Keys are never allowed to start with this prefix, so an unfinished upload
/// is invisible until `complete_multipart` assembles it at its final key.
const MULTIPART_STAGING_DIR: &str = ".multipart";

/// Local filesystem object store implementation
#[derive(Clone)]
pub struct LocalObjectStore {
    base_path: PathBuf,
    base_url: String,
}

impl LocalObjectStore {
    /// Create a new LocalObjectStore instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for object storage
    /// * `base_url` - Base URL for serving objects (e.g., "http://localhost:3000/media")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalObjectStore {
            base_path,
            base_url,
        })
    }

    /// Convert a storage key to a filesystem path with traversal validation.
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        if key.contains("..") || key.starts_with('/') {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }
        if key.starts_with(MULTIPART_STAGING_DIR) {
            return Err(StorageError::InvalidKey(
                "Storage key uses a reserved prefix".to_string(),
            ));
        }

        Ok(self.base_path.join(key))
    }

    fn staging_dir(&self, upload_id: &str) -> PathBuf {
        self.base_path.join(MULTIPART_STAGING_DIR).join(upload_id)
    }

    fn part_path(&self, upload_id: &str, part_number: i32) -> PathBuf {
        self.staging_dir(upload_id)
            .join(format!("part-{:05}", part_number))
    }

    /// Generate public URL for an object key.
    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    async fn ensure_parent_dir(path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn begin_multipart(&self, key: &str, _content_type: &str) -> StorageResult<String> {
        self.key_to_path(key)?;

        let upload_id = Uuid::new_v4().simple().to_string();
        let staging = self.staging_dir(&upload_id);

        fs::create_dir_all(&staging).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to create staging directory {}: {}",
                staging.display(),
                e
            ))
        })?;

        tracing::debug!(
            key = %key,
            upload_id = %upload_id,
            "Local multipart upload opened"
        );

        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Bytes,
    ) -> StorageResult<PartEtag> {
        self.key_to_path(key)?;

        let staging = self.staging_dir(upload_id);
        if !fs::try_exists(&staging).await.unwrap_or(false) {
            return Err(StorageError::UploadFailed(format!(
                "Unknown multipart upload: {}",
                upload_id
            )));
        }

        let part_path = self.part_path(upload_id, part_number);
        let size = data.len();

        let mut file = fs::File::create(&part_path).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to create part file {}: {}",
                part_path.display(),
                e
            ))
        })?;
        file.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to write part file {}: {}",
                part_path.display(),
                e
            ))
        })?;
        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to sync part file {}: {}",
                part_path.display(),
                e
            ))
        })?;

        let etag = format!("{:x}", Sha256::digest(&data));

        tracing::debug!(
            key = %key,
            upload_id = %upload_id,
            part_number = part_number,
            size_bytes = size,
            "Local part staged"
        );

        Ok(PartEtag { part_number, etag })
    }

    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        mut parts: Vec<PartEtag>,
    ) -> StorageResult<CompletedObject> {
        let final_path = self.key_to_path(key)?;
        let staging = self.staging_dir(upload_id);

        if !fs::try_exists(&staging).await.unwrap_or(false) {
            return Err(StorageError::UploadFailed(format!(
                "Unknown multipart upload: {}",
                upload_id
            )));
        }

        parts.sort_by_key(|p| p.part_number);

        // Assemble inside the staging directory, then move into the key space
        // in one rename so a partially assembled object is never readable.
        let assembled_path = staging.join("assembled");
        let mut assembled = fs::File::create(&assembled_path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create assembly file: {}", e))
        })?;

        let mut hasher = Sha256::new();
        for part in &parts {
            let part_path = self.part_path(upload_id, part.part_number);
            let data = fs::read(&part_path).await.map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Missing part {} for upload {}: {}",
                    part.part_number, upload_id, e
                ))
            })?;
            hasher.update(&data);
            assembled.write_all(&data).await.map_err(|e| {
                StorageError::UploadFailed(format!("Failed to assemble object: {}", e))
            })?;
        }
        assembled
            .sync_all()
            .await
            .map_err(|e| StorageError::UploadFailed(format!("Failed to sync object: {}", e)))?;
        drop(assembled);

        Self::ensure_parent_dir(&final_path).await?;
        fs::rename(&assembled_path, &final_path).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to move assembled object to {}: {}",
                final_path.display(),
                e
            ))
        })?;

        fs::remove_dir_all(&staging).await.ok();

        let etag = format!("{:x}", hasher.finalize());

        tracing::info!(
            key = %key,
            upload_id = %upload_id,
            part_count = parts.len(),
            "Local multipart upload completed"
        );

        Ok(CompletedObject {
            location: self.generate_url(key),
            etag: Some(etag),
        })
    }

    async fn abort_multipart(&self, key: &str, upload_id: &str) -> StorageResult<()> {
        let staging = self.staging_dir(upload_id);

        if fs::try_exists(&staging).await.unwrap_or(false) {
            fs::remove_dir_all(&staging).await.map_err(|e| {
                StorageError::BackendError(format!(
                    "Failed to remove staging directory {}: {}",
                    staging.display(),
                    e
                ))
            })?;
        }

        tracing::info!(
            key = %key,
            upload_id = %upload_id,
            "Local multipart upload aborted"
        );

        Ok(())
    }

    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        _content_type: &str,
    ) -> StorageResult<String> {
        let path = self.key_to_path(key)?;
        let size = data.len();
        let start = std::time::Instant::now();

        Self::ensure_parent_dir(&path).await?;

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;
        file.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;
        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local put object successful"
        );

        Ok(self.generate_url(key))
    }

    async fn get_object_stream(&self, key: &str) -> StorageResult<ByteStream> {
        let path = self.key_to_path(key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(key.to_string()));
        }

        let file = fs::File::open(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to open file {}: {}", path.display(), e))
        })?;

        let stream = tokio_util::io::ReaderStream::new(file)
            .map(|result| result.map_err(|e| StorageError::DownloadFailed(e.to_string())));

        Ok(Box::pin(stream))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::info!(key = %key, "Local delete successful");

        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn content_length(&self, key: &str) -> StorageResult<u64> {
        let path = self.key_to_path(key)?;
        let meta = fs::metadata(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                StorageError::BackendError(e.to_string())
            }
        })?;
        Ok(meta.len())
    }

    fn public_url(&self, key: &str) -> String {
        self.generate_url(key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
