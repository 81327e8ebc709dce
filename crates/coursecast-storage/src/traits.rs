//! Object store abstraction trait
//!
//! This module defines the ObjectStore trait that all storage backends must
//! implement, plus the error type shared by all storage operations.

use async_trait::async_trait;
use bytes::Bytes;
use coursecast_core::StorageBackend;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A stream of object bytes.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Receipt for one uploaded part of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartEtag {
    /// Part number (1-based). Part numbers are assigned by the caller and
    /// must be disjoint; the backend reassembles parts in part-number order.
    pub part_number: i32,
    /// ETag hash for this part, as returned by the backend.
    pub etag: String,
}

/// Descriptor returned when a multipart upload is finalized.
#[derive(Debug, Clone)]
pub struct CompletedObject {
    /// Location (URL) of the finished object.
    pub location: String,
    /// Whole-object checksum metadata, when the backend provides one.
    pub etag: Option<String>,
}

/// Object store abstraction trait
///
/// Keys are POSIX-like forward-slash paths (e.g. `videos/{owner}/{ts}.mp4`).
/// Implementations are bound to one bucket (or one base directory) at
/// construction time.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Open a multipart upload for `key` and return its upload id.
    async fn begin_multipart(&self, key: &str, content_type: &str) -> StorageResult<String>;

    /// Upload one part. Parts may be uploaded concurrently as long as their
    /// part numbers are disjoint.
    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Bytes,
    ) -> StorageResult<PartEtag>;

    /// Finalize a multipart upload. Only after this returns is the object
    /// readable at `key`.
    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<PartEtag>,
    ) -> StorageResult<CompletedObject>;

    /// Abort a multipart upload, releasing any stored parts.
    async fn abort_multipart(&self, key: &str, upload_id: &str) -> StorageResult<()>;

    /// Upload a whole object in one call. Returns the public URL.
    async fn put_object(&self, key: &str, data: Bytes, content_type: &str)
        -> StorageResult<String>;

    /// Read an object as a stream of byte chunks.
    async fn get_object_stream(&self, key: &str) -> StorageResult<ByteStream>;

    /// Delete an object by key.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Check whether an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Size in bytes of an object, if it exists.
    async fn content_length(&self, key: &str) -> StorageResult<u64>;

    /// Publicly accessible URL for an object key.
    fn public_url(&self, key: &str) -> String;

    /// The storage backend type.
    fn backend_type(&self) -> StorageBackend;
}
