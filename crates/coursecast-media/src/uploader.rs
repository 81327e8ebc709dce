//! Streaming multipart uploader.
//!
//! Consumes an inbound byte stream and forwards it to the object store's
//! multipart API as parts arrive, so the payload never resides in process
//! memory or on local disk in full. Parts are dispatched concurrently under
//! a semaphore bound with disjoint ascending part numbers; the store
//! reassembles them, so part writers need no mutual exclusion.

use bytes::{Bytes, BytesMut};
use chrono::Utc;
use coursecast_core::{UploadCategory, UploadValidator, ValidationError};
use coursecast_storage::{ObjectStore, PartEtag, StorageError};
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// Rejected before any bytes were forwarded to the object store.
    #[error("Upload rejected: {0}")]
    Rejected(#[from] ValidationError),

    /// Transport or storage failure during streaming. The multipart upload
    /// has been aborted; `bytes_transferred` is the partial count for
    /// diagnostics.
    #[error("Upload failed after {bytes_transferred} bytes: {message}")]
    Failed {
        bytes_transferred: u64,
        message: String,
    },
}

/// Ephemeral progress for one live upload session. Never persisted.
#[derive(Debug, Clone, Copy)]
pub struct UploadProgress {
    pub bytes_transferred: u64,
    /// Declared total, when the transport announced a content length.
    pub bytes_total: Option<u64>,
}

/// Durable descriptor returned by a completed upload.
#[derive(Debug, Clone)]
pub struct UploadedObject {
    pub key: String,
    pub location: String,
    pub total_bytes: u64,
    pub content_type: &'static str,
    pub etag: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UploaderConfig {
    /// Bytes buffered before a part is dispatched. Must satisfy the
    /// backend's minimum part size (5 MiB on S3) for all but the last part.
    pub part_size: usize,
    pub max_concurrent_parts: usize,
    /// Emission cadence for uploads with no declared total.
    pub progress_byte_cadence: u64,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            part_size: 8 * 1024 * 1024,
            max_concurrent_parts: 4,
            progress_byte_cadence: 32 * 1024 * 1024,
        }
    }
}

impl UploaderConfig {
    pub fn from_config(config: &coursecast_core::Config) -> Self {
        Self {
            part_size: config.upload_part_size,
            max_concurrent_parts: config.max_concurrent_parts,
            progress_byte_cadence: config.progress_byte_cadence,
        }
    }
}

/// Decides when a progress observation should be emitted.
///
/// With a declared total, emits whenever the cumulative percentage crosses a
/// 10-point boundary relative to the last emission; without one, emits every
/// `byte_cadence` bytes. Either way the observation count is O(1) per
/// upload.
#[derive(Debug)]
struct ProgressTracker {
    bytes_total: Option<u64>,
    byte_cadence: u64,
    last_percent: u64,
    last_bytes: u64,
}

#[derive(Debug, PartialEq)]
enum ProgressObservation {
    Percent(u64),
    Bytes(u64),
}

impl ProgressTracker {
    fn new(bytes_total: Option<u64>, byte_cadence: u64) -> Self {
        Self {
            bytes_total,
            byte_cadence,
            last_percent: 0,
            last_bytes: 0,
        }
    }

    fn observe(&mut self, bytes_transferred: u64) -> Option<ProgressObservation> {
        match self.bytes_total {
            Some(total) if total > 0 => {
                let percent = (bytes_transferred.saturating_mul(100) / total).min(100);
                if percent / 10 > self.last_percent / 10 {
                    self.last_percent = percent;
                    Some(ProgressObservation::Percent(percent))
                } else {
                    None
                }
            }
            _ => {
                if bytes_transferred - self.last_bytes >= self.byte_cadence {
                    self.last_bytes = bytes_transferred;
                    Some(ProgressObservation::Bytes(bytes_transferred))
                } else {
                    None
                }
            }
        }
    }
}

/// Streaming multipart uploader.
pub struct StreamingUploader {
    store: Arc<dyn ObjectStore>,
    validator: UploadValidator,
    config: UploaderConfig,
}

impl StreamingUploader {
    pub fn new(store: Arc<dyn ObjectStore>, config: UploaderConfig) -> Self {
        Self {
            store,
            validator: UploadValidator::new(),
            config,
        }
    }

    /// Validate the declared file and open a multipart upload.
    ///
    /// Validation happens before any object store call, so rejected content
    /// never pays upload cost. The destination key is
    /// `{category}/{owner_id}/{timestamp_millis}.{ext}`.
    pub async fn begin_upload(
        &self,
        owner_id: Uuid,
        filename: &str,
        category: UploadCategory,
        declared_total: Option<u64>,
    ) -> Result<UploadSession, UploadError> {
        let validated = self.validator.validate(filename, category)?;

        let key = format!(
            "{}/{}/{}.{}",
            category.key_prefix(),
            owner_id,
            Utc::now().timestamp_millis(),
            validated.extension
        );

        let upload_id = self
            .store
            .begin_multipart(&key, validated.content_type)
            .await
            .map_err(|e| UploadError::Failed {
                bytes_transferred: 0,
                message: e.to_string(),
            })?;

        tracing::info!(
            key = %key,
            filename = %filename,
            content_type = %validated.content_type,
            declared_total = ?declared_total,
            "Upload session opened"
        );

        Ok(UploadSession {
            store: self.store.clone(),
            key,
            upload_id,
            content_type: validated.content_type,
            part_size: self.config.part_size,
            semaphore: Arc::new(Semaphore::new(self.config.max_concurrent_parts)),
            buffer: BytesMut::with_capacity(self.config.part_size),
            next_part_number: 1,
            in_flight: Vec::new(),
            completed_parts: Vec::new(),
            bytes_transferred: 0,
            declared_total,
            progress: ProgressTracker::new(declared_total, self.config.progress_byte_cadence),
            finished: false,
        })
    }

    /// Drive a whole byte stream through one upload: begin, forward every
    /// chunk, complete. Any stream or storage error aborts the multipart
    /// upload before the error is returned.
    pub async fn upload_stream<S>(
        &self,
        owner_id: Uuid,
        filename: &str,
        category: UploadCategory,
        declared_total: Option<u64>,
        stream: S,
    ) -> Result<UploadedObject, UploadError>
    where
        S: Stream<Item = Result<Bytes, std::io::Error>> + Unpin + Send,
    {
        let session = self
            .begin_upload(owner_id, filename, category, declared_total)
            .await?;
        session.consume(stream).await
    }
}

/// One live multipart upload.
///
/// Dropping an unfinished session (e.g. a cancelled request task) aborts the
/// multipart upload in the background, so client disconnects cannot leak
/// server-side parts.
pub struct UploadSession {
    store: Arc<dyn ObjectStore>,
    key: String,
    upload_id: String,
    content_type: &'static str,
    part_size: usize,
    semaphore: Arc<Semaphore>,
    buffer: BytesMut,
    next_part_number: i32,
    in_flight: Vec<JoinHandle<Result<PartEtag, StorageError>>>,
    completed_parts: Vec<PartEtag>,
    bytes_transferred: u64,
    declared_total: Option<u64>,
    progress: ProgressTracker,
    finished: bool,
}

impl UploadSession {
    /// Destination key of this upload.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current progress snapshot.
    pub fn progress(&self) -> UploadProgress {
        UploadProgress {
            bytes_transferred: self.bytes_transferred,
            bytes_total: self.declared_total,
        }
    }

    /// Forward a chunk of the inbound stream.
    ///
    /// Suspends when `max_concurrent_parts` part writes are in flight
    /// (backpressure from the storage calls). On any storage failure the
    /// upload is aborted before the error is returned.
    pub async fn write_chunk(&mut self, data: &[u8]) -> Result<(), UploadError> {
        self.buffer.extend_from_slice(data);
        self.bytes_transferred += data.len() as u64;

        while self.buffer.len() >= self.part_size {
            let part = self.buffer.split_to(self.part_size).freeze();
            if let Err(e) = self.dispatch_part(part).await {
                return Err(self.fail(e).await);
            }
        }

        if let Some(observation) = self.progress.observe(self.bytes_transferred) {
            self.emit_progress(observation);
        }

        Ok(())
    }

    /// Finalize the upload and return the durable descriptor.
    pub async fn complete(mut self) -> Result<UploadedObject, UploadError> {
        // Flush the tail part (may be under the minimum size; backends allow
        // that for the final part). A zero-byte upload still needs one part.
        if !self.buffer.is_empty() || self.next_part_number == 1 {
            let part = self.buffer.split().freeze();
            if let Err(e) = self.dispatch_part(part).await {
                return Err(self.fail(e).await);
            }
        }

        for handle in std::mem::take(&mut self.in_flight) {
            match handle.await {
                Ok(Ok(etag)) => self.completed_parts.push(etag),
                Ok(Err(e)) => return Err(self.fail(e).await),
                Err(e) => {
                    return Err(self
                        .fail(StorageError::UploadFailed(format!(
                            "part upload task failed: {}",
                            e
                        )))
                        .await)
                }
            }
        }

        let mut parts = std::mem::take(&mut self.completed_parts);
        parts.sort_by_key(|p| p.part_number);

        let completed = match self
            .store
            .complete_multipart(&self.key, &self.upload_id, parts)
            .await
        {
            Ok(completed) => completed,
            Err(e) => return Err(self.fail(e).await),
        };

        self.finished = true;

        tracing::info!(
            key = %self.key,
            total_bytes = self.bytes_transferred,
            percent = 100u64,
            "Upload completed"
        );

        Ok(UploadedObject {
            key: self.key.clone(),
            location: completed.location,
            total_bytes: self.bytes_transferred,
            content_type: self.content_type,
            etag: completed.etag,
        })
    }

    /// Abort the upload, releasing any server-side partial parts.
    pub async fn abort(mut self, cause: &str) {
        self.abort_inner(cause).await;
    }

    /// Drive a byte stream through this session to completion.
    pub async fn consume<S>(mut self, mut stream: S) -> Result<UploadedObject, UploadError>
    where
        S: Stream<Item = Result<Bytes, std::io::Error>> + Unpin + Send,
    {
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => self.write_chunk(&bytes).await?,
                Err(e) => {
                    let error = self
                        .fail(StorageError::UploadFailed(format!(
                            "stream read error: {}",
                            e
                        )))
                        .await;
                    return Err(error);
                }
            }
        }
        self.complete().await
    }

    async fn dispatch_part(&mut self, data: Bytes) -> Result<(), StorageError> {
        // Surface any already-failed part before dispatching more work.
        self.reap_finished().await?;

        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| StorageError::UploadFailed(format!("part semaphore closed: {}", e)))?;

        let store = self.store.clone();
        let key = self.key.clone();
        let upload_id = self.upload_id.clone();
        let part_number = self.next_part_number;
        self.next_part_number += 1;

        self.in_flight.push(tokio::spawn(async move {
            let _permit = permit;
            store.upload_part(&key, &upload_id, part_number, data).await
        }));

        Ok(())
    }

    async fn reap_finished(&mut self) -> Result<(), StorageError> {
        let mut index = 0;
        while index < self.in_flight.len() {
            if self.in_flight[index].is_finished() {
                let handle = self.in_flight.swap_remove(index);
                match handle.await {
                    Ok(Ok(etag)) => self.completed_parts.push(etag),
                    Ok(Err(e)) => return Err(e),
                    Err(e) => {
                        return Err(StorageError::UploadFailed(format!(
                            "part upload task failed: {}",
                            e
                        )))
                    }
                }
            } else {
                index += 1;
            }
        }
        Ok(())
    }

    /// Abort and convert a storage error into the caller-facing failure with
    /// the partial byte count attached.
    async fn fail(&mut self, error: StorageError) -> UploadError {
        let message = error.to_string();
        self.abort_inner(&message).await;
        UploadError::Failed {
            bytes_transferred: self.bytes_transferred,
            message,
        }
    }

    async fn abort_inner(&mut self, cause: &str) {
        if self.finished {
            return;
        }
        self.finished = true;

        for handle in self.in_flight.drain(..) {
            handle.abort();
        }

        if let Err(e) = self.store.abort_multipart(&self.key, &self.upload_id).await {
            tracing::error!(
                error = %e,
                key = %self.key,
                upload_id = %self.upload_id,
                "Failed to abort multipart upload"
            );
        } else {
            tracing::warn!(
                key = %self.key,
                cause = %cause,
                bytes_transferred = self.bytes_transferred,
                "Upload aborted"
            );
        }
    }

    fn emit_progress(&self, observation: ProgressObservation) {
        match observation {
            ProgressObservation::Percent(percent) => {
                tracing::info!(
                    key = %self.key,
                    bytes_transferred = self.bytes_transferred,
                    bytes_total = ?self.declared_total,
                    percent = percent,
                    "Upload progress"
                );
            }
            ProgressObservation::Bytes(bytes) => {
                tracing::info!(
                    key = %self.key,
                    bytes_transferred = bytes,
                    "Upload progress"
                );
            }
        }
    }
}

impl Drop for UploadSession {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        // Cancelled task: the request future was dropped mid-stream. Abort
        // the multipart upload out-of-band so partial parts are released.
        for handle in self.in_flight.drain(..) {
            handle.abort();
        }
        let store = self.store.clone();
        let key = std::mem::take(&mut self.key);
        let upload_id = std::mem::take(&mut self.upload_id);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = store.abort_multipart(&key, &upload_id).await {
                        tracing::error!(
                            error = %e,
                            key = %key,
                            "Failed to abort multipart upload of dropped session"
                        );
                    } else {
                        tracing::warn!(
                            key = %key,
                            "Upload session dropped before completion, multipart upload aborted"
                        );
                    }
                });
            }
            Err(_) => {
                tracing::error!(
                    key = %key,
                    upload_id = %upload_id,
                    "Upload session dropped outside a runtime; multipart upload may leak"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percent_boundaries() {
        let mut tracker = ProgressTracker::new(Some(1000), 32);

        assert_eq!(tracker.observe(50), None); // 5%
        assert_eq!(tracker.observe(120), Some(ProgressObservation::Percent(12)));
        assert_eq!(tracker.observe(180), None); // still in the 10s
        assert_eq!(tracker.observe(350), Some(ProgressObservation::Percent(35)));
        assert_eq!(tracker.observe(990), Some(ProgressObservation::Percent(99)));
    }

    #[test]
    fn test_progress_bounded_observation_count() {
        let total = 10_000_000u64;
        let mut tracker = ProgressTracker::new(Some(total), 32);
        let mut observations = 0;
        let mut transferred = 0;
        while transferred < total {
            transferred += 1017; // odd chunk size
            if tracker.observe(transferred.min(total)).is_some() {
                observations += 1;
            }
        }
        // One per 10-point boundary, at most
        assert!(observations <= 10, "got {} observations", observations);
    }

    #[test]
    fn test_progress_unknown_total_uses_byte_cadence() {
        let mut tracker = ProgressTracker::new(None, 100);

        assert_eq!(tracker.observe(40), None);
        assert_eq!(tracker.observe(99), None);
        assert_eq!(tracker.observe(150), Some(ProgressObservation::Bytes(150)));
        assert_eq!(tracker.observe(200), None);
        assert_eq!(tracker.observe(260), Some(ProgressObservation::Bytes(260)));
    }

    #[test]
    fn test_progress_percent_clamped_at_100() {
        let mut tracker = ProgressTracker::new(Some(100), 32);
        assert_eq!(
            tracker.observe(250),
            Some(ProgressObservation::Percent(100))
        );
    }
}
