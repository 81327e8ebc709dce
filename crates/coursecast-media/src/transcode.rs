//! Transcode worker: download source → encode HLS ladder → publish → persist.

use bytes::Bytes;
use coursecast_core::Config;
use serde::{Deserialize, Serialize};
use coursecast_records::{RecordError, VideoAssetPatch, VideoRecordStore};
use coursecast_storage::ObjectStore;
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::hls::{FfmpegHls, MASTER_PLAYLIST};

/// One transcode job. The object store is bucket-bound at construction, so
/// the job only carries the source key and the record to update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeJob {
    pub video_id: Uuid,
    pub source_key: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    /// Source object missing or unreadable.
    #[error("Download failed: {0}")]
    DownloadFailed(String),

    /// Engine spawn error or nonzero exit.
    #[error("Encode failed: {0}")]
    EncodeFailed(String),

    /// Rendition upload failed partway. Already-uploaded renditions are
    /// left orphaned in storage; no rollback is attempted.
    #[error("Publish failed: {0}")]
    PublishFailed(String),

    /// Engine reported success but produced no master manifest.
    #[error("Encode produced no master manifest at {0}")]
    ManifestMissing(String),
}

#[derive(Debug, Clone)]
pub struct TranscodeOutput {
    pub manifest_key: String,
    pub uploaded_files: usize,
}

/// Result of one transcode run. The terminal-state persistence is a
/// separate, best-effort result the caller may choose to ignore; a persist
/// failure never fails the job itself.
#[derive(Debug)]
pub struct TranscodeReport {
    pub video_id: Uuid,
    pub outcome: Result<TranscodeOutput, TranscodeError>,
    pub persisted: Result<(), RecordError>,
}

impl TranscodeReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Produces a ready-to-stream rendition set for an uploaded source, or
/// fails cleanly leaving the video record in `Failed` with a diagnostic.
///
/// Re-running a job for the same source key is safe: the same rendition
/// prefix is re-derived and overwritten.
pub struct TranscodeWorker {
    store: Arc<dyn ObjectStore>,
    records: Arc<dyn VideoRecordStore>,
    engine: FfmpegHls,
}

impl TranscodeWorker {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        records: Arc<dyn VideoRecordStore>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            records,
            engine: FfmpegHls::new(
                config.ffmpeg_path.clone(),
                config.hls_segment_duration,
                config.renditions.clone(),
            ),
        }
    }

    /// Run the full pipeline for one job.
    ///
    /// The scratch directory is removed on every path out of this function,
    /// success or failure.
    pub async fn run(&self, job: TranscodeJob) -> TranscodeReport {
        tracing::info!(
            video_id = %job.video_id,
            source_key = %job.source_key,
            "Starting transcode job"
        );

        // Covers operator retries of a failed asset; best-effort like the
        // terminal write below.
        if let Err(e) = self
            .records
            .update(job.video_id, VideoAssetPatch::processing())
            .await
        {
            tracing::warn!(
                error = %e,
                video_id = %job.video_id,
                "Failed to mark video as processing"
            );
        }

        let outcome = self.execute(&job).await;

        let persisted = match &outcome {
            Ok(output) => {
                self.records
                    .update(job.video_id, VideoAssetPatch::ready(&output.manifest_key))
                    .await
            }
            Err(e) => {
                self.records
                    .update(job.video_id, VideoAssetPatch::failed(e.to_string()))
                    .await
            }
        };

        if let Err(e) = &persisted {
            tracing::error!(
                error = %e,
                video_id = %job.video_id,
                "Failed to persist terminal transcode state"
            );
        }

        match &outcome {
            Ok(output) => tracing::info!(
                video_id = %job.video_id,
                manifest_key = %output.manifest_key,
                uploaded_files = output.uploaded_files,
                "Transcode job completed"
            ),
            Err(e) => tracing::error!(
                video_id = %job.video_id,
                error = %e,
                "Transcode job failed"
            ),
        }

        TranscodeReport {
            video_id: job.video_id,
            outcome,
            persisted,
        }
    }

    async fn execute(&self, job: &TranscodeJob) -> Result<TranscodeOutput, TranscodeError> {
        // Private scratch arena for this job; dropped (and removed) on every
        // return path.
        let scratch = TempDir::new().map_err(|e| {
            TranscodeError::EncodeFailed(format!("Failed to create scratch directory: {}", e))
        })?;

        // The engine needs seekable input, unlike the upload path, so the
        // source is materialized as one local file first.
        let input_path = scratch.path().join(source_filename(&job.source_key));
        self.download_source(&job.source_key, &input_path).await?;

        let output_dir = scratch.path().join("hls");
        fs::create_dir_all(&output_dir).await.map_err(|e| {
            TranscodeError::EncodeFailed(format!("Failed to create output directory: {}", e))
        })?;

        let master_path = self
            .engine
            .run(&input_path, &output_dir)
            .await
            .map_err(|e| TranscodeError::EncodeFailed(e.to_string()))?;

        if !fs::try_exists(&master_path).await.unwrap_or(false) {
            return Err(TranscodeError::ManifestMissing(
                master_path.display().to_string(),
            ));
        }

        let prefix = hls_key_prefix(&job.source_key);
        self.publish(&output_dir, &prefix).await
    }

    async fn download_source(&self, source_key: &str, path: &Path) -> Result<(), TranscodeError> {
        let mut stream = self
            .store
            .get_object_stream(source_key)
            .await
            .map_err(|e| TranscodeError::DownloadFailed(e.to_string()))?;

        let mut file = fs::File::create(path)
            .await
            .map_err(|e| TranscodeError::DownloadFailed(e.to_string()))?;

        let mut bytes_copied = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| TranscodeError::DownloadFailed(e.to_string()))?;
            bytes_copied += chunk.len() as u64;
            file.write_all(&chunk)
                .await
                .map_err(|e| TranscodeError::DownloadFailed(e.to_string()))?;
        }
        file.sync_all()
            .await
            .map_err(|e| TranscodeError::DownloadFailed(e.to_string()))?;

        tracing::debug!(
            source_key = %source_key,
            size_bytes = bytes_copied,
            "Source downloaded to scratch"
        );

        Ok(())
    }

    /// Upload the whole output tree under the derived key prefix, preserving
    /// the relative directory structure, and return the master manifest key.
    async fn publish(
        &self,
        output_dir: &Path,
        prefix: &str,
    ) -> Result<TranscodeOutput, TranscodeError> {
        let mut pending = vec![output_dir.to_path_buf()];
        let mut uploaded_files = 0;
        let mut manifest_key = None;

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir)
                .await
                .map_err(|e| TranscodeError::PublishFailed(e.to_string()))?;

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| TranscodeError::PublishFailed(e.to_string()))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| TranscodeError::PublishFailed(e.to_string()))?;

                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }

                let relative = path.strip_prefix(output_dir).map_err(|e| {
                    TranscodeError::PublishFailed(format!("Output path escaped arena: {}", e))
                })?;
                let key = format!("{}/{}", prefix, relative.to_string_lossy());

                let data = fs::read(&path)
                    .await
                    .map_err(|e| TranscodeError::PublishFailed(e.to_string()))?;

                self.store
                    .put_object(&key, Bytes::from(data), content_type_for(&path))
                    .await
                    .map_err(|e| {
                        TranscodeError::PublishFailed(format!(
                            "Failed to upload {}: {}",
                            key, e
                        ))
                    })?;

                if relative == Path::new(MASTER_PLAYLIST) {
                    manifest_key = Some(key);
                }
                uploaded_files += 1;
            }
        }

        let manifest_key = manifest_key
            .ok_or_else(|| TranscodeError::ManifestMissing(MASTER_PLAYLIST.to_string()))?;

        tracing::info!(
            manifest_key = %manifest_key,
            uploaded_files = uploaded_files,
            "Rendition set published"
        );

        Ok(TranscodeOutput {
            manifest_key,
            uploaded_files,
        })
    }
}

/// Key prefix for published renditions: `{source_dir}/{source_stem}/hls`.
fn hls_key_prefix(source_key: &str) -> String {
    let path = Path::new(source_key);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("source");
    match path.parent().and_then(|p| p.to_str()).filter(|p| !p.is_empty()) {
        Some(dir) => format!("{}/{}/hls", dir, stem),
        None => format!("{}/hls", stem),
    }
}

/// Local filename for the downloaded source, keeping its extension so the
/// engine can sniff the container.
fn source_filename(source_key: &str) -> String {
    match Path::new(source_key).extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("source.{}", ext),
        None => "source".to_string(),
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("m3u8") => "application/vnd.apple.mpegurl",
        Some("ts") => "video/mp2t",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hls_key_prefix_nested() {
        assert_eq!(
            hls_key_prefix("videos/owner/1700000000000.mp4"),
            "videos/owner/1700000000000/hls"
        );
    }

    #[test]
    fn test_hls_key_prefix_bare() {
        assert_eq!(hls_key_prefix("input.mp4"), "input/hls");
    }

    #[test]
    fn test_source_filename_keeps_extension() {
        assert_eq!(source_filename("videos/a/b.mov"), "source.mov");
        assert_eq!(source_filename("videos/a/noext"), "source");
    }

    #[test]
    fn test_content_types() {
        assert_eq!(
            content_type_for(Path::new("x/master.m3u8")),
            "application/vnd.apple.mpegurl"
        );
        assert_eq!(content_type_for(Path::new("x/segment_001.ts")), "video/mp2t");
        assert_eq!(
            content_type_for(Path::new("x/other.bin")),
            "application/octet-stream"
        );
    }
}
