//! Ingest glue: upload stream → video record → transcode job.

use bytes::Bytes;
use coursecast_core::models::VideoAsset;
use coursecast_core::UploadCategory;
use coursecast_records::{RecordError, VideoAssetPatch, VideoRecordStore};
use futures::Stream;
use std::sync::Arc;
use uuid::Uuid;

use crate::queue::TranscodeQueue;
use crate::transcode::TranscodeJob;
use crate::uploader::{StreamingUploader, UploadError, UploadedObject};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Record store error: {0}")]
    Records(#[from] RecordError),

    #[error("Failed to enqueue transcode job: {0}")]
    Enqueue(String),
}

/// What the caller gets back once the upload has completed and the
/// transcode job is enqueued.
#[derive(Debug)]
pub struct IngestReceipt {
    pub video_id: Uuid,
    pub upload: UploadedObject,
}

/// Drives a course video from inbound bytes to a queued transcode job.
///
/// The handler calling this runs in its own request-scoped task and returns
/// only after complete/abort; the transcode itself runs out-of-band.
pub struct IngestPipeline {
    uploader: StreamingUploader,
    records: Arc<dyn VideoRecordStore>,
    queue: TranscodeQueue,
}

impl IngestPipeline {
    pub fn new(
        uploader: StreamingUploader,
        records: Arc<dyn VideoRecordStore>,
        queue: TranscodeQueue,
    ) -> Self {
        Self {
            uploader,
            records,
            queue,
        }
    }

    /// Ingest one course video.
    ///
    /// The video record is created in `Uploading` as soon as the upload is
    /// opened, patched to `Processing` with its raw playback URL at
    /// completion, and patched to `Failed` if the stream or storage errors
    /// out partway.
    pub async fn ingest_video<S>(
        &self,
        creator_id: Uuid,
        course_id: Uuid,
        filename: &str,
        declared_total: Option<u64>,
        stream: S,
    ) -> Result<IngestReceipt, IngestError>
    where
        S: Stream<Item = Result<Bytes, std::io::Error>> + Unpin + Send,
    {
        let session = self
            .uploader
            .begin_upload(creator_id, filename, UploadCategory::Video, declared_total)
            .await?;

        let video_id = Uuid::new_v4();
        let asset = VideoAsset::new_uploading(
            video_id,
            creator_id,
            course_id,
            session.key().to_string(),
        );

        if let Err(e) = self.records.create(asset).await {
            session.abort("video record creation failed").await;
            return Err(e.into());
        }

        let upload = match session.consume(stream).await {
            Ok(upload) => upload,
            Err(e) => {
                // The session has already aborted its multipart upload;
                // record the failure so the access layer can explain it.
                if let Err(patch_err) = self
                    .records
                    .update(video_id, VideoAssetPatch::failed(e.to_string()))
                    .await
                {
                    tracing::warn!(
                        error = %patch_err,
                        video_id = %video_id,
                        "Failed to record upload failure"
                    );
                }
                return Err(e.into());
            }
        };

        self.records
            .update(video_id, VideoAssetPatch::uploaded(&upload.location))
            .await?;

        let job = TranscodeJob {
            video_id,
            source_key: upload.key.clone(),
        };
        self.queue
            .submit(job)
            .await
            .map_err(|e| IngestError::Enqueue(e.to_string()))?;

        tracing::info!(
            video_id = %video_id,
            key = %upload.key,
            total_bytes = upload.total_bytes,
            "Video ingested and queued for transcoding"
        );

        Ok(IngestReceipt { video_id, upload })
    }
}
