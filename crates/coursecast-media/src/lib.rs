//! Coursecast Media Library
//!
//! The media ingestion and transcoding pipeline: a streaming multipart
//! uploader, an ffmpeg-based HLS transcode worker with an in-process job
//! queue, and the ingest glue that ties uploads to video records and
//! transcode jobs.

pub mod hls;
pub mod pipeline;
pub mod queue;
pub mod transcode;
pub mod uploader;

pub use hls::{EncodeError, FfmpegHls};
pub use pipeline::{IngestError, IngestPipeline, IngestReceipt};
pub use queue::TranscodeQueue;
pub use transcode::{TranscodeError, TranscodeJob, TranscodeOutput, TranscodeReport, TranscodeWorker};
pub use uploader::{
    StreamingUploader, UploadError, UploadProgress, UploadSession, UploadedObject, UploaderConfig,
};
