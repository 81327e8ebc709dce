use async_trait::async_trait;
use coursecast_core::models::{AssetState, CoursePolicy, VideoAsset};
use thiserror::Error;
use uuid::Uuid;

/// Record store operation errors
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    #[error("Record store error: {0}")]
    Backend(String),
}

pub type RecordResult<T> = Result<T, RecordError>;

/// Partial-field update for a video record: only named fields change.
///
/// Terminal-state patches keep the asset invariants coupled: applying
/// `Ready` clears any prior error detail, applying `Failed` clears the
/// rendition manifest key.
#[derive(Debug, Clone, Default)]
pub struct VideoAssetPatch {
    pub state: Option<AssetState>,
    pub rendition_manifest_key: Option<String>,
    pub raw_playback_url: Option<String>,
    pub error_detail: Option<String>,
}

impl VideoAssetPatch {
    /// Upload finished: record the direct-playable URL and hand the asset
    /// to the transcode stage.
    pub fn uploaded(raw_playback_url: impl Into<String>) -> Self {
        Self {
            state: Some(AssetState::Processing),
            raw_playback_url: Some(raw_playback_url.into()),
            ..Default::default()
        }
    }

    /// A transcode run is starting (also used by operator retries of a
    /// failed asset).
    pub fn processing() -> Self {
        Self {
            state: Some(AssetState::Processing),
            ..Default::default()
        }
    }

    /// Transcode succeeded.
    pub fn ready(rendition_manifest_key: impl Into<String>) -> Self {
        Self {
            state: Some(AssetState::Ready),
            rendition_manifest_key: Some(rendition_manifest_key.into()),
            ..Default::default()
        }
    }

    /// Upload or transcode failed with a diagnostic.
    pub fn failed(error_detail: impl Into<String>) -> Self {
        Self {
            state: Some(AssetState::Failed),
            error_detail: Some(error_detail.into()),
            ..Default::default()
        }
    }
}

/// Persisted per-video pipeline state.
///
/// Writers follow the asset state machine; the store itself applies patches
/// last-writer-wins, which is the accepted resolution for racing terminal
/// writes (e.g. a manual retry racing an in-flight job).
#[async_trait]
pub trait VideoRecordStore: Send + Sync {
    async fn get(&self, video_id: Uuid) -> RecordResult<Option<VideoAsset>>;

    async fn create(&self, asset: VideoAsset) -> RecordResult<()>;

    async fn update(&self, video_id: Uuid, patch: VideoAssetPatch) -> RecordResult<()>;
}

/// The enrollment ledger: the sole authority for "this student may watch all
/// videos in this course".
#[async_trait]
pub trait EnrollmentLedger: Send + Sync {
    async fn exists(&self, student_id: Uuid, course_id: Uuid) -> RecordResult<bool>;

    /// Atomic insert-if-absent. Returns `true` when a new record was
    /// inserted, `false` when one already existed. Never creates duplicates
    /// under concurrent calls.
    async fn insert_if_absent(&self, student_id: Uuid, course_id: Uuid) -> RecordResult<bool>;
}

/// Read access to course pricing policy.
#[async_trait]
pub trait CoursePolicyStore: Send + Sync {
    async fn get_policy(&self, course_id: Uuid) -> RecordResult<Option<CoursePolicy>>;
}
