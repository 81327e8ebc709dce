//! Playback access resolution.

use coursecast_core::models::{AssetState, VideoAsset};
use coursecast_records::{CoursePolicyStore, EnrollmentLedger, RecordError, VideoRecordStore};
use coursecast_storage::ObjectStore;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Record store error: {0}")]
    Records(#[from] RecordError),
}

/// What kind of URL a full-access decision carries; callers pick their
/// player strategy accordingly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackKind {
    AdaptiveManifest,
    RawFile,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DenialReason {
    /// Paid course, no enrollment record. Carries the price and the
    /// course-level preview pointer so the caller can offer the preview and
    /// a purchase path, never the gated asset.
    RequiresEnrollment {
        price: Decimal,
        preview_key: Option<String>,
    },
    /// The asset is still transcoding (or uploading).
    NotYetAvailable,
    /// Transcoding failed and no raw fallback exists.
    TranscodeFailed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackDecision {
    FullAccess { url: String, kind: PlaybackKind },
    Denied { course_id: Uuid, reason: DenialReason },
}

/// Resolves playback decisions from course policy, the enrollment ledger,
/// and video record state. Read-only; requires no locking.
pub struct AccessResolver {
    courses: Arc<dyn CoursePolicyStore>,
    enrollments: Arc<dyn EnrollmentLedger>,
    videos: Arc<dyn VideoRecordStore>,
    store: Arc<dyn ObjectStore>,
}

impl AccessResolver {
    pub fn new(
        courses: Arc<dyn CoursePolicyStore>,
        enrollments: Arc<dyn EnrollmentLedger>,
        videos: Arc<dyn VideoRecordStore>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            courses,
            enrollments,
            videos,
            store,
        }
    }

    /// Decide what a student gets for one video of one course.
    ///
    /// Free courses have no per-video enrollment gate; the ledger is only
    /// consulted for paid courses. For gated-out students the denial always
    /// wins, regardless of asset state.
    pub async fn resolve(
        &self,
        student_id: Uuid,
        course_id: Uuid,
        video_id: Uuid,
    ) -> Result<PlaybackDecision, AccessError> {
        let policy = self
            .courses
            .get_policy(course_id)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("course {}", course_id)))?;

        let asset = self
            .videos
            .get(video_id)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("video {}", video_id)))?;

        if policy.is_paid && !self.enrollments.exists(student_id, course_id).await? {
            tracing::debug!(
                student_id = %student_id,
                course_id = %course_id,
                video_id = %video_id,
                "Playback denied: enrollment required"
            );
            return Ok(PlaybackDecision::Denied {
                course_id,
                reason: DenialReason::RequiresEnrollment {
                    price: policy.price,
                    preview_key: policy.preview_key,
                },
            });
        }

        Ok(self.select_url(course_id, &asset))
    }

    /// URL preference: rendition manifest when Ready, then the raw playback
    /// fallback, then a state-coded denial.
    fn select_url(&self, course_id: Uuid, asset: &VideoAsset) -> PlaybackDecision {
        if asset.state == AssetState::Ready {
            if let Some(manifest_key) = &asset.rendition_manifest_key {
                return PlaybackDecision::FullAccess {
                    url: self.store.public_url(manifest_key),
                    kind: PlaybackKind::AdaptiveManifest,
                };
            }
        }

        if let Some(raw_url) = &asset.raw_playback_url {
            return PlaybackDecision::FullAccess {
                url: raw_url.clone(),
                kind: PlaybackKind::RawFile,
            };
        }

        let reason = match asset.state {
            AssetState::Failed => DenialReason::TranscodeFailed,
            _ => DenialReason::NotYetAvailable,
        };

        tracing::debug!(
            course_id = %course_id,
            video_id = %asset.id,
            state = %asset.state,
            "Playback denied: no playable URL"
        );

        PlaybackDecision::Denied { course_id, reason }
    }
}
