use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

/// Lifecycle state of a video asset.
///
/// Transitions are forward-only: `Uploading -> Processing -> Ready | Failed`.
/// The single exception is `Failed -> Processing`, which an operator-triggered
/// transcode re-run takes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AssetState {
    Uploading,
    Processing,
    Ready,
    Failed,
}

impl AssetState {
    /// Whether this state ends the normal lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AssetState::Ready | AssetState::Failed)
    }

    /// Whether moving to `next` is a legal transition.
    pub fn can_transition_to(&self, next: AssetState) -> bool {
        matches!(
            (self, next),
            (AssetState::Uploading, AssetState::Processing)
                | (AssetState::Uploading, AssetState::Failed)
                | (AssetState::Processing, AssetState::Ready)
                | (AssetState::Processing, AssetState::Failed)
                | (AssetState::Failed, AssetState::Processing)
        )
    }
}

impl Display for AssetState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AssetState::Uploading => write!(f, "uploading"),
            AssetState::Processing => write!(f, "processing"),
            AssetState::Ready => write!(f, "ready"),
            AssetState::Failed => write!(f, "failed"),
        }
    }
}

/// A course video and its pipeline state.
///
/// `source_key` addresses the originally uploaded file and is owned
/// exclusively by this asset. `rendition_manifest_key` is set once transcoding
/// succeeds; `raw_playback_url` is set at upload completion and is playable
/// independently of transcode state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoAsset {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub course_id: Uuid,
    pub source_key: String,
    pub rendition_manifest_key: Option<String>,
    pub state: AssetState,
    pub raw_playback_url: Option<String>,
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VideoAsset {
    /// Create a fresh asset at the start of an upload.
    pub fn new_uploading(id: Uuid, creator_id: Uuid, course_id: Uuid, source_key: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            creator_id,
            course_id,
            source_key,
            rendition_manifest_key: None,
            state: AssetState::Uploading,
            raw_playback_url: None,
            error_detail: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A `Ready` asset always has both the source and the manifest key;
    /// a `Failed` asset never has a manifest key.
    pub fn invariants_hold(&self) -> bool {
        match self.state {
            AssetState::Ready => {
                !self.source_key.is_empty() && self.rendition_manifest_key.is_some()
            }
            AssetState::Failed => self.rendition_manifest_key.is_none(),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions_allowed() {
        assert!(AssetState::Uploading.can_transition_to(AssetState::Processing));
        assert!(AssetState::Processing.can_transition_to(AssetState::Ready));
        assert!(AssetState::Processing.can_transition_to(AssetState::Failed));
    }

    #[test]
    fn test_backward_transitions_rejected() {
        assert!(!AssetState::Ready.can_transition_to(AssetState::Processing));
        assert!(!AssetState::Processing.can_transition_to(AssetState::Uploading));
        assert!(!AssetState::Ready.can_transition_to(AssetState::Failed));
    }

    #[test]
    fn test_failed_can_reenter_processing() {
        assert!(AssetState::Failed.can_transition_to(AssetState::Processing));
        assert!(!AssetState::Failed.can_transition_to(AssetState::Ready));
    }

    #[test]
    fn test_terminal_states() {
        assert!(AssetState::Ready.is_terminal());
        assert!(AssetState::Failed.is_terminal());
        assert!(!AssetState::Uploading.is_terminal());
        assert!(!AssetState::Processing.is_terminal());
    }

    #[test]
    fn test_state_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&AssetState::Processing).unwrap(),
            "\"processing\""
        );
        let state: AssetState = serde_json::from_str("\"ready\"").unwrap();
        assert_eq!(state, AssetState::Ready);
    }

    #[test]
    fn test_new_uploading_invariants() {
        let asset = VideoAsset::new_uploading(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "videos/owner/1700000000000.mp4".to_string(),
        );
        assert_eq!(asset.state, AssetState::Uploading);
        assert!(asset.rendition_manifest_key.is_none());
        assert!(asset.raw_playback_url.is_none());
        assert!(asset.invariants_hold());
    }

    #[test]
    fn test_ready_requires_manifest_key() {
        let mut asset = VideoAsset::new_uploading(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "videos/owner/1700000000000.mp4".to_string(),
        );
        asset.state = AssetState::Ready;
        assert!(!asset.invariants_hold());

        asset.rendition_manifest_key = Some("videos/owner/1700000000000/hls/master.m3u8".into());
        assert!(asset.invariants_hold());
    }

    #[test]
    fn test_failed_never_has_manifest_key() {
        let mut asset = VideoAsset::new_uploading(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "videos/owner/1700000000000.mp4".to_string(),
        );
        asset.state = AssetState::Failed;
        asset.error_detail = Some("encode failed".into());
        assert!(asset.invariants_hold());

        asset.rendition_manifest_key = Some("stale".into());
        assert!(!asset.invariants_hold());
    }
}
