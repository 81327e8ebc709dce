//! In-memory record stores for tests and local runs.

use async_trait::async_trait;
use chrono::Utc;
use coursecast_core::models::{AssetState, CoursePolicy, EnrollmentRecord, VideoAsset};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::traits::{
    CoursePolicyStore, EnrollmentLedger, RecordError, RecordResult, VideoAssetPatch,
    VideoRecordStore,
};

/// In-memory video record store.
#[derive(Clone, Default)]
pub struct InMemoryVideoRecords {
    records: Arc<RwLock<HashMap<Uuid, VideoAsset>>>,
}

impl InMemoryVideoRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored assets, for test assertions.
    pub async fn snapshot(&self) -> Vec<VideoAsset> {
        self.records.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl VideoRecordStore for InMemoryVideoRecords {
    async fn get(&self, video_id: Uuid) -> RecordResult<Option<VideoAsset>> {
        Ok(self.records.read().await.get(&video_id).cloned())
    }

    async fn create(&self, asset: VideoAsset) -> RecordResult<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&asset.id) {
            return Err(RecordError::AlreadyExists(asset.id.to_string()));
        }
        records.insert(asset.id, asset);
        Ok(())
    }

    async fn update(&self, video_id: Uuid, patch: VideoAssetPatch) -> RecordResult<()> {
        let mut records = self.records.write().await;
        let asset = records
            .get_mut(&video_id)
            .ok_or_else(|| RecordError::NotFound(video_id.to_string()))?;

        if let Some(url) = patch.raw_playback_url {
            asset.raw_playback_url = Some(url);
        }
        if let Some(key) = patch.rendition_manifest_key {
            asset.rendition_manifest_key = Some(key);
        }
        if let Some(detail) = patch.error_detail {
            asset.error_detail = Some(detail);
        }
        if let Some(state) = patch.state {
            asset.state = state;
            // Keep the Ready/Failed invariants coupled to the state write.
            match state {
                AssetState::Ready => asset.error_detail = None,
                AssetState::Failed => asset.rendition_manifest_key = None,
                _ => {}
            }
        }
        asset.updated_at = Utc::now();
        Ok(())
    }
}

/// In-memory enrollment ledger.
#[derive(Clone, Default)]
pub struct InMemoryEnrollmentLedger {
    records: Arc<RwLock<HashMap<(Uuid, Uuid), EnrollmentRecord>>>,
}

impl InMemoryEnrollmentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl EnrollmentLedger for InMemoryEnrollmentLedger {
    async fn exists(&self, student_id: Uuid, course_id: Uuid) -> RecordResult<bool> {
        Ok(self
            .records
            .read()
            .await
            .contains_key(&(student_id, course_id)))
    }

    async fn insert_if_absent(&self, student_id: Uuid, course_id: Uuid) -> RecordResult<bool> {
        // Single write lock covers check and insert, so concurrent callers
        // cannot both observe "absent".
        let mut records = self.records.write().await;
        match records.entry((student_id, course_id)) {
            std::collections::hash_map::Entry::Occupied(_) => Ok(false),
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(EnrollmentRecord::new(student_id, course_id));
                Ok(true)
            }
        }
    }
}

/// In-memory course policy store.
#[derive(Clone, Default)]
pub struct InMemoryCoursePolicies {
    policies: Arc<RwLock<HashMap<Uuid, CoursePolicy>>>,
}

impl InMemoryCoursePolicies {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, course_id: Uuid, policy: CoursePolicy) {
        self.policies.write().await.insert(course_id, policy);
    }
}

#[async_trait]
impl CoursePolicyStore for InMemoryCoursePolicies {
    async fn get_policy(&self, course_id: Uuid) -> RecordResult<Option<CoursePolicy>> {
        Ok(self.policies.read().await.get(&course_id).cloned())
    }
}
