use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The authoritative fact that a student may access all gated content of a
/// course. Written by purchase and free-enroll flows, read at playback time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub enrolled_at: DateTime<Utc>,
}

impl EnrollmentRecord {
    pub fn new(student_id: Uuid, course_id: Uuid) -> Self {
        Self {
            student_id,
            course_id,
            enrolled_at: Utc::now(),
        }
    }
}
