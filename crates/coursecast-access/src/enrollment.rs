//! Free-course enrollment.

use coursecast_records::{CoursePolicyStore, EnrollmentLedger, RecordError};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum EnrollError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// Free-enroll attempted on a paid course; carries the price so the
    /// caller can route into the purchase flow.
    #[error("Payment required: course costs {price}")]
    PaymentRequired { price: Decimal },

    #[error("Record store error: {0}")]
    Records(#[from] RecordError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollOutcome {
    Enrolled,
    /// A record already existed. Success, not an error: UI flows rely on
    /// this to recover silently from double-clicks and client retries.
    AlreadyEnrolled,
}

impl EnrollOutcome {
    pub fn already_enrolled(&self) -> bool {
        matches!(self, EnrollOutcome::AlreadyEnrolled)
    }
}

pub struct EnrollmentService {
    courses: Arc<dyn CoursePolicyStore>,
    enrollments: Arc<dyn EnrollmentLedger>,
}

impl EnrollmentService {
    pub fn new(courses: Arc<dyn CoursePolicyStore>, enrollments: Arc<dyn EnrollmentLedger>) -> Self {
        Self {
            courses,
            enrollments,
        }
    }

    /// Enroll a student in a free course. Safe to call repeatedly.
    pub async fn enroll_free(
        &self,
        student_id: Uuid,
        course_id: Uuid,
    ) -> Result<EnrollOutcome, EnrollError> {
        let policy = self
            .courses
            .get_policy(course_id)
            .await?
            .ok_or_else(|| EnrollError::NotFound(format!("course {}", course_id)))?;

        if policy.is_paid {
            return Err(EnrollError::PaymentRequired {
                price: policy.price,
            });
        }

        let inserted = self
            .enrollments
            .insert_if_absent(student_id, course_id)
            .await?;

        if inserted {
            tracing::info!(
                student_id = %student_id,
                course_id = %course_id,
                "Student enrolled in free course"
            );
            Ok(EnrollOutcome::Enrolled)
        } else {
            tracing::debug!(
                student_id = %student_id,
                course_id = %course_id,
                "Enrollment already present"
            );
            Ok(EnrollOutcome::AlreadyEnrolled)
        }
    }
}
