use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Access policy read from the course record.
///
/// `preview_key` points at the course-level preview asset. It is stored on the
/// course, not on any video, and is never gated by enrollment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoursePolicy {
    pub is_paid: bool,
    pub price: Decimal,
    pub preview_key: Option<String>,
}

impl CoursePolicy {
    pub fn free() -> Self {
        Self {
            is_paid: false,
            price: Decimal::ZERO,
            preview_key: None,
        }
    }

    pub fn paid(price: Decimal) -> Self {
        Self {
            is_paid: true,
            price,
            preview_key: None,
        }
    }

    pub fn with_preview(mut self, preview_key: impl Into<String>) -> Self {
        self.preview_key = Some(preview_key.into());
        self
    }
}
