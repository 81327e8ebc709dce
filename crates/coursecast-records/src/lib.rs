//! Coursecast Records Library
//!
//! Collaborator interfaces for the platform's document store: per-video
//! state records, the enrollment ledger, and course access policies. The
//! document store itself lives outside this subsystem; these traits define
//! the contract the pipeline depends on, and the in-memory implementations
//! back tests and local runs.

pub mod memory;
pub mod traits;

pub use memory::{InMemoryCoursePolicies, InMemoryEnrollmentLedger, InMemoryVideoRecords};
pub use traits::{
    CoursePolicyStore, EnrollmentLedger, RecordError, RecordResult, VideoAssetPatch,
    VideoRecordStore,
};
