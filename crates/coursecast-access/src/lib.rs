//! Coursecast Access Library
//!
//! Playback access resolution for course video: per student, per course,
//! per video, decide between a playable URL, an enroll-first denial, or a
//! state-based denial. Denial is an expected, frequent outcome and is
//! returned as a decision value, never as an error.

pub mod enrollment;
pub mod resolver;

pub use enrollment::{EnrollError, EnrollOutcome, EnrollmentService};
pub use resolver::{AccessError, AccessResolver, DenialReason, PlaybackDecision, PlaybackKind};
