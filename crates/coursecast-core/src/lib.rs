//! Coursecast Core Library
//!
//! This crate provides the domain models, validation, configuration, and
//! telemetry setup shared across the coursecast media pipeline crates.

pub mod config;
pub mod models;
pub mod storage_types;
pub mod telemetry;
pub mod validation;

// Re-export commonly used types
pub use config::{Config, Rendition};
pub use storage_types::StorageBackend;
pub use validation::{UploadCategory, UploadValidator, ValidationError};
