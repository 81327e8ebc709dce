//! Coursecast Storage Library
//!
//! Object-store abstraction for the media pipeline: multipart streamed
//! writes, single-object reads and writes, and deletes, addressed by
//! POSIX-like forward-slash keys.
//!
//! Multipart semantics guarantee an unfinished upload is never readable at
//! its key until `complete_multipart` succeeds; `abort_multipart` releases
//! any server-side partial parts. Both backends honor this: S3 natively,
//! the local backend by staging parts outside the key space.

pub mod factory;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use coursecast_core::StorageBackend;
pub use factory::create_object_store;
#[cfg(feature = "storage-local")]
pub use local::LocalObjectStore;
#[cfg(feature = "storage-s3")]
pub use s3::S3ObjectStore;
pub use traits::{ByteStream, CompletedObject, ObjectStore, PartEtag, StorageError, StorageResult};
