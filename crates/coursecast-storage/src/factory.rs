//! Backend selection from configuration.
//!
//! Constructs the single object-store client at process start; callers
//! inject the returned handle into the uploader and transcode worker.

use std::sync::Arc;

use coursecast_core::{Config, StorageBackend};

use crate::traits::{ObjectStore, StorageError, StorageResult};

/// Create the configured object store backend.
pub async fn create_object_store(config: &Config) -> StorageResult<Arc<dyn ObjectStore>> {
    match config.storage_backend {
        StorageBackend::S3 => {
            #[cfg(feature = "storage-s3")]
            {
                let bucket = config
                    .s3_bucket
                    .clone()
                    .ok_or_else(|| StorageError::ConfigError("S3_BUCKET not set".to_string()))?;
                let region = config
                    .s3_region
                    .clone()
                    .ok_or_else(|| StorageError::ConfigError("S3_REGION not set".to_string()))?;
                let store =
                    crate::s3::S3ObjectStore::new(bucket, region, config.s3_endpoint.clone())
                        .await?;
                Ok(Arc::new(store))
            }
            #[cfg(not(feature = "storage-s3"))]
            Err(StorageError::ConfigError(
                "S3 backend requested but the storage-s3 feature is disabled".to_string(),
            ))
        }
        StorageBackend::Local => {
            #[cfg(feature = "storage-local")]
            {
                let base_path = config.local_storage_path.clone().ok_or_else(|| {
                    StorageError::ConfigError("LOCAL_STORAGE_PATH not set".to_string())
                })?;
                let base_url = config
                    .local_storage_base_url
                    .clone()
                    .unwrap_or_else(|| "http://localhost:3000/media".to_string());
                let store = crate::local::LocalObjectStore::new(base_path, base_url).await?;
                Ok(Arc::new(store))
            }
            #[cfg(not(feature = "storage-local"))]
            Err(StorageError::ConfigError(
                "Local backend requested but the storage-local feature is disabled".to_string(),
            ))
        }
    }
}
