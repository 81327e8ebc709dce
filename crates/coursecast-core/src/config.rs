//! Configuration module
//!
//! Environment-driven configuration for storage, the streaming uploader, and
//! the transcode worker. `Config::from_env` reads a `.env` file when present.

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::storage_types::StorageBackend;

const DEFAULT_PART_SIZE: usize = 8 * 1024 * 1024;
const DEFAULT_MAX_CONCURRENT_PARTS: usize = 4;
const DEFAULT_PROGRESS_BYTE_CADENCE: u64 = 32 * 1024 * 1024;
const DEFAULT_SEGMENT_DURATION_SECS: u64 = 6;
const DEFAULT_MAX_CONCURRENT_TRANSCODES: usize = 2;

/// One rung of the adaptive-bitrate ladder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rendition {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub video_bitrate_kbps: u32,
}

impl Rendition {
    pub fn new(name: &str, width: u32, height: u32, video_bitrate_kbps: u32) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            video_bitrate_kbps,
        }
    }

    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// The fixed three-rung ladder used for course video.
pub fn default_ladder() -> Vec<Rendition> {
    vec![
        Rendition::new("1080p", 1920, 1080, 5000),
        Rendition::new("720p", 1280, 720, 3000),
        Rendition::new("480p", 854, 480, 1500),
    ]
}

/// Pipeline configuration.
#[derive(Clone, Debug)]
pub struct Config {
    // Storage
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    // Uploader
    pub upload_part_size: usize,
    pub max_concurrent_parts: usize,
    pub progress_byte_cadence: u64,
    // Transcoding
    pub ffmpeg_path: String,
    pub hls_segment_duration: u64,
    pub renditions: Vec<Rendition>,
    pub max_concurrent_transcodes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => StorageBackend::from_str(&value).map_err(anyhow::Error::msg)?,
            Err(_) => StorageBackend::Local,
        };

        let config = Self {
            storage_backend,
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION").ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL").ok(),
            upload_part_size: env_parse("UPLOAD_PART_SIZE", DEFAULT_PART_SIZE)?,
            max_concurrent_parts: env_parse("MAX_CONCURRENT_PARTS", DEFAULT_MAX_CONCURRENT_PARTS)?,
            progress_byte_cadence: env_parse(
                "PROGRESS_BYTE_CADENCE",
                DEFAULT_PROGRESS_BYTE_CADENCE,
            )?,
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            hls_segment_duration: env_parse("HLS_SEGMENT_DURATION", DEFAULT_SEGMENT_DURATION_SECS)?,
            renditions: default_ladder(),
            max_concurrent_transcodes: env_parse(
                "MAX_CONCURRENT_TRANSCODES",
                DEFAULT_MAX_CONCURRENT_TRANSCODES,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() || self.s3_region.is_none() {
                    anyhow::bail!("S3 backend requires S3_BUCKET and S3_REGION");
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    anyhow::bail!("Local backend requires LOCAL_STORAGE_PATH");
                }
            }
        }
        if self.upload_part_size < 5 * 1024 * 1024 {
            anyhow::bail!("UPLOAD_PART_SIZE must be at least 5 MiB (multipart minimum)");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_backend: StorageBackend::Local,
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            local_storage_path: None,
            local_storage_base_url: None,
            upload_part_size: DEFAULT_PART_SIZE,
            max_concurrent_parts: DEFAULT_MAX_CONCURRENT_PARTS,
            progress_byte_cadence: DEFAULT_PROGRESS_BYTE_CADENCE,
            ffmpeg_path: "ffmpeg".to_string(),
            hls_segment_duration: DEFAULT_SEGMENT_DURATION_SECS,
            renditions: default_ladder(),
            max_concurrent_transcodes: DEFAULT_MAX_CONCURRENT_TRANSCODES,
        }
    }
}

fn env_parse<T>(name: &str, default: T) -> Result<T, anyhow::Error>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {}: {}", name, e)),
        Err(_) => Ok(default),
    }
}
