//! Upload validation: content-type allow-list and filename checks.
//!
//! Validation happens before any bytes reach object storage, so rejected
//! content never pays upload cost.

use std::path::Path;

/// Target category for an upload; drives the storage key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadCategory {
    Video,
    Image,
    Document,
}

impl UploadCategory {
    /// Key prefix segment for this category.
    pub fn key_prefix(&self) -> &'static str {
        match self {
            UploadCategory::Video => "videos",
            UploadCategory::Image => "images",
            UploadCategory::Document => "documents",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Disallowed file type: .{extension} ({content_type})")]
    DisallowedType {
        extension: String,
        content_type: String,
    },

    #[error("File type .{extension} is not a {expected} type")]
    CategoryMismatch {
        extension: String,
        expected: &'static str,
    },
}

/// Map a known extension to (MIME type, category).
///
/// The allow-list is fixed: PDF documents, common video containers, and
/// common image formats. Anything else is rejected up front.
fn lookup_extension(extension: &str) -> Option<(&'static str, UploadCategory)> {
    match extension {
        // Documents
        "pdf" => Some(("application/pdf", UploadCategory::Document)),
        // Videos
        "mp4" | "m4v" => Some(("video/mp4", UploadCategory::Video)),
        "mpeg" | "mpg" => Some(("video/mpeg", UploadCategory::Video)),
        "mov" => Some(("video/quicktime", UploadCategory::Video)),
        "avi" => Some(("video/x-msvideo", UploadCategory::Video)),
        "webm" => Some(("video/webm", UploadCategory::Video)),
        "mkv" => Some(("video/x-matroska", UploadCategory::Video)),
        // Images
        "jpg" | "jpeg" => Some(("image/jpeg", UploadCategory::Image)),
        "png" => Some(("image/png", UploadCategory::Image)),
        "webp" => Some(("image/webp", UploadCategory::Image)),
        "gif" => Some(("image/gif", UploadCategory::Image)),
        "svg" => Some(("image/svg+xml", UploadCategory::Image)),
        "heic" => Some(("image/heic", UploadCategory::Image)),
        "heif" => Some(("image/heif", UploadCategory::Image)),
        _ => None,
    }
}

/// Validates declared filenames against the fixed allow-list.
#[derive(Debug, Clone, Default)]
pub struct UploadValidator;

/// Outcome of a successful validation: the extension, resolved MIME type,
/// and the category the file belongs to.
#[derive(Debug, Clone)]
pub struct ValidatedUpload {
    pub extension: String,
    pub content_type: &'static str,
    pub category: UploadCategory,
}

impl UploadValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a declared filename for the requested category.
    ///
    /// Fails for a missing extension, an extension outside the allow-list,
    /// or an allow-listed type that does not match the requested category
    /// (e.g. a PNG submitted as a course video).
    pub fn validate(
        &self,
        filename: &str,
        category: UploadCategory,
    ) -> Result<ValidatedUpload, ValidationError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .ok_or_else(|| ValidationError::InvalidFilename(filename.to_string()))?;

        let (content_type, found_category) = lookup_extension(&extension).ok_or_else(|| {
            ValidationError::DisallowedType {
                extension: extension.clone(),
                content_type: "unknown".to_string(),
            }
        })?;

        if found_category != category {
            return Err(ValidationError::CategoryMismatch {
                extension,
                expected: category.key_prefix(),
            });
        }

        Ok(ValidatedUpload {
            extension,
            content_type,
            category,
        })
    }
}
