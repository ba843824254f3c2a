//! Audio file validation
//!
//! Pure check run before any network traffic. Both dashboard entry points
//! (file picker and drag-and-drop) go through [`validate_file`].

use thiserror::Error;

/// MIME types accepted by the prediction service
pub const ALLOWED_MIME_TYPES: [&str; 3] = ["audio/wav", "audio/mpeg", "audio/mp3"];

/// Maximum upload size: 10 MiB
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Why a candidate file was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FileRejection {
    #[error("Please upload a valid audio file (WAV or MP3)")]
    InvalidFormat,

    #[error("File size exceeds 10MB limit")]
    SizeExceeded,
}

/// Validate a candidate file by declared MIME type and byte size.
///
/// The format rule is applied first, so a file that is both the wrong type
/// and too large reports `InvalidFormat`.
pub fn validate_file(mime_type: &str, size: u64) -> Result<(), FileRejection> {
    if !ALLOWED_MIME_TYPES.contains(&mime_type) {
        return Err(FileRejection::InvalidFormat);
    }
    if size > MAX_FILE_SIZE {
        return Err(FileRejection::SizeExceeded);
    }
    Ok(())
}
