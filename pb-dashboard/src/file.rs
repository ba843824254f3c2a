//! Candidate audio files offered to the dashboard
//!
//! A file is either already in memory (drag and drop) or sitting on disk
//! (file picker). Its declared MIME type is what the validator checks.

use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

/// Bytes inspected for magic-number detection
const SNIFF_LEN: usize = 8192;

/// Fallback when neither content nor extension identify the file
pub const UNKNOWN_MIME: &str = "application/octet-stream";

#[derive(Debug, Clone)]
pub enum FileSource {
    Memory(Vec<u8>),
    Disk(PathBuf),
}

/// A file selected for upload
#[derive(Debug, Clone)]
pub struct AudioFile {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub source: FileSource,
}

impl AudioFile {
    /// File already held in memory with a caller-declared MIME type
    pub fn from_bytes(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size: bytes.len() as u64,
            source: FileSource::Memory(bytes),
        }
    }

    /// Describe a file on disk.
    ///
    /// The MIME type is `mime_override` when given, otherwise detected from the
    /// file's leading bytes, otherwise guessed from the extension. Only the
    /// header is read here; the body is read when the upload starts.
    pub async fn from_path(path: &Path, mime_override: Option<String>) -> std::io::Result<Self> {
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }

        let mime_type = match mime_override {
            Some(mime) => mime,
            None => {
                let mut header = vec![0u8; SNIFF_LEN];
                let mut file = tokio::fs::File::open(path).await?;
                let read = file.read(&mut header).await?;
                header.truncate(read);
                detect_mime(&header, path)
            }
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            name,
            mime_type,
            size: metadata.len(),
            source: FileSource::Disk(path.to_path_buf()),
        })
    }

    /// Full file contents
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        match &self.source {
            FileSource::Memory(bytes) => Ok(bytes.clone()),
            FileSource::Disk(path) => tokio::fs::read(path).await,
        }
    }
}

/// Detect the MIME type from content, falling back to the file extension.
///
/// Content detection reports WAV as `audio/x-wav`; it is normalized to the
/// `audio/wav` spelling browsers declare.
pub fn detect_mime(header: &[u8], path: &Path) -> String {
    if let Some(kind) = infer::get(header) {
        return normalize_mime(kind.mime_type()).to_string();
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("wav") | Some("wave") => "audio/wav".to_string(),
        Some("mp3") => "audio/mpeg".to_string(),
        _ => UNKNOWN_MIME.to_string(),
    }
}

fn normalize_mime(mime: &str) -> &str {
    match mime {
        "audio/x-wav" | "audio/wave" | "audio/vnd.wave" => "audio/wav",
        other => other,
    }
}
