//! File intake: identify the selected file and probe its natural size.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{ConvertError, Result};
use crate::media::MediaDecoder;
use crate::options::Dimensions;

/// A file the user picked or dropped onto the window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFile {
    pub path: PathBuf,
    pub name: String,
    pub mime: String,
    pub size: u64,
}

impl SourceFile {
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let metadata = std::fs::metadata(&path).map_err(|e| ConvertError::Unreadable {
            path: path.clone(),
            message: e.to_string(),
        })?;
        if !metadata.is_file() {
            return Err(ConvertError::InvalidField {
                field: "file",
                value: path.display().to_string(),
            });
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            mime: mime_for_path(&path).to_string(),
            name,
            size: metadata.len(),
            path,
        })
    }

    pub fn is_video(&self) -> bool {
        is_video_mime(&self.mime)
    }

    /// Size as shown next to the picker, e.g. `"12.34 MB"`.
    pub fn size_label(&self) -> String {
        format!("{:.2} MB", self.size as f64 / 1024.0 / 1024.0)
    }
}

/// MIME type guessed from the file extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mov" | "qt" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "ogv" => "video/ogg",
        "mpeg" | "mpg" => "video/mpeg",
        "3gp" => "video/3gpp",
        "wmv" => "video/x-ms-wmv",
        "flv" => "video/x-flv",
        "ts" | "m2ts" | "mts" => "video/mp2t",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "ogg" | "oga" => "audio/ogg",
        "opus" => "audio/opus",
        "gif" => "image/gif",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

pub fn is_video_mime(mime: &str) -> bool {
    mime.starts_with("video/")
}

/// Probe the natural resolution of `path`.
pub async fn probe_dimensions(decoder: &dyn MediaDecoder, path: &Path) -> Result<Dimensions> {
    let info = decoder.load(path).await?;
    tracing::debug!(path = %path.display(), width = info.width, height = info.height, duration = info.duration, "probed source");
    Ok(info.dimensions())
}
