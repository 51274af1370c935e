//! Save a converted artifact under a codec-specific file name.

use std::fs;
use std::path::{Path, PathBuf};

use crate::codec::Codec;
use crate::error::Result;
use crate::urls::{Backing, ObjectUrl, UrlRegistry};

pub fn file_name(codec: Codec) -> String {
    let (stem, ext) = codec.download_name();
    format!("{stem}.{ext}")
}

/// First free path for `file_name` in `dir`: `name.ext`, `name (1).ext`, ...
pub fn unique_destination(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }
    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (1u32..)
        .map(|n| dir.join(format!("{stem} ({n}){ext}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Save the artifact at `artifact` into `dir`.
///
/// A transient URL is held while the save runs and revoked once it has been
/// dispatched, whatever the outcome.
pub fn save(urls: &mut UrlRegistry, artifact: &Path, codec: Codec, dir: &Path) -> Result<PathBuf> {
    let url = ObjectUrl::for_path(artifact);
    urls.register(url.clone(), Backing::Borrowed(artifact.to_path_buf()));

    let destination = unique_destination(dir, &file_name(codec));
    let outcome = fs::create_dir_all(dir).and_then(|()| fs::copy(artifact, &destination));

    urls.revoke(&url);

    let bytes = outcome?;
    tracing::info!(destination = %destination.display(), bytes, "saved converted file");
    Ok(destination)
}
