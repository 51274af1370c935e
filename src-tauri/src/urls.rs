//! Object URLs handed to the webview.
//!
//! A URL points at a file through the asset protocol. The registry tracks
//! which URLs are live; revoking a URL that owns a temp file deletes it.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tempfile::TempPath;

static NEXT_URL_ID: AtomicU64 = AtomicU64::new(1);

#[cfg(target_os = "windows")]
const ASSET_ORIGIN: &str = "http://asset.localhost/";
#[cfg(not(target_os = "windows"))]
const ASSET_ORIGIN: &str = "asset://localhost/";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    /// Mint a fresh URL for `path`. Two URLs for the same file never compare
    /// equal, so each allocation is revoked independently.
    pub fn for_path(path: &Path) -> Self {
        let id = NEXT_URL_ID.fetch_add(1, Ordering::Relaxed);
        Self(format!(
            "{ASSET_ORIGIN}{}?v={id}",
            urlencoding::encode(&path.to_string_lossy())
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a live URL points at.
#[derive(Debug)]
pub enum Backing {
    /// A file the user owns; revoking only forgets the URL.
    Borrowed(PathBuf),
    /// A temp file created by the converter; revoking deletes it.
    Owned(TempPath),
}

impl Backing {
    pub fn path(&self) -> &Path {
        match self {
            Backing::Borrowed(path) => path.as_path(),
            Backing::Owned(temp) => &**temp,
        }
    }
}

#[derive(Debug, Default)]
pub struct UrlRegistry {
    live: HashMap<ObjectUrl, Backing>,
    revoked: u64,
}

impl UrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, url: ObjectUrl, backing: Backing) {
        tracing::debug!(%url, path = %backing.path().display(), "register object url");
        self.live.insert(url, backing);
    }

    /// Release `url`. Returns `false` when it was not live, which means a
    /// double revoke or a URL this registry never saw.
    pub fn revoke(&mut self, url: &ObjectUrl) -> bool {
        match self.live.remove(url) {
            Some(backing) => {
                tracing::debug!(%url, "revoke object url");
                self.revoked += 1;
                drop(backing);
                true
            }
            None => {
                tracing::warn!(%url, "revoke of an object url that is not live");
                false
            }
        }
    }

    pub fn revoke_all(&mut self) {
        let urls: Vec<ObjectUrl> = self.live.keys().cloned().collect();
        for url in urls {
            self.revoke(&url);
        }
    }

    pub fn is_live(&self, url: &ObjectUrl) -> bool {
        self.live.contains_key(url)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Total number of successful revocations since creation.
    pub fn revoked_count(&self) -> u64 {
        self.revoked
    }
}
