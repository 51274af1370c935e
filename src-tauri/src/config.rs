use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Store file holding persisted settings.
pub const STORE_FILE: &str = "settings.json";
/// Key of the converter section inside the store.
pub const STORE_KEY: &str = "converter";

/// Tunables of the conversion pipelines, persisted through the settings store.
///
/// Missing keys fall back to their defaults. `gifDurationCapSecs: null`
/// removes the cap entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConverterConfig {
    /// Longest stretch of the source turned into GIF frames, in seconds.
    pub gif_duration_cap_secs: Option<f64>,
    /// Pause between a captured frame and the next seek.
    pub seek_settle_ms: u64,
    /// Quality preselected in the form for GIF output.
    pub default_gif_quality: u8,
    /// Where downloads land; the OS downloads folder when unset.
    pub download_dir: Option<PathBuf>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            gif_duration_cap_secs: Some(10.0),
            seek_settle_ms: 10,
            default_gif_quality: 10,
            download_dir: None,
        }
    }
}

impl ConverterConfig {
    /// Build from the raw store value, falling back to defaults when the value
    /// is absent or malformed.
    pub fn from_store_value(value: Option<serde_json::Value>) -> Self {
        let Some(value) = value else {
            return Self::default();
        };
        match serde_json::from_value(value) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed converter settings");
                Self::default()
            }
        }
    }

    pub fn seek_settle(&self) -> Duration {
        Duration::from_millis(self.seek_settle_ms)
    }
}
