use serde::Serialize;

use crate::codec::Codec;

const KIB: f64 = 1024.0;
const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderKind {
    /// Shown in an `<img>`.
    Image,
    /// Shown in a playable `<video>` element.
    Video,
}

pub fn render_kind(codec: Codec) -> RenderKind {
    match codec {
        Codec::Gif => RenderKind::Image,
        _ => RenderKind::Video,
    }
}

/// `KB` below 1 MiB, `MB` from there on, two decimals. `---` without output.
pub fn size_label(bytes: Option<u64>) -> String {
    match bytes {
        None => "---".to_string(),
        Some(bytes) if bytes < MIB => format!("{:.2} KB", bytes as f64 / KIB),
        Some(bytes) => format!("{:.2} MB", bytes as f64 / KIB / KIB),
    }
}

/// Notices shown above the form. `gif_cap_secs` is the configured GIF
/// duration cap, `None` when GIFs cover the whole source.
pub fn notices(gif_cap_secs: Option<f64>) -> Vec<String> {
    let gif = match gif_cap_secs {
        Some(cap) => format!(
            "GIF output is limited to the first {cap} seconds of the video. Watch the file size at large resolutions."
        ),
        None => "GIF output covers the whole video. Watch the file size at large resolutions.".to_string(),
    };
    vec!["Converting large files can take a while.".to_string(), gif]
}
