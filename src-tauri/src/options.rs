use serde::{Deserialize, Serialize};

use crate::codec::Codec;

pub const DEFAULT_BITRATE: u32 = 1_000_000;
pub const DEFAULT_GIF_FPS: u32 = 10;
pub const DEFAULT_GIF_QUALITY: u8 = 10;

/// What the user wants the conversion to produce.
///
/// `fps` and `quality` only matter for GIF output; `width`/`height` are used
/// by video codecs and by the GIF surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionOptions {
    pub codec: Codec,
    pub bitrate: u32,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<u32>,
    pub quality: Option<u8>,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            codec: Codec::Gif,
            bitrate: DEFAULT_BITRATE,
            width: None,
            height: None,
            fps: Some(DEFAULT_GIF_FPS),
            quality: Some(DEFAULT_GIF_QUALITY),
        }
    }
}

impl ConversionOptions {
    pub fn gif_fps(&self) -> u32 {
        match self.fps {
            Some(fps) if fps > 0 => fps,
            _ => DEFAULT_GIF_FPS,
        }
    }

    pub fn gif_quality(&self) -> u8 {
        match self.quality {
            Some(quality) if quality > 0 => quality,
            _ => DEFAULT_GIF_QUALITY,
        }
    }

    /// Bitrate as an optional constraint; zero means "let the encoder decide".
    pub fn bitrate_constraint(&self) -> Option<u32> {
        (self.bitrate > 0).then_some(self.bitrate)
    }
}

/// Natural resolution of the loaded source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}
