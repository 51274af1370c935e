//! Media decode/seek capability: metadata, seeking and frame snapshots.

use std::path::Path;

use async_trait::async_trait;

use crate::error::{ConvertError, Result};
use crate::options::Dimensions;

/// GIF logical screens are limited to 16-bit sides.
pub const MAX_SURFACE_SIDE: u32 = u16::MAX as u32;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaInfo {
    pub width: u32,
    pub height: u32,
    /// Seconds.
    pub duration: f64,
}

impl MediaInfo {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }
}

/// Off-screen RGBA drawing surface that frames are snapshotted into.
#[derive(Debug, Clone)]
pub struct Surface {
    width: u16,
    height: u16,
    pixels: Vec<u8>,
}

impl Surface {
    pub fn allocate(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 || width > MAX_SURFACE_SIDE || height > MAX_SURFACE_SIDE {
            return Err(ConvertError::SurfaceUnavailable { width, height });
        }
        Ok(Self {
            width: width as u16,
            height: height as u16,
            pixels: vec![0; width as usize * height as usize * 4],
        })
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}

#[async_trait]
pub trait MediaDecoder: Send + Sync {
    /// Whether the decoder can run at all on this machine.
    async fn available(&self) -> bool;

    /// Load `source` and report its natural size and duration.
    async fn load(&self, source: &Path) -> Result<MediaInfo>;

    /// Seek to `at` seconds and draw the frame there into `surface`, scaled to
    /// the surface size. Resolves once the frame is fully drawn.
    async fn capture(&self, source: &Path, at: f64, surface: &mut Surface) -> Result<()>;
}
