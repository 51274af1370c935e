//! GIF pipeline: seek through the source, snapshot frames into a surface,
//! hand them to the GIF encoder and render once every frame is in.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use gif::{Encoder, Frame, Repeat};

use crate::config::ConverterConfig;
use crate::error::{ConvertError, Result};
use crate::media::{MediaDecoder, Surface};
use crate::options::ConversionOptions;
use crate::progress::ProgressReporter;

/// Upper bound of the capture phase; rendering fills the rest.
const CAPTURE_SHARE: f64 = 50.0;

/// Frame accumulator of the GIF encoder.
#[async_trait]
pub trait GifEncoder: Send {
    /// Queue a snapshot of `surface` shown for `delay_ms`.
    fn add_frame(&mut self, surface: &Surface, delay_ms: f64) -> Result<()>;

    /// Encode every queued frame. `on_progress` receives `0.0..=1.0`.
    async fn render(self: Box<Self>, on_progress: &(dyn Fn(f64) + Send + Sync)) -> Result<Vec<u8>>;
}

pub trait GifEncoderFactory: Send + Sync {
    fn create(&self, width: u16, height: u16, quality: u8) -> Result<Box<dyn GifEncoder>>;
}

/// Number of frames captured for a clip of `duration` seconds.
pub fn frame_count(duration: f64, fps: u32, cap: Option<f64>) -> u32 {
    if !duration.is_finite() || duration <= 0.0 {
        return 0;
    }
    let capped = match cap {
        Some(cap) => duration.min(cap),
        None => duration,
    };
    (capped * fps as f64).floor() as u32
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CaptureStep {
    Seek { frame: u32, at: f64 },
    Render,
    Idle,
}

/// Drives the seek/capture sequence. Every `next_step` call stands for one
/// "ready" notification from the decoder; render is latched so it fires once.
#[derive(Debug)]
pub struct CaptureSchedule {
    fps: u32,
    frame_count: u32,
    next_frame: u32,
    render_latched: bool,
}

impl CaptureSchedule {
    pub fn new(fps: u32, frame_count: u32) -> Self {
        Self {
            fps: fps.max(1),
            frame_count,
            next_frame: 0,
            render_latched: false,
        }
    }

    pub fn next_step(&mut self) -> CaptureStep {
        if self.next_frame >= self.frame_count {
            if self.render_latched {
                return CaptureStep::Idle;
            }
            self.render_latched = true;
            return CaptureStep::Render;
        }
        let frame = self.next_frame;
        self.next_frame += 1;
        CaptureStep::Seek {
            frame,
            at: frame as f64 / self.fps as f64,
        }
    }

    /// Frames handed out so far.
    pub fn captured(&self) -> u32 {
        self.next_frame
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// `floor(captured / frame_count * 50)`.
    pub fn capture_fraction(&self) -> f64 {
        if self.frame_count == 0 {
            return 1.0;
        }
        self.next_frame as f64 / self.frame_count as f64
    }
}

/// Convert `source` into an animated GIF.
pub async fn convert_gif(
    decoder: &dyn MediaDecoder,
    encoders: &dyn GifEncoderFactory,
    config: &ConverterConfig,
    source: &Path,
    options: &ConversionOptions,
    progress: &ProgressReporter<'_>,
) -> Result<Vec<u8>> {
    let info = decoder.load(source).await?;

    let width = options.width.unwrap_or(info.width);
    let height = options.height.unwrap_or(info.height);
    let mut surface = Surface::allocate(width, height)?;

    let fps = options.gif_fps();
    let quality = options.gif_quality();
    let delay_ms = 1000.0 / fps as f64;
    // A clip shorter than one frame interval still yields its first frame.
    let frames = frame_count(info.duration, fps, config.gif_duration_cap_secs).max(1);

    tracing::info!(
        source = %source.display(),
        width,
        height,
        fps,
        quality,
        frames,
        duration = info.duration,
        "capturing GIF frames"
    );

    let mut encoder = Some(encoders.create(surface.width(), surface.height(), quality)?);
    let mut schedule = CaptureSchedule::new(fps, frames);
    let settle = config.seek_settle();

    loop {
        match schedule.next_step() {
            CaptureStep::Seek { frame, at } => {
                decoder.capture(source, at, &mut surface).await?;
                let Some(encoder) = encoder.as_mut() else {
                    return Err(ConvertError::Encode("frame captured after render".into()));
                };
                encoder.add_frame(&surface, delay_ms)?;
                progress.report_fraction(0.0, CAPTURE_SHARE, schedule.capture_fraction());
                tracing::trace!(frame, at, "captured frame");
                if settle > Duration::ZERO {
                    tokio::time::sleep(settle).await;
                }
            }
            CaptureStep::Render => {
                let encoder = encoder
                    .take()
                    .ok_or_else(|| ConvertError::Encode("render triggered twice".into()))?;
                let on_render = |p: f64| progress.report_fraction(CAPTURE_SHARE, 100.0 - CAPTURE_SHARE, p);
                let bytes = encoder.render(&on_render).await?;
                progress.report(100);
                tracing::info!(bytes = bytes.len(), frames = schedule.captured(), "GIF rendered");
                return Ok(bytes);
            }
            CaptureStep::Idle => {
                return Err(ConvertError::Encode("GIF render did not run".into()));
            }
        }
    }
}

/// GIF encoder backed by the `gif` crate's NeuQuant quantiser.
#[derive(Debug, Default, Clone, Copy)]
pub struct GifCrateEncoderFactory;

impl GifEncoderFactory for GifCrateEncoderFactory {
    fn create(&self, width: u16, height: u16, quality: u8) -> Result<Box<dyn GifEncoder>> {
        Ok(Box::new(GifCrateEncoder {
            width,
            height,
            // NeuQuant sampling factor: 1 samples every pixel, 30 is fastest.
            speed: quality.clamp(1, 30) as i32,
            frames: Vec::new(),
        }))
    }
}

pub struct GifCrateEncoder {
    width: u16,
    height: u16,
    speed: i32,
    frames: Vec<(Vec<u8>, u16)>,
}

/// GIF delays are stored in hundredths of a second.
fn delay_centis(delay_ms: f64) -> u16 {
    (delay_ms / 10.0).round().clamp(1.0, u16::MAX as f64) as u16
}

#[async_trait]
impl GifEncoder for GifCrateEncoder {
    fn add_frame(&mut self, surface: &Surface, delay_ms: f64) -> Result<()> {
        if surface.width() != self.width || surface.height() != self.height {
            return Err(ConvertError::Encode(format!(
                "frame is {}x{}, encoder expects {}x{}",
                surface.width(),
                surface.height(),
                self.width,
                self.height
            )));
        }
        self.frames.push((surface.pixels().to_vec(), delay_centis(delay_ms)));
        Ok(())
    }

    async fn render(self: Box<Self>, on_progress: &(dyn Fn(f64) + Send + Sync)) -> Result<Vec<u8>> {
        let GifCrateEncoder {
            width,
            height,
            speed,
            frames,
        } = *self;
        let total = frames.len().max(1);
        let mut buffer = Vec::new();

        {
            let mut encoder = Encoder::new(&mut buffer, width, height, &[])
                .map_err(|e| ConvertError::Encode(format!("failed to create encoder: {e}")))?;
            encoder
                .set_repeat(Repeat::Infinite)
                .map_err(|e| ConvertError::Encode(format!("failed to set repeat: {e}")))?;

            for (index, (mut pixels, delay)) in frames.into_iter().enumerate() {
                let mut frame = Frame::from_rgba_speed(width, height, &mut pixels, speed);
                frame.delay = delay;
                encoder
                    .write_frame(&frame)
                    .map_err(|e| ConvertError::Encode(format!("failed to write frame {index}: {e}")))?;
                on_progress((index + 1) as f64 / total as f64);
                // Quantising is CPU bound; let other tasks run between frames.
                tokio::task::yield_now().await;
            }
        }

        Ok(buffer)
    }
}
