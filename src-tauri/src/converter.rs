use std::sync::Arc;

use crate::animation::{convert_gif, GifEncoderFactory};
use crate::codec::Codec;
use crate::config::ConverterConfig;
use crate::error::{ConvertError, Result};
use crate::intake::SourceFile;
use crate::media::MediaDecoder;
use crate::options::ConversionOptions;
use crate::progress::{ProgressFn, ProgressReporter};
use crate::transcode::{convert_transcoded, Transcoder};

/// Routes a conversion request to the GIF pipeline or the transcoder.
#[derive(Clone)]
pub struct Converter {
    decoder: Arc<dyn MediaDecoder>,
    gif_encoders: Arc<dyn GifEncoderFactory>,
    transcoder: Arc<dyn Transcoder>,
    config: ConverterConfig,
}

impl Converter {
    pub fn new(
        decoder: Arc<dyn MediaDecoder>,
        gif_encoders: Arc<dyn GifEncoderFactory>,
        transcoder: Arc<dyn Transcoder>,
        config: ConverterConfig,
    ) -> Self {
        Self {
            decoder,
            gif_encoders,
            transcoder,
            config,
        }
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    pub fn decoder(&self) -> &dyn MediaDecoder {
        self.decoder.as_ref()
    }

    /// Convert `source` according to `options`, reporting 0–100 through
    /// `on_progress`. Reported values never decrease.
    pub async fn convert(
        &self,
        source: &SourceFile,
        options: &ConversionOptions,
        on_progress: ProgressFn<'_>,
    ) -> Result<Vec<u8>> {
        if options.codec == Codec::Gif {
            self.convert_gif(source, options, on_progress).await
        } else {
            self.convert_transcoded(source, options, on_progress).await
        }
    }

    /// GIF-only entry point.
    pub async fn convert_gif(
        &self,
        source: &SourceFile,
        options: &ConversionOptions,
        on_progress: ProgressFn<'_>,
    ) -> Result<Vec<u8>> {
        if !self.decoder.available().await {
            return Err(ConvertError::UnsupportedEnvironment("video decoding (ffmpeg)".into()));
        }
        let progress = ProgressReporter::start(on_progress);
        convert_gif(
            self.decoder.as_ref(),
            self.gif_encoders.as_ref(),
            &self.config,
            &source.path,
            options,
            &progress,
        )
        .await
    }

    async fn convert_transcoded(
        &self,
        source: &SourceFile,
        options: &ConversionOptions,
        on_progress: ProgressFn<'_>,
    ) -> Result<Vec<u8>> {
        if !self.transcoder.available().await {
            return Err(ConvertError::UnsupportedEnvironment("transcoding (ffmpeg)".into()));
        }
        let progress = ProgressReporter::start(on_progress);
        convert_transcoded(self.transcoder.as_ref(), &source.path, options, &progress).await
    }
}
