//! Transcoding pipeline for every non-GIF codec.

use std::path::Path;

use async_trait::async_trait;

use crate::codec::{Codec, Container};
use crate::error::{ConvertError, Result};
use crate::ffmpeg::{get_video_info, run_ffmpeg_with_progress, FfmpegTools};
use crate::options::ConversionOptions;
use crate::progress::ProgressReporter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fit {
    /// Scale to fit inside the box, keeping the source aspect ratio.
    Contain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoConstraints {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub bitrate: Option<u32>,
    pub fit: Option<Fit>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioConstraints {
    pub bitrate: Option<u32>,
}

/// What the transcoder is asked to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeRequest {
    pub codec: Codec,
    pub container: Container,
    pub video: Option<VideoConstraints>,
    pub audio: Option<AudioConstraints>,
}

impl TranscodeRequest {
    pub fn from_options(options: &ConversionOptions) -> Self {
        let bitrate = options.bitrate_constraint();

        let video = (options.codec.is_video()
            && (options.width.is_some() || options.height.is_some() || bitrate.is_some()))
        .then(|| VideoConstraints {
            width: options.width,
            height: options.height,
            bitrate,
            fit: (options.width.is_some() && options.height.is_some()).then_some(Fit::Contain),
        });

        let audio = options
            .codec
            .is_audio()
            .then_some(AudioConstraints { bitrate });

        Self {
            codec: options.codec,
            container: options.codec.container(),
            video,
            audio,
        }
    }
}

/// Container/codec transcoding capability.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn available(&self) -> bool;

    /// Transcode `input`. `on_progress` receives `0.0..=1.0`. `Ok(None)` means
    /// the run finished without producing an output buffer.
    async fn transcode(
        &self,
        input: &Path,
        request: &TranscodeRequest,
        on_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<Option<Vec<u8>>>;
}

pub async fn convert_transcoded(
    transcoder: &dyn Transcoder,
    source: &Path,
    options: &ConversionOptions,
    progress: &ProgressReporter<'_>,
) -> Result<Vec<u8>> {
    let request = TranscodeRequest::from_options(options);
    tracing::info!(
        source = %source.display(),
        codec = %request.codec,
        container = request.container.ffmpeg_format(),
        video = ?request.video,
        audio = ?request.audio,
        "transcoding"
    );

    let on_progress = |p: f64| progress.report_fraction(0.0, 100.0, p);
    let output = transcoder.transcode(source, &request, &on_progress).await?;

    match output {
        Some(bytes) if !bytes.is_empty() => {
            progress.report(100);
            Ok(bytes)
        }
        _ => Err(ConvertError::NoOutput),
    }
}

/// ffmpeg encoder name for a codec; `None` for GIF, which never transcodes.
pub fn ffmpeg_encoder(codec: Codec) -> Option<&'static str> {
    match codec {
        Codec::Gif => None,
        Codec::Avc => Some("libx264"),
        Codec::Hevc => Some("libx265"),
        Codec::Vp8 => Some("libvpx"),
        Codec::Vp9 => Some("libvpx-vp9"),
        Codec::Av1Mp4 | Codec::Av1Webm => Some("libaom-av1"),
        Codec::Aac | Codec::Adts => Some("aac"),
        Codec::Mp3 => Some("libmp3lame"),
        Codec::Opus => Some("libopus"),
        Codec::Vorbis | Codec::Ogg => Some("libvorbis"),
        Codec::Flac => Some("flac"),
        Codec::Pcm | Codec::Wav => Some("pcm_s16le"),
    }
}

fn is_lossless(codec: Codec) -> bool {
    matches!(codec, Codec::Flac | Codec::Pcm | Codec::Wav)
}

fn scale_filter(video: &VideoConstraints) -> Option<String> {
    match (video.width, video.height, video.fit) {
        (Some(w), Some(h), Some(Fit::Contain)) => Some(format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,scale=trunc(iw/2)*2:trunc(ih/2)*2"
        )),
        (Some(w), Some(h), None) => Some(format!("scale={w}:{h}")),
        (Some(w), None, _) => Some(format!("scale={w}:-2")),
        (None, Some(h), _) => Some(format!("scale=-2:{h}")),
        (None, None, _) => None,
    }
}

/// Arguments after the global progress flags: input, track settings, output.
pub fn build_args(input: &Path, output: &Path, request: &TranscodeRequest) -> Result<Vec<String>> {
    let encoder = ffmpeg_encoder(request.codec).ok_or_else(|| {
        ConvertError::Transcode(format!("{} output is not produced by the transcoder", request.codec))
    })?;

    let mut args: Vec<String> = vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
    ];

    if request.codec.is_audio() {
        args.push("-vn".to_string());
        args.extend(["-c:a".to_string(), encoder.to_string()]);
        if let Some(bitrate) = request.audio.as_ref().and_then(|a| a.bitrate) {
            if !is_lossless(request.codec) {
                args.extend(["-b:a".to_string(), bitrate.to_string()]);
            }
        }
    } else {
        args.extend(["-c:v".to_string(), encoder.to_string()]);
        if let Some(video) = &request.video {
            if let Some(bitrate) = video.bitrate {
                args.extend(["-b:v".to_string(), bitrate.to_string()]);
            }
            if let Some(filter) = scale_filter(video) {
                args.extend(["-vf".to_string(), filter]);
            }
        }
        if request.codec == Codec::Hevc {
            args.extend(["-tag:v".to_string(), "hvc1".to_string()]); // Better Apple compatibility
        }
        if matches!(request.codec, Codec::Av1Mp4 | Codec::Av1Webm) {
            args.extend(["-cpu-used".to_string(), "6".to_string()]);
        }
    }

    if request.container == Container::Mp4 {
        args.extend(["-movflags".to_string(), "+faststart".to_string()]);
    }

    args.extend([
        "-f".to_string(),
        request.container.ffmpeg_format().to_string(),
        output.to_string_lossy().to_string(),
    ]);
    Ok(args)
}

/// Transcoder driving an ffmpeg subprocess into a temp file.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    tools: FfmpegTools,
}

impl FfmpegTranscoder {
    pub fn new(tools: FfmpegTools) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn available(&self) -> bool {
        self.tools.available().await
    }

    async fn transcode(
        &self,
        input: &Path,
        request: &TranscodeRequest,
        on_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<Option<Vec<u8>>> {
        // Progress needs the duration; without it only completion is reported.
        let duration = match get_video_info(&self.tools.ffprobe, input).await {
            Ok(info) => Some(info.duration),
            Err(e) => {
                tracing::warn!(error = %e, "no duration for progress reporting");
                None
            }
        };

        let output = tempfile::Builder::new()
            .prefix("converted_")
            .suffix(&format!(".{}", request.container.extension()))
            .tempfile()?
            .into_temp_path();

        let args = build_args(input, &output, request)?;
        run_ffmpeg_with_progress(&self.tools.ffmpeg, &args, duration, |p| on_progress(p))
            .await
            .map_err(|e| ConvertError::Transcode(e.to_string()))?;

        match tokio::fs::read(&output).await {
            Ok(bytes) if !bytes.is_empty() => Ok(Some(bytes)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
