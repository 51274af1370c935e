use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use media_converter_lib::animation::GifCrateEncoderFactory;
use media_converter_lib::codec::Codec;
use media_converter_lib::config::ConverterConfig;
use media_converter_lib::controller::{Controller, Notifier};
use media_converter_lib::converter::Converter;
use media_converter_lib::error::{ConvertError, Result};
use media_converter_lib::media::{MediaDecoder, MediaInfo, Surface};
use media_converter_lib::options::Dimensions;
use media_converter_lib::presentation::RenderKind;
use media_converter_lib::session::{Event, SessionView};
use media_converter_lib::transcode::{TranscodeRequest, Transcoder};

struct FakeDecoder {
    info: MediaInfo,
    available: bool,
    load_failure: Option<&'static str>,
    capture_delay: Option<Duration>,
    captures: Mutex<Vec<f64>>,
}

impl FakeDecoder {
    fn new(width: u32, height: u32, duration: f64) -> Self {
        Self {
            info: MediaInfo {
                width,
                height,
                duration,
            },
            available: true,
            load_failure: None,
            capture_delay: None,
            captures: Mutex::new(Vec::new()),
        }
    }

    fn failing_load(message: &'static str) -> Self {
        Self {
            load_failure: Some(message),
            ..Self::new(8, 6, 5.0)
        }
    }

    fn stalling() -> Self {
        Self {
            capture_delay: Some(Duration::from_secs(3600)),
            ..Self::new(4, 4, 5.0)
        }
    }

    fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(8, 6, 1.0)
        }
    }
}

#[async_trait]
impl MediaDecoder for FakeDecoder {
    async fn available(&self) -> bool {
        self.available
    }

    async fn load(&self, source: &Path) -> Result<MediaInfo> {
        match self.load_failure {
            Some(message) => Err(ConvertError::MediaLoad {
                path: source.to_path_buf(),
                message: message.to_string(),
            }),
            None => Ok(self.info),
        }
    }

    async fn capture(&self, _source: &Path, at: f64, surface: &mut Surface) -> Result<()> {
        self.captures.lock().unwrap().push(at);
        if let Some(delay) = self.capture_delay {
            tokio::time::sleep(delay).await;
        }
        let shade = ((at * 40.0) as u32 % 256) as u8;
        for px in surface.pixels_mut().chunks_exact_mut(4) {
            px.copy_from_slice(&[shade, 255 - shade, 128, 255]);
        }
        Ok(())
    }
}

struct FakeTranscoder {
    output: Option<Vec<u8>>,
    requests: Mutex<Vec<TranscodeRequest>>,
}

impl FakeTranscoder {
    fn producing(output: Option<Vec<u8>>) -> Self {
        Self {
            output,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn available(&self) -> bool {
        true
    }

    async fn transcode(
        &self,
        _input: &Path,
        request: &TranscodeRequest,
        on_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<Option<Vec<u8>>> {
        self.requests.lock().unwrap().push(request.clone());
        for p in [0.25, 0.5, 0.4, 0.75] {
            on_progress(p);
        }
        Ok(self.output.clone())
    }
}

#[derive(Default)]
struct Recorder {
    progress: Mutex<Vec<u8>>,
    views: Mutex<Vec<SessionView>>,
}

impl Notifier for Recorder {
    fn progress(&self, percent: u8) {
        self.progress.lock().unwrap().push(percent);
    }

    fn session_changed(&self, view: &SessionView) {
        self.views.lock().unwrap().push(view.clone());
    }
}

struct Harness {
    dir: TempDir,
    controller: Controller,
    decoder: Arc<FakeDecoder>,
    transcoder: Arc<FakeTranscoder>,
    recorder: Arc<Recorder>,
}

impl Harness {
    fn new(decoder: FakeDecoder, transcoder: FakeTranscoder) -> Self {
        Self::with_config(decoder, transcoder, test_config())
    }

    fn with_config(decoder: FakeDecoder, transcoder: FakeTranscoder, config: ConverterConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let decoder = Arc::new(decoder);
        let transcoder = Arc::new(transcoder);
        let recorder = Arc::new(Recorder::default());
        let converter = Converter::new(
            decoder.clone(),
            Arc::new(GifCrateEncoderFactory),
            transcoder.clone(),
            config,
        );
        let controller = Controller::new(converter, recorder.clone(), dir.path().join("downloads"));
        Self {
            dir,
            controller,
            decoder,
            transcoder,
            recorder,
        }
    }

    fn write_source(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, vec![0u8; 4096]).unwrap();
        path
    }

    fn progress(&self) -> Vec<u8> {
        self.recorder.progress.lock().unwrap().clone()
    }

    fn views(&self) -> Vec<SessionView> {
        self.recorder.views.lock().unwrap().clone()
    }

    fn clear_views(&self) {
        self.recorder.views.lock().unwrap().clear();
    }
}

fn test_config() -> ConverterConfig {
    ConverterConfig {
        seek_settle_ms: 0,
        ..ConverterConfig::default()
    }
}

fn assert_monotonic(values: &[u8]) {
    assert!(
        values.windows(2).all(|w| w[0] <= w[1]),
        "progress went backwards: {values:?}"
    );
}

#[tokio::test]
async fn gif_conversion_end_to_end() {
    let h = Harness::new(FakeDecoder::new(8, 6, 5.0), FakeTranscoder::producing(None));
    let source = h.write_source("clip.mp4");

    let view = h.controller.select_path(source).await;
    assert_eq!(view.dimensions, Some(Dimensions::new(8, 6)));
    assert_eq!((view.options.width, view.options.height), (Some(8), Some(6)));
    assert!(view.preview_url.is_some());
    assert!(view.can_convert);

    h.controller.handle(Event::FpsChanged(Some(5))).await;
    let view = h.controller.handle(Event::ConvertRequested).await;

    assert!(!view.converting);
    assert_eq!(view.progress, 0);
    assert_eq!(view.error, None);
    assert_eq!(view.result.render, Some(RenderKind::Image));
    assert!(view.result.url.is_some());
    assert_ne!(view.result.size_label, "---");
    assert!(view.result.download_enabled);

    let captures = h.decoder.captures.lock().unwrap().clone();
    assert_eq!(captures.len(), 25);
    assert_eq!(captures[0], 0.0);
    assert!((captures[24] - 4.8).abs() < 1e-9);

    let progress = h.progress();
    assert_eq!(progress.first(), Some(&0));
    assert_eq!(progress.last(), Some(&100));
    assert_monotonic(&progress);

    // preview and artifact
    assert_eq!(h.controller.live_urls(), 2);
    assert_eq!(h.controller.revoked_urls(), 0);

    let view = h.controller.handle(Event::DownloadRequested).await;
    let saved = view.last_saved.expect("saved path");
    assert_eq!(saved.file_name().unwrap(), "converted_animation.gif");
    let bytes = fs::read(&saved).unwrap();
    assert_eq!(&bytes[..6], b"GIF89a");
    assert_eq!(bytes.last(), Some(&0x3B));
    assert_eq!(h.controller.live_urls(), 2);
    assert_eq!(h.controller.revoked_urls(), 1);
}

#[tokio::test]
async fn long_sources_are_capped() {
    let h = Harness::new(FakeDecoder::new(4, 4, 60.0), FakeTranscoder::producing(None));
    h.controller.select_path(h.write_source("long.mov")).await;
    h.controller.handle(Event::ConvertRequested).await;
    // 10 s cap at the default 10 fps
    assert_eq!(h.decoder.captures.lock().unwrap().len(), 100);
}

#[tokio::test]
async fn sub_frame_clips_still_produce_one_frame() {
    let h = Harness::new(FakeDecoder::new(4, 4, 0.05), FakeTranscoder::producing(None));
    h.controller.select_path(h.write_source("blip.webm")).await;
    let view = h.controller.handle(Event::ConvertRequested).await;
    assert_eq!(h.decoder.captures.lock().unwrap().len(), 1);
    assert_eq!(view.result.render, Some(RenderKind::Image));
}

#[tokio::test]
async fn non_video_files_are_rejected() {
    let h = Harness::new(FakeDecoder::new(8, 6, 5.0), FakeTranscoder::producing(None));
    let view = h.controller.select_path(h.write_source("notes.txt")).await;

    assert_eq!(view.error.as_deref(), Some("select a video file"));
    assert!(view.file.is_none());
    assert!(!view.can_convert);
    assert_eq!(h.controller.live_urls(), 0);

    let view = h.controller.handle(Event::ConvertRequested).await;
    assert!(!view.converting);
    assert!(h.progress().is_empty());
}

#[tokio::test]
async fn missing_files_surface_an_error() {
    let h = Harness::new(FakeDecoder::new(8, 6, 5.0), FakeTranscoder::producing(None));
    let missing = h.dir.path().join("gone.mp4");
    let view = h.controller.select_path(missing.clone()).await;

    let error = view.error.expect("error for a missing file");
    assert!(
        error.starts_with(&format!("cannot read {}", missing.display())),
        "{error}"
    );
    assert!(!error.contains("conversion failed"), "{error}");
    assert!(view.file.is_none());
    assert!(!view.can_convert);
}

#[tokio::test]
async fn reselecting_revokes_the_previous_preview_once() {
    let h = Harness::new(FakeDecoder::new(8, 6, 5.0), FakeTranscoder::producing(None));
    let first = h.controller.select_path(h.write_source("a.mp4")).await;
    let second = h.controller.select_path(h.write_source("b.mp4")).await;

    assert_ne!(first.preview_url, second.preview_url);
    assert_eq!(h.controller.live_urls(), 1);
    assert_eq!(h.controller.revoked_urls(), 1);
}

#[tokio::test]
async fn transcode_without_output_resets_state() {
    let h = Harness::new(FakeDecoder::new(640, 360, 5.0), FakeTranscoder::producing(None));
    h.controller.select_path(h.write_source("clip.mp4")).await;
    h.controller.handle(Event::CodecChanged(Codec::Vp9)).await;

    let view = h.controller.handle(Event::ConvertRequested).await;
    assert!(!view.converting);
    assert_eq!(view.progress, 0);
    assert_eq!(
        view.error.as_deref(),
        Some("conversion failed: the transcoder produced no output")
    );
    assert!(view.result.url.is_none());
    assert!(view.can_convert);
}

#[tokio::test]
async fn audio_transcode_shows_a_playable_result() {
    let h = Harness::new(
        FakeDecoder::new(640, 360, 5.0),
        FakeTranscoder::producing(Some(vec![7u8; 2048])),
    );
    h.controller.select_path(h.write_source("clip.mkv")).await;
    h.controller.handle(Event::CodecChanged(Codec::Flac)).await;

    let view = h.controller.handle(Event::ConvertRequested).await;
    assert_eq!(view.error, None);
    assert_eq!(view.result.render, Some(RenderKind::Video));
    assert_eq!(view.result.size_label, "2.00 KB");

    let progress = h.progress();
    assert_eq!(progress, vec![0, 25, 50, 75, 100]);

    let requests = h.transcoder.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].codec, Codec::Flac);
    assert!(requests[0].video.is_none());

    let view = h.controller.handle(Event::DownloadRequested).await;
    let saved = view.last_saved.unwrap();
    assert_eq!(saved.file_name().unwrap(), "converted_audio.flac");
    assert_eq!(fs::read(saved).unwrap(), vec![7u8; 2048]);
}

#[tokio::test]
async fn missing_decoder_is_reported_before_any_work() {
    let h = Harness::new(FakeDecoder::unavailable(), FakeTranscoder::producing(None));
    h.controller.select_path(h.write_source("clip.mp4")).await;

    let view = h.controller.handle(Event::ConvertRequested).await;
    let expected = ConvertError::UnsupportedEnvironment("video decoding (ffmpeg)".into()).to_string();
    assert_eq!(view.error, Some(expected));
    assert!(!view.converting);
    assert!(h.decoder.captures.lock().unwrap().is_empty());
}

#[tokio::test]
async fn teardown_releases_every_url() {
    let h = Harness::new(FakeDecoder::new(4, 4, 1.0), FakeTranscoder::producing(None));
    h.controller.select_path(h.write_source("clip.mp4")).await;
    h.controller.handle(Event::ConvertRequested).await;
    assert_eq!(h.controller.live_urls(), 2);

    h.controller.shutdown().await;
    assert_eq!(h.controller.live_urls(), 0);
    assert_eq!(h.controller.revoked_urls(), 2);
}

#[tokio::test]
async fn configured_quality_seeds_the_form() {
    let config = ConverterConfig {
        default_gif_quality: 20,
        ..test_config()
    };
    let h = Harness::with_config(
        FakeDecoder::new(4, 4, 1.0),
        FakeTranscoder::producing(None),
        config,
    );
    assert_eq!(h.controller.view().options.quality, Some(20));
}

#[tokio::test]
async fn every_handled_event_notifies_the_window() {
    let h = Harness::new(FakeDecoder::new(4, 4, 1.0), FakeTranscoder::producing(None));
    h.controller.select_path(h.write_source("clip.mp4")).await;
    h.controller.handle(Event::AspectLockChanged(false)).await;

    let views = h.views();
    // selection, probe result, lock toggle
    assert_eq!(views.len(), 3);
    assert!(views[0].preview_url.is_some());
    assert_eq!(views[0].dimensions, None);
    assert_eq!(views[1].dimensions, Some(Dimensions::new(4, 4)));
    assert!(!views[2].aspect_lock);
}

#[tokio::test]
async fn window_sees_the_conversion_while_it_runs() {
    let h = Harness::new(FakeDecoder::new(4, 4, 1.0), FakeTranscoder::producing(None));
    h.controller.select_path(h.write_source("clip.mp4")).await;
    h.clear_views();

    let done = h.controller.handle(Event::ConvertRequested).await;

    let views = h.views();
    let running = views.first().expect("a view for the started conversion");
    assert!(running.converting);
    assert!(!running.can_convert);
    assert_eq!(running.progress, 0);

    let last = views.last().unwrap();
    assert!(!last.converting);
    assert!(last.can_convert);
    assert_eq!(last.result.render, Some(RenderKind::Image));
    assert!(!done.converting);
}

#[tokio::test(start_paused = true)]
async fn dropped_conversion_resets_the_session() {
    let h = Harness::new(FakeDecoder::stalling(), FakeTranscoder::producing(None));
    h.controller.select_path(h.write_source("clip.mp4")).await;

    let outcome = tokio::time::timeout(
        Duration::from_millis(50),
        h.controller.handle(Event::ConvertRequested),
    )
    .await;
    assert!(outcome.is_err(), "conversion should still be stalled");
    assert_eq!(h.decoder.captures.lock().unwrap().len(), 1);

    let view = h.controller.view();
    assert!(!view.converting);
    assert!(view.can_convert);
    assert_eq!(view.progress, 0);
    assert_eq!(
        view.error.as_deref(),
        Some("conversion failed: conversion was interrupted")
    );
    // the guard tells the window as well
    assert!(!h.views().last().unwrap().converting);
}

#[tokio::test]
async fn gif_source_load_failure_is_reported_and_resets() {
    let h = Harness::new(
        FakeDecoder::failing_load("moov atom not found"),
        FakeTranscoder::producing(None),
    );
    let source = h.write_source("broken.mp4");
    h.controller.select_path(source.clone()).await;

    let view = h.controller.handle(Event::ConvertRequested).await;
    assert_eq!(
        view.error,
        Some(format!(
            "conversion failed: failed to load {}: moov atom not found",
            source.display()
        ))
    );
    assert!(!view.converting);
    assert!(view.can_convert);
    assert_eq!(view.progress, 0);
    assert!(view.result.url.is_none());
    assert!(h.decoder.captures.lock().unwrap().is_empty());
}
