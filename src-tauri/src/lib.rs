pub mod animation;
pub mod codec;
pub mod config;
pub mod controller;
pub mod converter;
pub mod download;
pub mod error;
pub mod ffmpeg;
pub mod intake;
pub mod media;
pub mod options;
pub mod presentation;
pub mod progress;
pub mod session;
pub mod settings;
pub mod transcode;
pub mod urls;

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tauri::{DragDropEvent, Emitter, Manager, WindowEvent};
use tauri_plugin_store::StoreExt;
use tracing_subscriber::EnvFilter;

use animation::GifCrateEncoderFactory;
use codec::{Codec, CodecDescriptor};
use config::{ConverterConfig, STORE_FILE, STORE_KEY};
use controller::{Controller, Notifier};
use converter::Converter;
use ffmpeg::{FfmpegDecoder, FfmpegTools};
use session::{Event, SessionView};
use settings::{parse_field, BITRATE_CHOICES, FPS_CHOICES, QUALITY_CHOICES};
use transcode::FfmpegTranscoder;

type ControllerState<'a> = tauri::State<'a, Arc<Controller>>;

#[derive(Debug, Clone, Serialize)]
struct ProgressPayload {
    progress: u8,
}

struct WindowNotifier {
    app: tauri::AppHandle,
}

impl Notifier for WindowNotifier {
    fn progress(&self, percent: u8) {
        let _ = self.app.emit("conversion-progress", ProgressPayload { progress: percent });
    }

    fn session_changed(&self, view: &SessionView) {
        let _ = self.app.emit("session-changed", view);
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct Choice<T> {
    value: T,
    label: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct FormChoices {
    codecs: Vec<CodecDescriptor>,
    fps: Vec<Choice<u32>>,
    quality: Vec<Choice<u8>>,
    bitrate: Vec<Choice<u32>>,
    notices: Vec<String>,
}

#[tauri::command]
fn list_codecs(controller: ControllerState<'_>) -> FormChoices {
    FormChoices {
        codecs: codec::descriptors(),
        fps: FPS_CHOICES
            .iter()
            .map(|&fps| Choice {
                value: fps,
                label: format!("{fps} fps"),
            })
            .collect(),
        quality: QUALITY_CHOICES
            .iter()
            .map(|&(value, label)| Choice {
                value,
                label: label.to_string(),
            })
            .collect(),
        bitrate: BITRATE_CHOICES
            .iter()
            .map(|&(value, label)| Choice {
                value,
                label: label.to_string(),
            })
            .collect(),
        notices: presentation::notices(controller.config().gif_duration_cap_secs),
    }
}

#[tauri::command]
fn get_state(controller: ControllerState<'_>) -> SessionView {
    controller.view()
}

#[tauri::command]
async fn select_file(controller: ControllerState<'_>, path: String) -> Result<SessionView, String> {
    Ok(controller.select_path(PathBuf::from(path)).await)
}

#[tauri::command]
async fn set_codec(controller: ControllerState<'_>, codec: Codec) -> Result<SessionView, String> {
    Ok(controller.handle(Event::CodecChanged(codec)).await)
}

#[tauri::command]
async fn set_bitrate(controller: ControllerState<'_>, bitrate: u32) -> Result<SessionView, String> {
    Ok(controller.handle(Event::BitrateChanged(bitrate)).await)
}

#[tauri::command]
async fn set_fps(controller: ControllerState<'_>, value: String) -> Result<SessionView, String> {
    let fps = parse_field::<u32>("fps", &value).map_err(|e| e.to_string())?;
    Ok(controller.handle(Event::FpsChanged(fps)).await)
}

#[tauri::command]
async fn set_quality(controller: ControllerState<'_>, value: String) -> Result<SessionView, String> {
    let quality = parse_field::<u8>("quality", &value).map_err(|e| e.to_string())?;
    Ok(controller.handle(Event::QualityChanged(quality)).await)
}

#[tauri::command]
async fn set_width(controller: ControllerState<'_>, value: String) -> Result<SessionView, String> {
    let width = parse_field::<u32>("width", &value).map_err(|e| e.to_string())?;
    Ok(controller.handle(Event::WidthChanged(width)).await)
}

#[tauri::command]
async fn set_height(controller: ControllerState<'_>, value: String) -> Result<SessionView, String> {
    let height = parse_field::<u32>("height", &value).map_err(|e| e.to_string())?;
    Ok(controller.handle(Event::HeightChanged(height)).await)
}

#[tauri::command]
async fn set_aspect_lock(controller: ControllerState<'_>, locked: bool) -> Result<SessionView, String> {
    Ok(controller.handle(Event::AspectLockChanged(locked)).await)
}

#[tauri::command]
async fn convert(controller: ControllerState<'_>) -> Result<SessionView, String> {
    Ok(controller.handle(Event::ConvertRequested).await)
}

#[tauri::command]
async fn download(controller: ControllerState<'_>) -> Result<SessionView, String> {
    Ok(controller.handle(Event::DownloadRequested).await)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("media_converter_lib=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn load_config(app: &tauri::AppHandle) -> ConverterConfig {
    match app.store(STORE_FILE) {
        Ok(store) => ConverterConfig::from_store_value(store.get(STORE_KEY)),
        Err(e) => {
            tracing::warn!(error = %e, "settings store unavailable, using defaults");
            ConverterConfig::default()
        }
    }
}

fn controller_of(window: &tauri::Window) -> Option<Arc<Controller>> {
    window.try_state::<Arc<Controller>>().map(|state| state.inner().clone())
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    init_tracing();

    tauri::Builder::default()
        .plugin(tauri_plugin_store::Builder::new().build())
        .setup(|app| {
            let config = load_config(app.handle());
            let resource_dir = app.path().resource_dir().ok();
            let tools = FfmpegTools::locate(resource_dir.as_deref());

            let converter = Converter::new(
                Arc::new(FfmpegDecoder::new(tools.clone())),
                Arc::new(GifCrateEncoderFactory),
                Arc::new(FfmpegTranscoder::new(tools)),
                config.clone(),
            );
            let download_dir = config
                .download_dir
                .clone()
                .or_else(|| app.path().download_dir().ok())
                .unwrap_or_else(std::env::temp_dir);
            let notifier = Arc::new(WindowNotifier {
                app: app.handle().clone(),
            });

            tracing::info!(download_dir = %download_dir.display(), ?config, "converter ready");
            app.manage(Arc::new(Controller::new(converter, notifier, download_dir)));
            Ok(())
        })
        .on_window_event(|window, event| match event {
            WindowEvent::DragDrop(DragDropEvent::Drop { paths, .. }) => {
                let (Some(controller), Some(path)) = (controller_of(window), paths.first().cloned()) else {
                    return;
                };
                tauri::async_runtime::spawn(async move {
                    controller.select_path(path).await;
                });
            }
            WindowEvent::Destroyed => {
                if let Some(controller) = controller_of(window) {
                    tauri::async_runtime::block_on(controller.shutdown());
                }
            }
            _ => {}
        })
        .invoke_handler(tauri::generate_handler![
            list_codecs,
            get_state,
            select_file,
            set_codec,
            set_bitrate,
            set_fps,
            set_quality,
            set_width,
            set_height,
            set_aspect_lock,
            convert,
            download
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
