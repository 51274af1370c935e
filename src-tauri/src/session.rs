//! Converter window state and its transitions.
//!
//! `Session::apply` is the only way to change state. It never performs I/O;
//! anything that touches the outside world comes back as an [`Effect`] for
//! the controller to run.

use std::path::PathBuf;

use serde::Serialize;
use tempfile::TempPath;

use crate::codec::Codec;
use crate::error::ConvertError;
use crate::intake::SourceFile;
use crate::options::{ConversionOptions, Dimensions};
use crate::presentation::{render_kind, size_label, RenderKind};
use crate::settings::{self, visible_params, VisibleParams};
use crate::urls::{Backing, ObjectUrl};

/// Output of a successful conversion, persisted to a temp file.
#[derive(Debug)]
pub struct Artifact {
    pub codec: Codec,
    pub size: u64,
    pub file: TempPath,
}

/// The artifact currently on display.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactInfo {
    pub url: ObjectUrl,
    pub path: PathBuf,
    pub codec: Codec,
    pub size: u64,
}

#[derive(Debug)]
pub enum Event {
    FileSelected(SourceFile),
    FileUnreadable { path: PathBuf, error: ConvertError },
    MetadataLoaded { generation: u64, dimensions: Dimensions },
    MetadataFailed { generation: u64, error: ConvertError },
    CodecChanged(Codec),
    BitrateChanged(u32),
    FpsChanged(Option<u32>),
    QualityChanged(Option<u8>),
    WidthChanged(Option<u32>),
    HeightChanged(Option<u32>),
    AspectLockChanged(bool),
    ConvertRequested,
    Progress(u8),
    ConversionFinished(Result<Artifact, ConvertError>),
    DownloadRequested,
    DownloadFinished(Result<PathBuf, ConvertError>),
    Teardown,
}

#[derive(Debug)]
pub enum Effect {
    /// Make `url` live. Always emitted before the revoke of the URL it replaces.
    Register { url: ObjectUrl, backing: Backing },
    Revoke(ObjectUrl),
    Probe { generation: u64, path: PathBuf },
    StartConversion { source: SourceFile, options: ConversionOptions },
    Save { artifact: PathBuf, codec: Codec },
}

#[derive(Debug)]
pub struct Session {
    file: Option<SourceFile>,
    generation: u64,
    preview_url: Option<ObjectUrl>,
    dimensions: Option<Dimensions>,
    options: ConversionOptions,
    aspect_lock: bool,
    converting: bool,
    progress: u8,
    error: Option<String>,
    artifact: Option<ArtifactInfo>,
    last_saved: Option<PathBuf>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(ConversionOptions::default())
    }
}

impl Session {
    pub fn new(options: ConversionOptions) -> Self {
        Self {
            file: None,
            generation: 0,
            preview_url: None,
            dimensions: None,
            options,
            aspect_lock: true,
            converting: false,
            progress: 0,
            error: None,
            artifact: None,
            last_saved: None,
        }
    }

    pub fn file(&self) -> Option<&SourceFile> {
        self.file.as_ref()
    }

    pub fn preview_url(&self) -> Option<&ObjectUrl> {
        self.preview_url.as_ref()
    }

    pub fn dimensions(&self) -> Option<Dimensions> {
        self.dimensions
    }

    pub fn options(&self) -> &ConversionOptions {
        &self.options
    }

    pub fn aspect_lock(&self) -> bool {
        self.aspect_lock
    }

    pub fn is_converting(&self) -> bool {
        self.converting
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn artifact(&self) -> Option<&ArtifactInfo> {
        self.artifact.as_ref()
    }

    pub fn apply(&mut self, event: Event) -> Vec<Effect> {
        let mut effects = Vec::new();
        match event {
            Event::FileSelected(file) => self.select_file(file, &mut effects),
            Event::FileUnreadable { path, error } => {
                tracing::warn!(path = %path.display(), %error, "cannot read selected file");
                self.error = Some(error.user_message());
            }
            Event::MetadataLoaded {
                generation,
                dimensions,
            } => {
                if generation == self.generation {
                    self.dimensions = Some(dimensions);
                    self.options.width = Some(dimensions.width);
                    self.options.height = Some(dimensions.height);
                } else {
                    tracing::debug!(generation, current = self.generation, "dropping stale metadata");
                }
            }
            Event::MetadataFailed { generation, error } => {
                if generation == self.generation {
                    self.error = Some(error.to_string());
                }
            }
            Event::CodecChanged(codec) => self.options.codec = codec,
            Event::BitrateChanged(bitrate) => self.options.bitrate = bitrate,
            Event::FpsChanged(fps) => self.options.fps = fps,
            Event::QualityChanged(quality) => self.options.quality = quality,
            Event::WidthChanged(width) => {
                settings::set_width(&mut self.options, width, self.aspect_lock, self.dimensions)
            }
            Event::HeightChanged(height) => {
                settings::set_height(&mut self.options, height, self.aspect_lock, self.dimensions)
            }
            Event::AspectLockChanged(lock) => self.aspect_lock = lock,
            Event::ConvertRequested => self.request_conversion(&mut effects),
            Event::Progress(progress) => {
                if self.converting {
                    self.progress = self.progress.max(progress.min(100));
                }
            }
            Event::ConversionFinished(result) => self.finish_conversion(result, &mut effects),
            Event::DownloadRequested => {
                if let Some(artifact) = &self.artifact {
                    effects.push(Effect::Save {
                        artifact: artifact.path.clone(),
                        codec: artifact.codec,
                    });
                }
            }
            Event::DownloadFinished(result) => match result {
                Ok(path) => {
                    self.last_saved = Some(path);
                    self.error = None;
                }
                Err(error) => self.error = Some(format!("download failed: {error}")),
            },
            Event::Teardown => {
                effects.extend(self.preview_url.take().map(Effect::Revoke));
                effects.extend(self.artifact.take().map(|a| Effect::Revoke(a.url)));
            }
        }
        effects
    }

    fn select_file(&mut self, file: SourceFile, effects: &mut Vec<Effect>) {
        if !file.is_video() {
            let error = ConvertError::NotAVideo { mime: file.mime.clone() };
            tracing::info!(name = %file.name, mime = %file.mime, "rejected non-video file");
            self.error = Some(error.user_message());
            return;
        }

        self.generation += 1;

        // Repoint the preview before releasing the URL it replaces.
        let url = ObjectUrl::for_path(&file.path);
        effects.push(Effect::Register {
            url: url.clone(),
            backing: Backing::Borrowed(file.path.clone()),
        });
        if let Some(previous) = self.preview_url.replace(url) {
            effects.push(Effect::Revoke(previous));
        }

        if let Some(artifact) = self.artifact.take() {
            effects.push(Effect::Revoke(artifact.url));
        }

        effects.push(Effect::Probe {
            generation: self.generation,
            path: file.path.clone(),
        });

        tracing::info!(name = %file.name, size = file.size, "selected file");
        self.dimensions = None;
        self.error = None;
        self.last_saved = None;
        self.file = Some(file);
    }

    fn request_conversion(&mut self, effects: &mut Vec<Effect>) {
        let Some(file) = &self.file else {
            self.error = Some(ConvertError::NoFileSelected.user_message());
            return;
        };
        if self.converting {
            tracing::debug!("conversion already running");
            self.error = Some(ConvertError::Busy.user_message());
            return;
        }
        self.converting = true;
        self.progress = 0;
        self.error = None;
        effects.push(Effect::StartConversion {
            source: file.clone(),
            options: self.options.clone(),
        });
    }

    fn finish_conversion(&mut self, result: Result<Artifact, ConvertError>, effects: &mut Vec<Effect>) {
        self.converting = false;
        self.progress = 0;

        match result {
            Ok(artifact) => {
                let path = artifact.file.to_path_buf();
                let url = ObjectUrl::for_path(&path);
                effects.push(Effect::Register {
                    url: url.clone(),
                    backing: Backing::Owned(artifact.file),
                });
                let next = ArtifactInfo {
                    url,
                    path,
                    codec: artifact.codec,
                    size: artifact.size,
                };
                if let Some(previous) = self.artifact.replace(next) {
                    effects.push(Effect::Revoke(previous.url));
                }
                self.error = None;
            }
            Err(error) => {
                // The previous artifact, if any, stays on display.
                self.error = Some(error.user_message());
            }
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            file: self.file.as_ref().map(|file| FileView {
                name: file.name.clone(),
                mime: file.mime.clone(),
                size_label: file.size_label(),
            }),
            preview_url: self.preview_url.clone(),
            dimensions: self.dimensions,
            options: self.options.clone(),
            aspect_lock: self.aspect_lock,
            visible: visible_params(self.options.codec),
            converting: self.converting,
            can_convert: self.file.is_some() && !self.converting,
            progress: self.progress,
            error: self.error.clone(),
            result: ResultView {
                url: self.artifact.as_ref().map(|a| a.url.clone()),
                render: self.artifact.as_ref().map(|a| render_kind(a.codec)),
                size_label: size_label(self.artifact.as_ref().map(|a| a.size)),
                download_enabled: self.artifact.is_some(),
            },
            last_saved: self.last_saved.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileView {
    pub name: String,
    pub mime: String,
    pub size_label: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultView {
    pub url: Option<ObjectUrl>,
    pub render: Option<RenderKind>,
    pub size_label: String,
    pub download_enabled: bool,
}

/// Snapshot of the session sent to the window.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub file: Option<FileView>,
    pub preview_url: Option<ObjectUrl>,
    pub dimensions: Option<Dimensions>,
    pub options: ConversionOptions,
    pub aspect_lock: bool,
    pub visible: VisibleParams,
    pub converting: bool,
    pub can_convert: bool,
    pub progress: u8,
    pub error: Option<String>,
    pub result: ResultView,
    pub last_saved: Option<PathBuf>,
}
