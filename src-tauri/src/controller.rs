//! Runs session events and the effects they produce.

use std::collections::VecDeque;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::ConverterConfig;
use crate::converter::Converter;
use crate::download;
use crate::error::{ConvertError, Result};
use crate::intake::{probe_dimensions, SourceFile};
use crate::options::ConversionOptions;
use crate::session::{Artifact, Effect, Event, Session, SessionView};
use crate::urls::UrlRegistry;

/// Receives updates meant for the window.
pub trait Notifier: Send + Sync {
    fn progress(&self, percent: u8);
    fn session_changed(&self, view: &SessionView);
}

/// Notifier that drops everything.
pub struct Silent;

impl Notifier for Silent {
    fn progress(&self, _percent: u8) {}
    fn session_changed(&self, _view: &SessionView) {}
}

pub struct Controller {
    session: Mutex<Session>,
    urls: Mutex<UrlRegistry>,
    converter: Converter,
    notifier: Arc<dyn Notifier>,
    download_dir: PathBuf,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Controller {
    pub fn new(converter: Converter, notifier: Arc<dyn Notifier>, download_dir: PathBuf) -> Self {
        let options = ConversionOptions {
            quality: Some(converter.config().default_gif_quality),
            ..ConversionOptions::default()
        };
        Self {
            session: Mutex::new(Session::new(options)),
            urls: Mutex::new(UrlRegistry::new()),
            converter,
            notifier,
            download_dir,
        }
    }

    pub fn config(&self) -> &ConverterConfig {
        self.converter.config()
    }

    pub fn view(&self) -> SessionView {
        lock(&self.session).view()
    }

    /// Live object URLs; exposed for diagnostics and tests.
    pub fn live_urls(&self) -> usize {
        lock(&self.urls).live_count()
    }

    pub fn revoked_urls(&self) -> u64 {
        lock(&self.urls).revoked_count()
    }

    /// Select the file at `path`; unreadable paths surface as an error.
    pub async fn select_path(&self, path: PathBuf) -> SessionView {
        let event = match SourceFile::from_path(&path) {
            Ok(file) => Event::FileSelected(file),
            Err(error) => Event::FileUnreadable { path, error },
        };
        self.handle(event).await
    }

    /// Apply `event` and every event that follows from its effects, then
    /// return the resulting state.
    ///
    /// The window is notified after each transition, before its effects run,
    /// so a conversion or probe in progress is visible while it is awaited.
    pub async fn handle(&self, event: Event) -> SessionView {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            let (effects, view) = {
                let mut session = lock(&self.session);
                let effects = session.apply(event);
                (effects, session.view())
            };
            self.notifier.session_changed(&view);
            for effect in effects {
                if let Some(next) = self.run(effect).await {
                    queue.push_back(next);
                }
            }
        }
        self.view()
    }

    /// Tear the session down and release whatever URLs are still live.
    pub async fn shutdown(&self) {
        self.handle(Event::Teardown).await;
        let mut urls = lock(&self.urls);
        if urls.live_count() > 0 {
            tracing::warn!(live = urls.live_count(), "releasing urls left after teardown");
            urls.revoke_all();
        }
    }

    async fn run(&self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::Register { url, backing } => {
                lock(&self.urls).register(url, backing);
                None
            }
            Effect::Revoke(url) => {
                lock(&self.urls).revoke(&url);
                None
            }
            Effect::Probe { generation, path } => {
                let event = match probe_dimensions(self.converter.decoder(), &path).await {
                    Ok(dimensions) => Event::MetadataLoaded {
                        generation,
                        dimensions,
                    },
                    Err(error) => {
                        tracing::warn!(path = %path.display(), %error, "probe failed");
                        Event::MetadataFailed { generation, error }
                    }
                };
                Some(event)
            }
            Effect::StartConversion { source, options } => {
                Some(Event::ConversionFinished(self.run_conversion(&source, &options).await))
            }
            Effect::Save { artifact, codec } => {
                let result = download::save(&mut lock(&self.urls), &artifact, codec, &self.download_dir);
                Some(Event::DownloadFinished(result))
            }
        }
    }

    async fn run_conversion(&self, source: &SourceFile, options: &ConversionOptions) -> Result<Artifact> {
        let guard = InFlight::new(&self.session, self.notifier.as_ref());
        tracing::info!(source = %source.name, codec = %options.codec, "conversion started");

        let on_progress = |percent: u8| {
            lock(&self.session).apply(Event::Progress(percent));
            self.notifier.progress(percent);
        };
        let result = self
            .converter
            .convert(source, options, &on_progress)
            .await
            .and_then(|bytes| persist(&bytes, options));

        guard.disarm();
        match &result {
            Ok(artifact) => tracing::info!(size = artifact.size, "conversion finished"),
            Err(error) => tracing::warn!(%error, "conversion failed"),
        }
        result
    }
}

/// Write the converted bytes to a temp file owned by the artifact.
fn persist(bytes: &[u8], options: &ConversionOptions) -> Result<Artifact> {
    let (_, ext) = options.codec.download_name();
    let mut file = tempfile::Builder::new()
        .prefix("artifact_")
        .suffix(&format!(".{ext}"))
        .tempfile()?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(Artifact {
        codec: options.codec,
        size: bytes.len() as u64,
        file: file.into_temp_path(),
    })
}

/// Puts the session back to idle if a conversion ends without reporting,
/// e.g. when the awaiting task is dropped.
struct InFlight<'a> {
    session: &'a Mutex<Session>,
    notifier: &'a dyn Notifier,
    armed: bool,
}

impl<'a> InFlight<'a> {
    fn new(session: &'a Mutex<Session>, notifier: &'a dyn Notifier) -> Self {
        Self {
            session,
            notifier,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::warn!("conversion dropped before completion");
        let mut session = lock(self.session);
        session.apply(Event::ConversionFinished(Err(ConvertError::Interrupted)));
        let view = session.view();
        drop(session);
        self.notifier.session_changed(&view);
    }
}
