//! Filesystem events for the Steam library and the loop that applies them.
//!
//! [`ManifestWatcher`] runs `notify` on its own thread and forwards
//! debounced manifest events over a tokio channel. [`EventSource`] owns
//! that channel and restarts the watcher when the library is unavailable.
//! [`EventProcessor`] drains it into the engine and runs the periodic full
//! pass.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer};
use steamshine_steam::{app_id_from_path, scan_manifest};
use steamshine_store::MetadataSource;
use steamshine_sunshine::Reloader;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::engine::Engine;
use crate::error::SyncError;

/// Window in which repeated events for one path collapse into one.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

const CHANNEL_CAPACITY: usize = 256;

/// A change to one app manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestEvent {
    /// The manifest was created, modified or moved into the library.
    Changed(u32),
    /// The manifest was deleted or moved out of the library.
    Removed(u32),
}

impl ManifestEvent {
    pub fn app_id(&self) -> u32 {
        match self {
            ManifestEvent::Changed(id) | ManifestEvent::Removed(id) => *id,
        }
    }
}

/// Maps a path from the watcher to a manifest event.
///
/// Debounced events carry no kind, so the file's presence decides between
/// changed and removed. Anything other than an app manifest is ignored.
pub fn classify(path: &Path) -> Option<ManifestEvent> {
    let app_id = app_id_from_path(path)?;
    if path.is_file() {
        Some(ManifestEvent::Changed(app_id))
    } else {
        Some(ManifestEvent::Removed(app_id))
    }
}

/// Watches a `steamapps` directory (non-recursively) for manifest changes.
///
/// Events stop when this value is dropped.
pub struct ManifestWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
}

impl ManifestWatcher {
    /// Starts watching `root` and returns the receiving end of the event
    /// channel.
    pub fn start(
        root: &Path,
        window: Duration,
    ) -> Result<(Self, mpsc::Receiver<ManifestEvent>), SyncError> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        let mut debouncer = new_debouncer(window, move |res: DebounceEventResult| match res {
            Ok(events) => {
                for event in events {
                    let Some(ev) = classify(&event.path) else {
                        continue;
                    };
                    tracing::debug!(path = %event.path.display(), event = ?ev, "[WATCH] manifest event");
                    if tx.blocking_send(ev).is_err() {
                        return;
                    }
                }
            }
            Err(e) => tracing::warn!(error = ?e, "[WATCH] watcher error"),
        })?;

        debouncer.watcher().watch(root, RecursiveMode::NonRecursive)?;
        tracing::info!(path = %root.display(), "[WATCH] watching library");

        Ok((
            Self {
                _debouncer: debouncer,
            },
            rx,
        ))
    }
}

/// Event stream consumed by [`EventProcessor::run`].
///
/// Either a plain channel, or a [`ManifestWatcher`] on a library root that
/// is started again after it fails or stops.
pub struct EventSource {
    rx: Option<mpsc::Receiver<ManifestEvent>>,
    watcher: Option<ManifestWatcher>,
    watch: Option<(PathBuf, Duration)>,
    retry_at: Option<Instant>,
}

enum Polled {
    Event(ManifestEvent),
    Idle,
    Closed,
}

impl EventSource {
    /// Reads events from `rx`. The processor stops when it closes.
    pub fn channel(rx: mpsc::Receiver<ManifestEvent>) -> Self {
        Self {
            rx: Some(rx),
            watcher: None,
            watch: None,
            retry_at: None,
        }
    }

    /// Watches `root`. A watcher that cannot be started now is retried
    /// from [`EventProcessor::run`].
    pub fn watch(root: &Path, window: Duration) -> Self {
        let mut source = Self {
            rx: None,
            watcher: None,
            watch: Some((root.to_path_buf(), window)),
            retry_at: None,
        };
        source.start_watcher();
        source
    }

    /// True while a filesystem watcher is running.
    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    fn start_watcher(&mut self) -> bool {
        let Some((root, window)) = &self.watch else {
            return false;
        };
        match ManifestWatcher::start(root, *window) {
            Ok((watcher, rx)) => {
                self.watcher = Some(watcher);
                self.rx = Some(rx);
                true
            }
            Err(e) => {
                tracing::warn!(path = %root.display(), error = %e, "[WATCH] cannot watch library, will retry");
                false
            }
        }
    }

    /// Starts the watcher again once `every` has passed since the last
    /// attempt. Returns true if it is running again.
    fn retry(&mut self, every: Duration) -> bool {
        if self.watch.is_none() || self.rx.is_some() {
            return false;
        }
        let now = Instant::now();
        match self.retry_at {
            Some(at) if now >= at => {}
            Some(_) => return false,
            None => {
                self.retry_at = Some(now + every);
                return false;
            }
        }
        if self.start_watcher() {
            self.retry_at = None;
            true
        } else {
            self.retry_at = Some(now + every);
            false
        }
    }

    /// Handles a closed channel. Returns true if no more events can come.
    fn close(&mut self) -> bool {
        self.rx = None;
        if self.watch.is_none() {
            return true;
        }
        self.watcher = None;
        tracing::warn!("[WATCH] watcher stopped, will retry");
        false
    }

    async fn next(&mut self, poll: Duration) -> Polled {
        let Some(rx) = self.rx.as_mut() else {
            tokio::time::sleep(poll).await;
            return Polled::Idle;
        };
        match tokio::time::timeout(poll, rx.recv()).await {
            Ok(Some(event)) => Polled::Event(event),
            Ok(None) => Polled::Closed,
            Err(_) => Polled::Idle,
        }
    }
}

/// Timing for [`EventProcessor`].
#[derive(Debug, Clone)]
pub struct ProcessorOptions {
    /// Wait before reading a changed manifest, so Steam can finish writing it.
    pub settle_delay: Duration,
    /// Upper bound on each wait for an event.
    pub poll_timeout: Duration,
    /// Pause after an event fails.
    pub error_pause: Duration,
    /// Period of the full pass; `None` disables it.
    pub full_scan_interval: Option<Duration>,
    /// Delay between attempts to start a watcher that failed.
    pub watch_retry: Duration,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(1),
            poll_timeout: Duration::from_secs(1),
            error_pause: Duration::from_secs(5),
            full_scan_interval: Some(Duration::from_secs(3600)),
            watch_retry: Duration::from_secs(30),
        }
    }
}

/// Applies manifest events to an [`Engine`].
pub struct EventProcessor<M, R> {
    engine: Engine<M, R>,
    options: ProcessorOptions,
}

impl<M: MetadataSource, R: Reloader> EventProcessor<M, R> {
    pub fn new(engine: Engine<M, R>, options: ProcessorOptions) -> Self {
        Self { engine, options }
    }

    pub fn engine(&self) -> &Engine<M, R> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine<M, R> {
        &mut self.engine
    }

    /// Handles one event.
    pub async fn handle(&mut self, event: ManifestEvent) -> Result<(), SyncError> {
        match event {
            ManifestEvent::Changed(app_id) => {
                tokio::time::sleep(self.options.settle_delay).await;

                let path = self.engine.library().manifest_path(app_id);
                if !path.is_file() {
                    tracing::debug!(app_id, "[WATCH] manifest gone before it settled");
                    return Ok(());
                }
                let entry = match scan_manifest(&path) {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::warn!(app_id, error = %e, "[WATCH] manifest not readable yet");
                        return Ok(());
                    }
                };
                self.engine.add_game(&entry).await?;
            }
            ManifestEvent::Removed(app_id) => {
                if !self.engine.options().remove_uninstalled {
                    tracing::debug!(app_id, "[WATCH] removal ignored");
                    return Ok(());
                }
                if self.engine.library().manifest_path(app_id).is_file() {
                    tracing::debug!(app_id, "[WATCH] manifest is back, not removing");
                    return Ok(());
                }
                self.engine.remove_game(app_id).await?;
            }
        }
        Ok(())
    }

    /// Processes events until `cancel` fires, or until a plain channel
    /// source closes. A watching source never ends the loop on its own.
    ///
    /// An event already being handled is finished before returning.
    pub async fn run(&mut self, source: &mut EventSource, cancel: CancellationToken) {
        let mut next_full = self.options.full_scan_interval.map(|d| Instant::now() + d);

        loop {
            let polled = tokio::select! {
                _ = cancel.cancelled() => break,
                p = source.next(self.options.poll_timeout) => p,
            };

            match polled {
                Polled::Event(event) => {
                    if let Err(e) = self.handle(event).await {
                        tracing::error!(app_id = event.app_id(), error = %e, "[WATCH] failed to handle event");
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(self.options.error_pause) => {}
                        }
                    }
                }
                Polled::Closed => {
                    if source.close() {
                        tracing::warn!("[WATCH] event channel closed");
                        break;
                    }
                }
                Polled::Idle => {}
            }

            if source.retry(self.options.watch_retry) {
                // Manifests written while unwatched produced no events.
                tracing::info!("[WATCH] library watched again, starting full sync");
                self.engine.full_sync().await;
            }

            if let (Some(at), Some(period)) = (next_full, self.options.full_scan_interval)
                && Instant::now() >= at
            {
                tracing::info!("starting periodic full sync");
                self.engine.full_sync().await;
                next_full = Some(Instant::now() + period);
            }
        }

        tracing::info!("event processor stopped");
    }
}
