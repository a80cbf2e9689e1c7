//! The radio station: catalog, broadcast loop and transport controls.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use pirate_catalog::{Catalog, Playlist, DEFAULT_POLL_INTERVAL};
use pirate_core::{display_name, Error, PlaybackMode, Result, StationEvent, TransmitterConfig};
use pirate_pipeline::{PipelineSettings, ProcessPipeline, RunOutcome, TrackRunner};
use tracing::{debug, error, info, warn};

use crate::notify::{Notifier, StationObserver};

/// Station configuration.
#[derive(Debug, Clone)]
pub struct StationSettings {
    /// Emission settings applied to every track.
    pub transmitter: TransmitterConfig,
    pub pipeline: PipelineSettings,
    /// Wait before rescanning an empty or unreadable directory.
    pub idle_backoff: Duration,
    /// Wait after a failed track before moving on. Transmitter failures that
    /// no retry can fix wait `idle_backoff` instead.
    pub error_backoff: Duration,
    /// Directory polling interval.
    pub monitor_interval: Duration,
}

impl Default for StationSettings {
    fn default() -> Self {
        Self {
            transmitter: TransmitterConfig::default(),
            pipeline: PipelineSettings::default(),
            idle_backoff: Duration::from_secs(5),
            error_backoff: Duration::from_secs(1),
            monitor_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Serializes operator skips with the loop's track selection.
#[derive(Default)]
struct Transport {
    /// Bumped by every operator skip.
    skips: u64,
}

/// State shared between the control surface and the broadcast loop.
struct Shared {
    catalog: Catalog,
    runner: Arc<dyn TrackRunner>,
    notifier: Notifier,
    config: RwLock<TransmitterConfig>,
    transport: Mutex<Transport>,
    is_broadcasting: AtomicBool,
    should_stop: AtomicBool,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
    idle_backoff: Duration,
    error_backoff: Duration,
}

impl Shared {
    fn stopping(&self) -> bool {
        self.should_stop.load(Ordering::SeqCst)
    }

    /// Sleep for up to `duration`, returning early on stop or skip.
    fn idle(&self, duration: Duration) {
        if !self.stopping() {
            let _ = self.wake_rx.recv_timeout(duration);
        }
    }

    fn wake(&self) {
        let _ = self.wake_tx.try_send(());
    }

    fn broadcast_loop(&self) {
        info!("Broadcast loop started");

        loop {
            let (track, skips) = {
                let transport = self.transport.lock();
                self.runner.reset_cancel();
                // Skips already applied to the cursor must not cut a later
                // backoff short.
                while self.wake_rx.try_recv().is_ok() {}
                if self.stopping() {
                    break;
                }
                (self.catalog.current_track(), transport.skips)
            };

            let Some(track) = track else {
                self.recover_empty();
                continue;
            };

            self.play(&track);

            let transport = self.transport.lock();
            if transport.skips == skips && !self.stopping() {
                self.catalog.next_track();
            }
        }

        info!("Broadcast loop exited");
    }

    fn play(&self, track: &Path) {
        let name = display_name(track);
        let config = *self.config.read();

        info!("Now playing {name}");
        self.notifier.send(StationEvent::TrackStarted(name.clone()));

        match self.runner.run(track, &config) {
            Ok(outcome) => {
                if outcome == RunOutcome::Cancelled {
                    debug!("{name} cut short");
                }
                self.notifier.send(StationEvent::TrackFinished(name));
            }
            Err(e) => {
                error!("Playback of {name} failed: {e}");
                let backoff = if e.is_transmitter_fatal() {
                    self.idle_backoff
                } else {
                    self.error_backoff
                };
                self.notifier.error(e);
                self.idle(backoff);
            }
        }
    }

    /// The catalog ran dry: rescan, idling while nothing turns up.
    fn recover_empty(&self) {
        match self.catalog.scan() {
            Ok(0) => {
                debug!("No tracks available, waiting");
                self.idle(self.idle_backoff);
            }
            Ok(count) => info!("Rescan found {count} tracks"),
            Err(e) => {
                warn!("Rescan failed: {e}");
                self.notifier.error(e);
                self.idle(self.idle_backoff);
            }
        }
    }
}

/// Broadcasts a directory of audio files on one FM frequency.
///
/// ```no_run
/// use pirate_core::PlaybackMode;
/// use pirate_station::{RadioStation, StationSettings};
///
/// let settings = StationSettings::default();
/// let station = RadioStation::new("/home/pi/music", PlaybackMode::Shuffle, settings)?;
/// station.start()?;
/// station.next_track();
/// station.stop();
/// # Ok::<(), pirate_core::Error>(())
/// ```
pub struct RadioStation {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RadioStation {
    /// Station playing `directory` through ffmpeg and fm_transmitter.
    pub fn new(
        directory: impl Into<PathBuf>,
        mode: PlaybackMode,
        settings: StationSettings,
    ) -> Result<Self> {
        let runner = Arc::new(ProcessPipeline::new(settings.pipeline.clone()));
        Self::with_runner(Playlist::new(directory).with_mode(mode), settings, runner)
    }

    /// Station playing `playlist` through a custom runner.
    pub fn with_runner(
        playlist: Playlist,
        settings: StationSettings,
        runner: Arc<dyn TrackRunner>,
    ) -> Result<Self> {
        settings.transmitter.validate()?;

        let (wake_tx, wake_rx) = bounded(1);
        let shared = Shared {
            catalog: Catalog::new(playlist).with_monitor_interval(settings.monitor_interval),
            runner,
            notifier: Notifier::new()?,
            config: RwLock::new(settings.transmitter),
            transport: Mutex::new(Transport::default()),
            is_broadcasting: AtomicBool::new(false),
            should_stop: AtomicBool::new(false),
            wake_tx,
            wake_rx,
            idle_backoff: settings.idle_backoff,
            error_backoff: settings.error_backoff,
        };

        Ok(Self {
            shared: Arc::new(shared),
            worker: Mutex::new(None),
        })
    }

    /// Scan the catalog and start broadcasting in the background.
    ///
    /// Does nothing if already broadcasting. Fails with
    /// [`Error::DirectoryNotFound`] or [`Error::NoTracksFound`].
    pub fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock();
        if self.is_broadcasting() {
            return Ok(());
        }

        let shared = &self.shared;
        let count = shared.catalog.scan()?;
        if count == 0 {
            return Err(Error::NoTracksFound);
        }

        shared.should_stop.store(false, Ordering::SeqCst);
        shared.runner.reset_cancel();
        while shared.wake_rx.try_recv().is_ok() {}
        shared.is_broadcasting.store(true, Ordering::SeqCst);

        let notifier = shared.notifier.clone();
        if let Err(e) = shared
            .catalog
            .start_monitoring(Arc::new(move |e: Error| notifier.error(e)))
        {
            warn!("Directory monitoring unavailable: {e}");
            shared.notifier.error(e);
        }

        let looped = Arc::clone(shared);
        let handle = std::thread::Builder::new()
            .name("broadcast-loop".to_string())
            .spawn(move || looped.broadcast_loop())
            .map_err(|e| {
                shared.catalog.stop_monitoring();
                shared.is_broadcasting.store(false, Ordering::SeqCst);
                Error::Unknown(format!("Failed to spawn broadcast loop: {e}"))
            })?;
        *worker = Some(handle);

        info!(
            "Broadcasting {count} tracks on {:.1} MHz",
            shared.config.read().frequency
        );
        Ok(())
    }

    /// Stop broadcasting and wait for the loop to exit. Safe to call at any
    /// time; emits [`StationEvent::Stopped`] once per session.
    pub fn stop(&self) {
        let mut worker = self.worker.lock();
        let shared = &self.shared;

        shared.should_stop.store(true, Ordering::SeqCst);
        shared.runner.cancel();
        shared.wake();
        shared.catalog.stop_monitoring();

        if let Some(handle) = worker.take() {
            if handle.join().is_err() {
                error!("Broadcast loop panicked");
            }
        }
        shared.runner.reset_cancel();

        if shared.is_broadcasting.swap(false, Ordering::SeqCst) {
            info!("Broadcast stopped");
            shared.notifier.send(StationEvent::Stopped);
        }
    }

    /// Skip to the next track. Returns the track that plays next.
    pub fn next_track(&self) -> Option<PathBuf> {
        self.skip(Catalog::next_track)
    }

    /// Go back to the previous track. Returns the track that plays next.
    pub fn previous_track(&self) -> Option<PathBuf> {
        self.skip(Catalog::previous_track)
    }

    fn skip(&self, advance: impl FnOnce(&Catalog) -> Option<PathBuf>) -> Option<PathBuf> {
        let shared = &self.shared;
        let mut transport = shared.transport.lock();
        transport.skips = transport.skips.wrapping_add(1);
        if self.is_broadcasting() {
            shared.runner.cancel();
        }
        let track = advance(&shared.catalog);
        shared.wake();
        drop(transport);

        if let Some(track) = &track {
            debug!("Skipping to {}", display_name(track));
        }
        track
    }

    /// Switch between shuffle and sequential play. Returns the new mode.
    pub fn toggle_shuffle(&self) -> PlaybackMode {
        let mode = self.playback_mode().toggle_shuffle();
        self.set_playback_mode(mode);
        mode
    }

    pub fn set_playback_mode(&self, mode: PlaybackMode) {
        self.shared.catalog.set_mode(mode);
        info!("Playback mode: {mode}");
    }

    pub fn playback_mode(&self) -> PlaybackMode {
        self.shared.catalog.mode()
    }

    /// Change the carrier frequency, effective from the next track.
    pub fn set_frequency(&self, frequency: f32) -> Result<()> {
        let config = self.transmitter_config().with_frequency(frequency);
        config.validate()?;
        *self.shared.config.write() = config;
        info!("Frequency set to {frequency:.1} MHz");
        Ok(())
    }

    pub fn frequency(&self) -> f32 {
        self.shared.config.read().frequency
    }

    pub fn transmitter_config(&self) -> TransmitterConfig {
        *self.shared.config.read()
    }

    pub fn is_broadcasting(&self) -> bool {
        self.shared.is_broadcasting.load(Ordering::SeqCst)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.shared.catalog
    }

    pub fn current_track(&self) -> Option<PathBuf> {
        self.shared.catalog.current_track()
    }

    /// Register the event observer. The station keeps a weak reference.
    pub fn set_observer<O: StationObserver + 'static>(&self, observer: &Arc<O>) {
        self.shared.notifier.set_observer(observer);
    }
}

impl Drop for RadioStation {
    fn drop(&mut self) {
        self.stop();
    }
}
