//! # pirate-catalog
//!
//! Track catalog for Pirate Radio.
//!
//! Features:
//! - Directory scan filtered to supported audio formats
//! - Sequential, shuffle and repeat-one cursor policies
//! - Polling directory monitor that rescans on change

pub mod monitor;
pub mod playlist;

pub use monitor::{DirectoryMonitor, DEFAULT_POLL_INTERVAL};
pub use playlist::Playlist;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pirate_core::{Error, PlaybackMode, Result};
use tracing::{debug, info, warn};

/// Receiver for errors raised off the caller's thread (monitor rescans).
pub type ErrorSink = Arc<dyn Fn(Error) + Send + Sync>;

/// Thread-safe playlist with an optional directory monitor.
pub struct Catalog {
    /// Directory the playlist is bound to.
    directory: PathBuf,
    /// Playlist shared with the monitor thread.
    playlist: Arc<Mutex<Playlist>>,
    /// Active monitor, if any.
    monitor: Mutex<Option<DirectoryMonitor>>,
    /// Interval between directory listings.
    monitor_interval: Duration,
}

impl Catalog {
    pub fn new(playlist: Playlist) -> Self {
        Self {
            directory: playlist.directory().to_path_buf(),
            playlist: Arc::new(Mutex::new(playlist)),
            monitor: Mutex::new(None),
            monitor_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    #[must_use]
    pub const fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Rescan the directory. Returns the number of tracks found.
    pub fn scan(&self) -> Result<usize> {
        self.playlist.lock().scan().map(<[PathBuf]>::len)
    }

    pub fn current_track(&self) -> Option<PathBuf> {
        self.playlist.lock().current_track().map(Path::to_path_buf)
    }

    pub fn current_index(&self) -> Option<usize> {
        self.playlist.lock().current_index()
    }

    pub fn next_track(&self) -> Option<PathBuf> {
        self.playlist.lock().next_track().map(Path::to_path_buf)
    }

    pub fn previous_track(&self) -> Option<PathBuf> {
        self.playlist.lock().previous_track().map(Path::to_path_buf)
    }

    pub fn tracks(&self) -> Vec<PathBuf> {
        self.playlist.lock().tracks().to_vec()
    }

    pub fn len(&self) -> usize {
        self.playlist.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.playlist.lock().is_empty()
    }

    pub fn add_track(&self, path: impl Into<PathBuf>) -> bool {
        self.playlist.lock().add_track(path)
    }

    pub fn remove_track(&self, index: usize) -> Option<PathBuf> {
        self.playlist.lock().remove_track(index)
    }

    pub fn mode(&self) -> PlaybackMode {
        self.playlist.lock().mode()
    }

    pub fn set_mode(&self, mode: PlaybackMode) {
        self.playlist.lock().set_mode(mode);
    }

    /// Watch the directory and rescan whenever its entries change.
    ///
    /// Replaces a running monitor. Rescan failures go to `on_error`.
    pub fn start_monitoring(&self, on_error: ErrorSink) -> Result<()> {
        self.stop_monitoring();

        let playlist = Arc::clone(&self.playlist);
        let monitor = DirectoryMonitor::spawn(&self.directory, self.monitor_interval, move || {
            let result = playlist.lock().scan().map(<[PathBuf]>::len);
            match result {
                Ok(count) => info!("Directory changed, {count} tracks available"),
                Err(e) => {
                    warn!("Rescan after directory change failed: {e}");
                    on_error(e);
                }
            }
        })?;

        *self.monitor.lock() = Some(monitor);
        debug!("Monitoring {}", self.directory.display());
        Ok(())
    }

    /// Stop the directory monitor. Safe to call when none is running.
    pub fn stop_monitoring(&self) {
        let monitor = self.monitor.lock().take();
        if let Some(monitor) = monitor {
            monitor.stop();
            debug!("Stopped monitoring {}", self.directory.display());
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor.lock().is_some()
    }
}

impl Drop for Catalog {
    fn drop(&mut self) {
        self.stop_monitoring();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::fs;
    use std::time::Instant;

    const INTERVAL: Duration = Duration::from_millis(20);

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    fn ignore_errors() -> ErrorSink {
        Arc::new(|_: Error| {})
    }

    #[test]
    fn test_catalog_scan_and_advance() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.mp3"), b"").unwrap();
        fs::write(dir.path().join("b.wav"), b"").unwrap();

        let catalog = Catalog::new(Playlist::new(dir.path()));
        assert_eq!(catalog.scan().unwrap(), 2);
        assert_eq!(catalog.current_track().unwrap(), dir.path().join("a.mp3"));
        assert_eq!(catalog.next_track().unwrap(), dir.path().join("b.wav"));
        assert_eq!(catalog.previous_track().unwrap(), dir.path().join("a.mp3"));
    }

    #[test]
    fn test_stop_without_start() {
        let catalog = Catalog::new(Playlist::new("/nonexistent"));
        catalog.stop_monitoring();
        catalog.stop_monitoring();
        assert!(!catalog.is_monitoring());
    }

    #[test]
    fn test_monitor_rescans_on_change() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.mp3"), b"").unwrap();

        let catalog = Catalog::new(Playlist::new(dir.path())).with_monitor_interval(INTERVAL);
        catalog.scan().unwrap();
        catalog.start_monitoring(ignore_errors()).unwrap();
        assert!(catalog.is_monitoring());

        fs::write(dir.path().join("b.mp3"), b"").unwrap();
        assert!(wait_until(|| catalog.len() == 2));

        fs::remove_file(dir.path().join("a.mp3")).unwrap();
        assert!(wait_until(|| catalog.len() == 1));

        catalog.stop_monitoring();
        assert!(!catalog.is_monitoring());
    }

    #[test]
    fn test_restart_replaces_monitor() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::new(Playlist::new(dir.path())).with_monitor_interval(INTERVAL);

        catalog.start_monitoring(ignore_errors()).unwrap();
        catalog.start_monitoring(ignore_errors()).unwrap();
        assert!(catalog.is_monitoring());

        fs::write(dir.path().join("a.flac"), b"").unwrap();
        assert!(wait_until(|| catalog.len() == 1));
    }

    #[test]
    fn test_monitor_reports_rescan_failure() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("music");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("a.mp3"), b"").unwrap();

        let catalog = Catalog::new(Playlist::new(&root)).with_monitor_interval(INTERVAL);
        catalog.scan().unwrap();

        let (tx, rx) = unbounded();
        catalog
            .start_monitoring(Arc::new(move |e: Error| {
                let _ = tx.send(e);
            }))
            .unwrap();

        fs::remove_dir_all(&root).unwrap();
        let err = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(err, Error::DirectoryNotFound(_)));
        // The failed rescan leaves the old list in place.
        assert_eq!(catalog.len(), 1);
    }
}
