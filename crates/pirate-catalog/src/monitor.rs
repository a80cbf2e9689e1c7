//! Polling watcher for the music directory.
//!
//! The watcher thread lists the directory at a fixed interval and compares
//! each entry's name, size and modification time with the previous listing.
//! Any difference (an entry written, created, deleted or renamed) fires the
//! change callback once per polling interval.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use pirate_core::{Error, Result};
use tracing::{debug, trace, warn};

/// Default interval between directory listings.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Size and modification time of one entry.
type Stamp = (u64, Option<SystemTime>);

/// Entries of a directory, or `None` if it cannot be listed.
type Snapshot = Option<BTreeMap<OsString, Stamp>>;

fn snapshot(directory: &Path) -> Snapshot {
    let entries = fs::read_dir(directory).ok()?;
    Some(
        entries
            .filter_map(|entry| {
                let entry = entry.ok()?;
                let stamp = entry
                    .metadata()
                    .map(|m| (m.len(), m.modified().ok()))
                    .unwrap_or_default();
                Some((entry.file_name(), stamp))
            })
            .collect(),
    )
}

/// Handle to a running directory watcher. Dropping it stops the thread.
pub struct DirectoryMonitor {
    directory: PathBuf,
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl DirectoryMonitor {
    /// Start watching `directory`, calling `on_change` from the watcher thread
    /// whenever its entries change. The baseline listing is taken before this
    /// returns, so any later change is reported.
    pub fn spawn<F>(
        directory: impl Into<PathBuf>,
        interval: Duration,
        mut on_change: F,
    ) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let directory = directory.into();
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let watched = directory.clone();
        let mut last = snapshot(&watched);

        let handle = std::thread::Builder::new()
            .name("directory-monitor".to_string())
            .spawn(move || {
                debug!("Watching {} every {:?}", watched.display(), interval);

                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }

                    let current = snapshot(&watched);
                    if current != last {
                        trace!("Directory {} changed", watched.display());
                        last = current;
                        on_change();
                    }
                }

                debug!("Stopped watching {}", watched.display());
            })
            .map_err(|e| Error::Unknown(format!("Failed to spawn directory monitor: {e}")))?;

        Ok(Self {
            directory,
            stop_tx,
            handle: Some(handle),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Stop the watcher and wait for its thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.stop_tx.try_send(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Directory monitor thread panicked");
            }
        }
    }
}

impl Drop for DirectoryMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    const INTERVAL: Duration = Duration::from_millis(20);
    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn test_new_entry_fires_callback() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = unbounded();
        let monitor = DirectoryMonitor::spawn(dir.path(), INTERVAL, move || {
            let _ = tx.send(());
        })
        .unwrap();

        fs::write(dir.path().join("a.mp3"), b"").unwrap();
        assert!(rx.recv_timeout(WAIT).is_ok());

        fs::rename(dir.path().join("a.mp3"), dir.path().join("b.mp3")).unwrap();
        assert!(rx.recv_timeout(WAIT).is_ok());

        monitor.stop();
    }

    #[test]
    fn test_change_before_first_poll_fires_callback() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = unbounded();
        let _monitor = DirectoryMonitor::spawn(dir.path(), INTERVAL * 10, move || {
            let _ = tx.send(());
        })
        .unwrap();

        // Written before the watcher thread has listed anything itself.
        fs::write(dir.path().join("early.mp3"), b"").unwrap();
        assert!(rx.recv_timeout(WAIT).is_ok());
        assert!(rx.recv_timeout(INTERVAL * 20).is_err());
    }

    #[test]
    fn test_content_write_fires_callback() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.mp3");
        fs::write(&file, b"one").unwrap();

        let (tx, rx) = unbounded();
        let _monitor = DirectoryMonitor::spawn(dir.path(), INTERVAL, move || {
            let _ = tx.send(());
        })
        .unwrap();

        // Size changes even when the mtime granularity is coarse.
        fs::write(&file, b"two two").unwrap();
        assert!(rx.recv_timeout(WAIT).is_ok());
    }

    #[test]
    fn test_quiet_directory_does_not_fire() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.mp3"), b"one").unwrap();

        let (tx, rx) = unbounded();
        let _monitor = DirectoryMonitor::spawn(dir.path(), INTERVAL, move || {
            let _ = tx.send(());
        })
        .unwrap();

        assert!(rx.recv_timeout(INTERVAL * 10).is_err());
    }

    #[test]
    fn test_removed_directory_fires_callback() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("music");
        fs::create_dir(&root).unwrap();

        let (tx, rx) = unbounded();
        let _monitor = DirectoryMonitor::spawn(&root, INTERVAL, move || {
            let _ = tx.send(());
        })
        .unwrap();

        fs::remove_dir(&root).unwrap();
        assert!(rx.recv_timeout(WAIT).is_ok());
    }

    #[test]
    fn test_drop_stops_thread() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = unbounded::<()>();
        let monitor = DirectoryMonitor::spawn(dir.path(), INTERVAL, move || {
            let _ = tx.send(());
        })
        .unwrap();
        assert_eq!(monitor.directory(), dir.path());

        drop(monitor);
        // The callback (and its sender) is gone once the thread has exited.
        assert!(matches!(
            rx.recv_timeout(WAIT),
            Err(RecvTimeoutError::Disconnected)
        ));
    }
}
