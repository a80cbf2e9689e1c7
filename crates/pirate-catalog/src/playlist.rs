//! Directory-backed playlist.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::fs;
use std::path::{Path, PathBuf};

use pirate_core::{is_supported, Error, PlaybackMode, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

/// Tracks found in a watched directory plus the playback cursor.
#[derive(Debug, Clone)]
pub struct Playlist {
    /// Directory the tracks are read from.
    directory: PathBuf,
    /// Ordering and advance policy.
    mode: PlaybackMode,
    /// Track paths from the last scan.
    tracks: Vec<PathBuf>,
    /// Index of the current track; meaningless while `tracks` is empty.
    current_index: usize,
}

impl Playlist {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            mode: PlaybackMode::default(),
            tracks: Vec::new(),
            current_index: 0,
        }
    }

    #[must_use]
    pub const fn with_mode(mut self, mode: PlaybackMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub const fn mode(&self) -> PlaybackMode {
        self.mode
    }

    /// Change the playback mode. Applies from the next advance or scan.
    pub const fn set_mode(&mut self, mode: PlaybackMode) {
        self.mode = mode;
    }

    pub fn tracks(&self) -> &[PathBuf] {
        &self.tracks
    }

    pub const fn len(&self) -> usize {
        self.tracks.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Get the current index, if there is a current track.
    pub const fn current_index(&self) -> Option<usize> {
        if self.tracks.is_empty() {
            None
        } else {
            Some(self.current_index)
        }
    }

    /// Get the current track.
    pub fn current_track(&self) -> Option<&Path> {
        self.tracks.get(self.current_index).map(PathBuf::as_path)
    }

    /// Re-read the directory, replacing the track list and rewinding the cursor.
    ///
    /// An empty result is not an error here; the caller decides what it means.
    /// On failure the previous track list is kept.
    pub fn scan(&mut self) -> Result<&[PathBuf]> {
        if !self.directory.is_dir() {
            return Err(Error::DirectoryNotFound(self.directory.clone()));
        }

        let mut tracks = list_tracks(&self.directory)?;
        tracks.sort();
        if self.mode.is_shuffle() {
            tracks.shuffle(&mut rand::thread_rng());
        }

        debug!(
            "Scanned {}: {} tracks ({})",
            self.directory.display(),
            tracks.len(),
            self.mode
        );

        self.tracks = tracks;
        self.current_index = 0;
        Ok(&self.tracks)
    }

    /// Move to the next track according to the playback mode.
    #[allow(clippy::should_implement_trait)] // Not implementing Iterator
    pub fn next_track(&mut self) -> Option<&Path> {
        if self.tracks.is_empty() {
            return None;
        }

        self.current_index = match self.mode {
            PlaybackMode::Sequential => (self.current_index + 1) % self.tracks.len(),
            PlaybackMode::Shuffle => rand::thread_rng().gen_range(0..self.tracks.len()),
            PlaybackMode::RepeatOne => self.current_index,
        };

        self.current_track()
    }

    /// Move to the previous track, wrapping to the last one.
    pub fn previous_track(&mut self) -> Option<&Path> {
        if self.tracks.is_empty() {
            return None;
        }

        self.current_index = if self.current_index == 0 {
            self.tracks.len() - 1
        } else {
            self.current_index - 1
        };

        self.current_track()
    }

    /// Append a track. Files with unsupported extensions are ignored.
    pub fn add_track(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        if !is_supported(&path) {
            return false;
        }
        self.tracks.push(path);
        true
    }

    /// Remove the track at `index`, keeping the cursor in range.
    pub fn remove_track(&mut self, index: usize) -> Option<PathBuf> {
        if index >= self.tracks.len() {
            return None;
        }

        let removed = self.tracks.remove(index);
        if self.current_index >= self.tracks.len() {
            self.current_index = self.tracks.len().saturating_sub(1);
        }
        Some(removed)
    }
}

/// Supported, visible regular files directly inside `directory`.
fn list_tracks(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut tracks = Vec::new();
    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        let path = entry.path();
        if !hidden && path.is_file() && is_supported(&path) {
            tracks.push(path);
        }
    }
    Ok(tracks)
}
