//! Playlist playback modes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Order in which the playlist hands out tracks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PlaybackMode {
    /// Tracks sorted by path, wrapping around at the end.
    #[default]
    Sequential,
    /// Tracks permuted at scan time, random pick on advance.
    Shuffle,
    /// Keep playing the current track.
    RepeatOne,
}

impl PlaybackMode {
    /// Mode selected by the operator's shuffle toggle.
    pub const fn toggle_shuffle(self) -> Self {
        match self {
            Self::Shuffle => Self::Sequential,
            Self::Sequential | Self::RepeatOne => Self::Shuffle,
        }
    }

    pub const fn from_shuffle(shuffle: bool) -> Self {
        if shuffle {
            Self::Shuffle
        } else {
            Self::Sequential
        }
    }

    pub const fn is_shuffle(self) -> bool {
        matches!(self, Self::Shuffle)
    }
}

impl fmt::Display for PlaybackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Sequential => "Sequential",
            Self::Shuffle => "Shuffle",
            Self::RepeatOne => "Repeat one",
        };
        f.write_str(label)
    }
}
