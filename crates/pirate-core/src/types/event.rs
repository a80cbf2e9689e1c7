//! Broadcast lifecycle events.

use std::path::Path;
use std::sync::Arc;

use crate::Error;

/// Events emitted by the radio station.
#[derive(Debug, Clone)]
pub enum StationEvent {
    /// A track's pipeline is about to start.
    TrackStarted(String),
    /// A track's pipeline ended, either naturally or skipped by the operator.
    TrackFinished(String),
    /// A recoverable error; the broadcast keeps going.
    Error(Arc<Error>),
    /// The broadcast session ended.
    Stopped,
}

impl StationEvent {
    pub fn error(error: Error) -> Self {
        Self::Error(Arc::new(error))
    }

    /// Track name carried by the event, if any.
    pub fn track(&self) -> Option<&str> {
        match self {
            Self::TrackStarted(track) | Self::TrackFinished(track) => Some(track),
            Self::Error(_) | Self::Stopped => None,
        }
    }
}

/// Name shown to the operator for a track path.
pub fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name() {
        assert_eq!(display_name(Path::new("/music/a.mp3")), "a.mp3");
        assert_eq!(display_name(Path::new("b.wav")), "b.wav");
        assert_eq!(display_name(Path::new("/")), "/");
    }

    #[test]
    fn test_event_track() {
        let event = StationEvent::TrackStarted("a.mp3".to_string());
        assert_eq!(event.track(), Some("a.mp3"));
        assert_eq!(StationEvent::Stopped.track(), None);
        assert!(StationEvent::error(Error::NoTracksFound).track().is_none());
    }
}
