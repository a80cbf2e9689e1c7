//! Error types for Pirate Radio.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using Pirate Radio's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Pirate Radio.
#[derive(Error, Debug)]
pub enum Error {
    // Transmitter errors
    #[error("Failed to initialize transmitter")]
    InitFailed,

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Unsupported audio format")]
    InvalidFormat,

    #[error("Transmission failed: {0}")]
    TransmissionFailed(String),

    #[error("Insufficient privileges, run with sudo")]
    PermissionDenied,

    #[error("Transmitter is already running")]
    AlreadyRunning,

    #[error("Transmitter is not running")]
    NotRunning,

    // Playlist errors
    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("No supported audio files in directory")]
    NoTracksFound,

    // Pipeline errors
    #[error("Failed to convert file: {}", .0.display())]
    ConversionFailed(PathBuf),

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl Error {
    /// Returns true if this error means the transmitter hardware is unusable
    /// from this process.
    pub const fn is_transmitter_fatal(&self) -> bool {
        matches!(self, Self::InitFailed | Self::PermissionDenied)
    }
}
