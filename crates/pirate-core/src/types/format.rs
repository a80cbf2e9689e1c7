//! Audio formats accepted by the catalog and produced by the decode stage.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// File extensions the decoder accepts (compared case-insensitively).
pub const SUPPORTED_EXTENSIONS: [&str; 7] = ["mp3", "wav", "flac", "ogg", "m4a", "aac", "wma"];

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// Check if a file has a supported audio extension.
pub fn is_supported(path: impl AsRef<Path>) -> bool {
    extension(path.as_ref()).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Check if a file can be fed to the transmitter without decoding.
pub fn is_compatible_wav(path: impl AsRef<Path>) -> bool {
    extension(path.as_ref()).is_some_and(|ext| ext == "wav")
}

/// PCM layout the decode stage writes (signed 16-bit little-endian, WAV framed).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DecodeFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for DecodeFormat {
    fn default() -> Self {
        Self {
            sample_rate: 22_050,
            channels: 1,
        }
    }
}
