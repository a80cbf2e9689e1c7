//! Core domain types for Pirate Radio.

pub mod config;
pub mod event;
pub mod format;
pub mod mode;

pub use config::TransmitterConfig;
pub use event::{display_name, StationEvent};
pub use format::{is_compatible_wav, is_supported, DecodeFormat, SUPPORTED_EXTENSIONS};
pub use mode::PlaybackMode;
