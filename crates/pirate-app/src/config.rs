//! Configuration file.
//!
//! Settings are layered: built-in defaults, then the TOML file, then
//! command-line arguments and their environment variables.
//!
//! ```toml
//! log_level = "pirate_station=debug"
//!
//! [station]
//! directory = "/home/pi/radio"
//! mode = "shuffle"
//!
//! [transmitter]
//! frequency = 88.5
//!
//! [pipeline]
//! ffmpeg = "/usr/bin/ffmpeg"
//! drain_grace_secs = 0.8
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use pirate_core::{DecodeFormat, PlaybackMode, TransmitterConfig};
use pirate_pipeline::PipelineSettings;
use pirate_station::StationSettings;
use serde::Deserialize;

use crate::cli::Args;

/// Contents of `config.toml`. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Tracing filter directives, overridden by `RUST_LOG`.
    pub log_level: Option<String>,
    pub station: StationSection,
    pub transmitter: TransmitterConfig,
    pub pipeline: PipelineSection,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct StationSection {
    pub directory: PathBuf,
    pub mode: PlaybackMode,
    pub idle_backoff_secs: f64,
    pub error_backoff_secs: f64,
    pub monitor_interval_secs: f64,
}

impl Default for StationSection {
    fn default() -> Self {
        let defaults = StationSettings::default();
        Self {
            directory: PathBuf::from("./music"),
            mode: PlaybackMode::default(),
            idle_backoff_secs: defaults.idle_backoff.as_secs_f64(),
            error_backoff_secs: defaults.error_backoff.as_secs_f64(),
            monitor_interval_secs: defaults.monitor_interval.as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSection {
    pub ffmpeg: PathBuf,
    pub fm_transmitter: PathBuf,
    pub format: DecodeFormat,
    pub drain_grace_secs: f64,
    pub stop_grace_secs: f64,
    pub poll_interval_secs: f64,
}

impl Default for PipelineSection {
    fn default() -> Self {
        let defaults = PipelineSettings::default();
        Self {
            ffmpeg: defaults.decoder,
            fm_transmitter: defaults.transmitter,
            format: defaults.format,
            drain_grace_secs: defaults.drain_grace.as_secs_f64(),
            stop_grace_secs: defaults.stop_grace.as_secs_f64(),
            poll_interval_secs: defaults.poll_interval.as_secs_f64(),
        }
    }
}

/// Everything `main` needs to start the station.
#[derive(Debug, Clone)]
pub struct Launch {
    pub directory: PathBuf,
    pub mode: PlaybackMode,
    pub settings: StationSettings,
    pub log_level: Option<String>,
}

fn duration(name: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .with_context(|| format!("`{name}` must be a non-negative number of seconds"))
}

impl FileConfig {
    /// `config.toml` in the platform configuration directory.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "pirate-radio")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Load the file named on the command line, or the default file if it
    /// exists. A missing default file yields the built-in defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Apply command-line arguments on top of the file.
    pub fn into_launch(self, args: &Args) -> Result<Launch> {
        let StationSection {
            directory,
            mode,
            idle_backoff_secs,
            error_backoff_secs,
            monitor_interval_secs,
        } = self.station;

        let directory = args.music_directory().unwrap_or(directory);
        let mode = if args.shuffle {
            PlaybackMode::Shuffle
        } else {
            mode
        };

        let mut transmitter = self.transmitter;
        if let Some(frequency) = args.frequency {
            transmitter.frequency = frequency;
        }
        transmitter
            .validate()
            .context("Invalid transmitter settings")?;

        let pipeline = PipelineSettings {
            decoder: self.pipeline.ffmpeg,
            transmitter: self.pipeline.fm_transmitter,
            format: self.pipeline.format,
            drain_grace: duration("drain_grace_secs", self.pipeline.drain_grace_secs)?,
            stop_grace: duration("stop_grace_secs", self.pipeline.stop_grace_secs)?,
            poll_interval: duration("poll_interval_secs", self.pipeline.poll_interval_secs)?,
        };

        let settings = StationSettings {
            transmitter,
            pipeline,
            idle_backoff: duration("idle_backoff_secs", idle_backoff_secs)?,
            error_backoff: duration("error_backoff_secs", error_backoff_secs)?,
            monitor_interval: duration("monitor_interval_secs", monitor_interval_secs)?,
        };

        Ok(Launch {
            directory,
            mode,
            settings,
            log_level: self.log_level,
        })
    }
}
