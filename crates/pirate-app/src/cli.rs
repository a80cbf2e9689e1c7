//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;
use pirate_core::types::config::FREQUENCY_RANGE;

/// Broadcast a folder of music over FM.
#[derive(Parser, Debug)]
#[command(name = "pirate-radio")]
#[command(version)]
#[command(about = "FM radio station for the Raspberry Pi")]
#[command(after_help = "Controls while broadcasting:\n  \
    n  next track\n  \
    p  previous track\n  \
    s  toggle shuffle\n  \
    q  quit\n\n\
    Run with sudo: the transmitter needs access to the GPIO peripherals.")]
pub struct Args {
    /// Music folder
    #[arg(value_name = "DIRECTORY")]
    pub positional_directory: Option<PathBuf>,

    /// Music folder (default: ./music)
    #[arg(short, long, env = "PIRATE_RADIO_DIRECTORY")]
    pub directory: Option<PathBuf>,

    /// Broadcast frequency in MHz (default: 100.0)
    #[arg(short, long, env = "PIRATE_RADIO_FREQUENCY", value_parser = parse_frequency)]
    pub frequency: Option<f32>,

    /// Play tracks in random order
    #[arg(short, long, env = "PIRATE_RADIO_SHUFFLE")]
    pub shuffle: bool,

    /// Configuration file
    #[arg(short, long, env = "PIRATE_RADIO_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Music folder given on the command line. The positional form wins
    /// over `--directory` and its environment variable.
    pub fn music_directory(&self) -> Option<PathBuf> {
        self.positional_directory
            .clone()
            .or_else(|| self.directory.clone())
    }
}

fn parse_frequency(value: &str) -> Result<f32, String> {
    let frequency: f32 = value
        .parse()
        .map_err(|_| format!("`{value}` is not a frequency in MHz"))?;
    if FREQUENCY_RANGE.contains(&frequency) {
        Ok(frequency)
    } else {
        Err(format!(
            "{frequency:.1} MHz is outside the FM band ({:.1}-{:.1} MHz)",
            FREQUENCY_RANGE.start(),
            FREQUENCY_RANGE.end()
        ))
    }
}
