//! Operator console: keyboard commands, status lines and the banner.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use pirate_core::{Error, PlaybackMode};
use pirate_station::StationObserver;
use tokio::sync::Notify;

/// A command typed by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    Next,
    Previous,
    ToggleShuffle,
    Quit,
}

impl OperatorCommand {
    /// Parse one input line. Unknown input yields `None`.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "n" | "next" => Some(Self::Next),
            "p" | "prev" | "previous" => Some(Self::Previous),
            "s" | "shuffle" => Some(Self::ToggleShuffle),
            "q" | "quit" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Prints station events for the operator.
#[derive(Default)]
pub struct ConsoleObserver {
    stopped: Arc<Notify>,
}

impl ConsoleObserver {
    /// Notified once the stop message has been printed.
    pub fn stopped_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.stopped)
    }
}

impl StationObserver for ConsoleObserver {
    fn track_started(&self, track: &str) {
        println!("▶ Now playing: {track}");
    }

    fn on_error(&self, error: &Error) {
        println!("⚠ {error}");
    }

    fn stopped(&self) {
        println!("⏹ Broadcast stopped");
        self.stopped.notify_one();
    }
}

const BANNER_WIDTH: usize = 41;

fn banner_row(label: &str, value: &str) -> String {
    let content = format!("  {label:<9}{value}");
    let shown: String = content.chars().take(BANNER_WIDTH).collect();
    format!("│{shown:<BANNER_WIDTH$}│")
}

/// Startup banner showing the broadcast settings.
pub fn banner(frequency: f32, directory: &Path, mode: PlaybackMode) -> String {
    let rule = "─".repeat(BANNER_WIDTH);
    let mut out = String::new();
    let _ = writeln!(out, "┌{rule}┐");
    let _ = writeln!(out, "│{:^BANNER_WIDTH$}│", "PIRATE RADIO");
    let _ = writeln!(out, "├{rule}┤");
    let _ = writeln!(out, "{}", banner_row("Freq:", &format!("{frequency:.1} MHz")));
    let _ = writeln!(out, "{}", banner_row("Folder:", &directory.display().to_string()));
    let _ = writeln!(out, "{}", banner_row("Mode:", &mode.to_string()));
    let _ = write!(out, "└{rule}┘");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(OperatorCommand::parse("n"), Some(OperatorCommand::Next));
        assert_eq!(OperatorCommand::parse(" P \n"), Some(OperatorCommand::Previous));
        assert_eq!(OperatorCommand::parse("s"), Some(OperatorCommand::ToggleShuffle));
        assert_eq!(OperatorCommand::parse("Q"), Some(OperatorCommand::Quit));
        assert_eq!(OperatorCommand::parse(""), None);
        assert_eq!(OperatorCommand::parse("x"), None);
    }

    #[test]
    fn test_banner_rows_align() {
        let folder = Path::new("/home/pi/a/very/long/music/folder/name");
        let text = banner(88.5, folder, PlaybackMode::Shuffle);
        let widths: Vec<_> = text.lines().map(|line| line.chars().count()).collect();

        assert_eq!(widths.len(), 7);
        assert!(widths.iter().all(|&w| w == BANNER_WIDTH + 2));
        assert!(text.contains("88.5 MHz"));
        assert!(text.contains("Shuffle"));
    }
}
