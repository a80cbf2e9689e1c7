//! FFmpeg decode stage: any supported container in, WAV-framed PCM out.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};

use pirate_core::{DecodeFormat, Error, Result};
use tracing::{debug, warn};
use uuid::Uuid;

/// Builds and spawns ffmpeg invocations that write PCM to stdout.
#[derive(Debug, Clone)]
pub struct Decoder {
    /// Path or bare name of the ffmpeg binary.
    program: PathBuf,
    /// Output layout.
    format: DecodeFormat,
}

impl Decoder {
    pub fn new(program: impl Into<PathBuf>, format: DecodeFormat) -> Self {
        Self {
            program: program.into(),
            format,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub const fn format(&self) -> DecodeFormat {
        self.format
    }

    // -f wav             = WAV container, the transmitter reads its header
    // -acodec pcm_s16le  = signed 16-bit little-endian samples
    // -ar / -ac          = fixed sample rate and channel count
    // -                  = write to stdout
    fn output_args(&self) -> [String; 9] {
        [
            "-f".to_string(),
            "wav".to_string(),
            "-acodec".to_string(),
            "pcm_s16le".to_string(),
            "-ar".to_string(),
            self.format.sample_rate.to_string(),
            "-ac".to_string(),
            self.format.channels.to_string(),
            "-".to_string(),
        ]
    }

    fn base_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(["-v", "quiet"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        command
    }

    /// Command decoding a single file.
    pub fn command(&self, input: &Path) -> Command {
        let mut command = self.base_command();
        command.arg("-i").arg(input).args(self.output_args());
        command
    }

    /// Command decoding every file named in an ffmpeg concat list.
    pub fn concat_command(&self, list_file: &Path) -> Command {
        let mut command = self.base_command();
        command
            .args(["-f", "concat", "-safe", "0", "-i"])
            .arg(list_file)
            .args(self.output_args());
        command
    }

    /// Spawn a decoder for `input` with stdout piped.
    pub fn spawn(&self, input: &Path) -> Result<Child> {
        debug!("Spawning {} for {}", self.program.display(), input.display());
        self.command(input).spawn().map_err(|source| self.spawn_error(source))
    }

    /// Spawn one decoder producing a continuous stream from several inputs.
    pub fn spawn_concat(&self, inputs: &[PathBuf]) -> Result<ConcatDecode> {
        if inputs.is_empty() {
            return Err(Error::NoTracksFound);
        }

        let list_file =
            std::env::temp_dir().join(format!("pirate_radio_concat_{}.txt", Uuid::new_v4()));
        fs::write(&list_file, concat_list(inputs))?;

        match self.concat_command(&list_file).spawn() {
            Ok(child) => {
                debug!(
                    "Spawned concat decoder for {} inputs ({})",
                    inputs.len(),
                    list_file.display()
                );
                Ok(ConcatDecode { child, list_file })
            }
            Err(source) => {
                let _ = fs::remove_file(&list_file);
                Err(self.spawn_error(source))
            }
        }
    }

    fn spawn_error(&self, source: std::io::Error) -> Error {
        Error::Spawn {
            program: self.program.display().to_string(),
            source,
        }
    }
}

/// Render an ffmpeg concat demuxer list. Single quotes in paths are escaped
/// the way the demuxer expects (`'\''`).
pub fn concat_list(inputs: &[PathBuf]) -> String {
    inputs
        .iter()
        .map(|path| {
            let escaped = path.to_string_lossy().replace('\'', r"'\''");
            format!("file '{escaped}'")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// A running concat decoder. The list file is removed once the process has
/// ended, whether it succeeded, failed, or was killed.
pub struct ConcatDecode {
    child: Child,
    list_file: PathBuf,
}

impl ConcatDecode {
    pub fn list_file(&self) -> &Path {
        &self.list_file
    }

    /// Take the PCM output stream.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Wait for ffmpeg to finish.
    pub fn wait(mut self) -> Result<ExitStatus> {
        Ok(self.child.wait()?)
    }

    /// Stop ffmpeg immediately.
    pub fn kill(mut self) -> Result<ExitStatus> {
        Ok(crate::process::kill_and_reap(&mut self.child)?)
    }
}

impl Drop for ConcatDecode {
    fn drop(&mut self) {
        if let Err(e) = crate::process::kill_and_reap(&mut self.child) {
            warn!("Failed to reap concat decoder: {e}");
        }
        if let Err(e) = fs::remove_file(&self.list_file) {
            debug!("Concat list {} not removed: {e}", self.list_file.display());
        }
    }
}
