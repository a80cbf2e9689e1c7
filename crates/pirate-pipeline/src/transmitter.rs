//! Emission stage: the FM transmitter handle.

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;

use pirate_core::{is_compatible_wav, Error, Result, TransmitterConfig};
use tracing::{debug, info, warn};

use crate::process;

/// Handle-based contract of the signal-emission engine.
///
/// Creating a handle may fail with [`Error::InitFailed`]; dropping it releases
/// the engine.
pub trait Transmitter: Send {
    /// Transmit a WAV file.
    fn start_file(&mut self, path: &Path, config: &TransmitterConfig) -> Result<()>;

    /// Transmit WAV data read from `input`.
    fn start_stream(&mut self, input: Stdio, config: &TransmitterConfig) -> Result<()>;

    /// Stop the current transmission, if any.
    fn stop(&mut self);

    fn is_running(&mut self) -> bool;

    /// Description of the most recent failure.
    fn last_error(&self) -> Option<&str>;
}

/// [`Transmitter`] backed by the `fm_transmitter` executable.
pub struct ProcessTransmitter {
    /// Resolved executable path.
    program: PathBuf,
    /// Time allowed between SIGTERM and SIGKILL on stop.
    stop_grace: Duration,
    child: Option<Child>,
    exit_status: Option<ExitStatus>,
    last_error: Option<String>,
}

impl ProcessTransmitter {
    /// Default time a stopping transmitter gets before it is killed.
    pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(1);

    /// Create a handle for `program` (a path or a name looked up in `PATH`).
    pub fn new(program: impl AsRef<Path>) -> Result<Self> {
        let program = process::resolve_program(program.as_ref()).ok_or(Error::InitFailed)?;
        Ok(Self {
            program,
            stop_grace: Self::DEFAULT_STOP_GRACE,
            child: None,
            exit_status: None,
            last_error: None,
        })
    }

    #[must_use]
    pub const fn with_stop_grace(mut self, stop_grace: Duration) -> Self {
        self.stop_grace = stop_grace;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Exit status of the last transmission, once it has ended.
    pub const fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    /// Command-line arguments for one transmission of `source`.
    pub fn args(config: &TransmitterConfig, source: &OsStr) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-f".into(),
            format!("{:.1}", config.frequency).into(),
            "-b".into(),
            format!("{}", config.bandwidth).into(),
            "-d".into(),
            config.dma_channel.to_string().into(),
        ];
        if config.loop_playback {
            args.push("-r".into());
        }
        args.push(source.to_os_string());
        args
    }

    /// Reason the last transmission ended abnormally. `None` while running,
    /// after a clean exit, or after an explicit stop.
    pub fn failure(&mut self) -> Option<String> {
        if self.is_running() {
            return None;
        }
        match self.exit_status {
            Some(status) if !status.success() => self.last_error.clone(),
            _ => None,
        }
    }

    /// Ask the transmitter to exit without waiting for it.
    pub fn request_stop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            if let Err(e) = process::request_terminate(child) {
                debug!("Stop request to transmitter failed: {e}");
            }
        }
    }

    fn launch(&mut self, source: &OsStr, stdin: Stdio, config: &TransmitterConfig) -> Result<()> {
        if self.is_running() {
            return Err(Error::AlreadyRunning);
        }

        self.exit_status = None;
        self.last_error = None;

        let spawned = Command::new(&self.program)
            .args(Self::args(config, source))
            .stdin(stdin)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            Ok(child) => {
                info!(
                    "Transmitting {} at {:.1} MHz",
                    source.to_string_lossy(),
                    config.frequency
                );
                self.child = Some(child);
                Ok(())
            }
            Err(e) => {
                let error = match e.kind() {
                    io::ErrorKind::NotFound => Error::InitFailed,
                    io::ErrorKind::PermissionDenied => Error::PermissionDenied,
                    _ => Error::TransmissionFailed(e.to_string()),
                };
                self.last_error = Some(error.to_string());
                Err(error)
            }
        }
    }

    fn record_exit(&mut self, status: ExitStatus) {
        self.child = None;
        self.exit_status = Some(status);
        if !status.success() {
            self.last_error = Some(format!(
                "{} exited with {status}",
                self.program.display()
            ));
        }
    }
}

impl Transmitter for ProcessTransmitter {
    fn start_file(&mut self, path: &Path, config: &TransmitterConfig) -> Result<()> {
        if !path.is_file() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        if !is_compatible_wav(path) {
            return Err(Error::InvalidFormat);
        }
        self.launch(path.as_os_str(), Stdio::null(), config)
    }

    fn start_stream(&mut self, input: Stdio, config: &TransmitterConfig) -> Result<()> {
        self.launch(OsStr::new("-"), input, config)
    }

    fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        match process::terminate(&mut child, self.stop_grace) {
            Ok(status) => {
                debug!("Transmitter stopped ({status})");
                self.exit_status = Some(status);
            }
            Err(e) => warn!("Failed to stop transmitter: {e}"),
        }
    }

    fn is_running(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                self.record_exit(status);
                false
            }
            Err(e) => {
                warn!("Failed to poll transmitter: {e}");
                false
            }
        }
    }

    fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

impl Drop for ProcessTransmitter {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_args() {
        let config = TransmitterConfig::default().with_frequency(91.3);
        let args = ProcessTransmitter::args(&config, OsStr::new("-"));
        assert_eq!(strings(&args), ["-f", "91.3", "-b", "200", "-d", "0", "-"]);

        let config = TransmitterConfig {
            loop_playback: true,
            dma_channel: 5,
            ..TransmitterConfig::default()
        };
        let args = ProcessTransmitter::args(&config, OsStr::new("/tmp/a.wav"));
        assert_eq!(
            strings(&args),
            ["-f", "100.0", "-b", "200", "-d", "5", "-r", "/tmp/a.wav"]
        );
    }

    #[test]
    fn test_missing_executable() {
        let err = ProcessTransmitter::new("/nonexistent/fm_transmitter")
            .err()
            .unwrap();
        assert!(matches!(err, Error::InitFailed));
    }

    #[cfg(unix)]
    mod process_backed {
        use super::*;
        use crate::test_support::{script, PROCESS_LOCK};
        use std::fs;
        use std::time::Instant;

        fn wait_for_exit(transmitter: &mut ProcessTransmitter) -> bool {
            let deadline = Instant::now() + Duration::from_secs(5);
            while Instant::now() < deadline {
                if !transmitter.is_running() {
                    return true;
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            false
        }

        #[test]
        fn test_start_file_validation() {
            let dir = tempfile::tempdir().unwrap();
            let _guard = PROCESS_LOCK.lock();
            let program = script(dir.path(), "fm_transmitter", "exit 0");
            let mp3 = dir.path().join("a.mp3");
            fs::write(&mp3, b"").unwrap();

            let mut transmitter = ProcessTransmitter::new(&program).unwrap();
            let config = TransmitterConfig::default();

            let missing = dir.path().join("missing.wav");
            assert!(matches!(
                transmitter.start_file(&missing, &config),
                Err(Error::FileNotFound(path)) if path == missing
            ));
            assert!(matches!(
                transmitter.start_file(&mp3, &config),
                Err(Error::InvalidFormat)
            ));
            assert!(!transmitter.is_running());
        }

        #[test]
        fn test_start_stop_cycle() {
            let dir = tempfile::tempdir().unwrap();
            let _guard = PROCESS_LOCK.lock();
            let program = script(dir.path(), "fm_transmitter", "exec sleep 10");
            let wav = dir.path().join("tone.wav");
            fs::write(&wav, b"").unwrap();

            let mut transmitter = ProcessTransmitter::new(&program).unwrap();
            let config = TransmitterConfig::default();

            transmitter.start_file(&wav, &config).unwrap();
            assert!(transmitter.is_running());
            assert!(matches!(
                transmitter.start_stream(Stdio::null(), &config),
                Err(Error::AlreadyRunning)
            ));

            transmitter.stop();
            assert!(!transmitter.is_running());
            assert!(transmitter.last_error().is_none());
            assert!(transmitter.failure().is_none());

            // The handle can be reused after a stop.
            transmitter.start_stream(Stdio::null(), &config).unwrap();
            assert!(transmitter.is_running());
        }

        #[test]
        fn test_crash_is_reported() {
            let dir = tempfile::tempdir().unwrap();
            let _guard = PROCESS_LOCK.lock();
            let program = script(dir.path(), "fm_transmitter", "exit 3");

            let mut transmitter = ProcessTransmitter::new(&program).unwrap();
            transmitter
                .start_stream(Stdio::null(), &TransmitterConfig::default())
                .unwrap();

            assert!(wait_for_exit(&mut transmitter));
            assert_eq!(transmitter.exit_status().unwrap().code(), Some(3));
            assert!(transmitter.last_error().unwrap().contains("exited with"));
            assert!(transmitter.failure().is_some());
        }
    }
}
