//! One decode stage piped into one emission stage, run per track.

use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use pirate_core::{display_name, DecodeFormat, Error, Result, TransmitterConfig};
use tracing::{debug, info, warn};

use crate::decode::Decoder;
use crate::process;
use crate::transmitter::{ProcessTransmitter, Transmitter};
use crate::{RunOutcome, TrackRunner};

/// Executables and timings of the process pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// ffmpeg binary (path or name in `PATH`).
    pub decoder: PathBuf,
    /// fm_transmitter binary (path or name in `PATH`).
    pub transmitter: PathBuf,
    pub format: DecodeFormat,
    /// Time the transmitter gets to flush after the decoder exits.
    pub drain_grace: Duration,
    /// Time a stopping transmitter gets before it is killed.
    pub stop_grace: Duration,
    /// Decoder exit polling interval.
    pub poll_interval: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            decoder: PathBuf::from("ffmpeg"),
            transmitter: PathBuf::from("fm_transmitter"),
            format: DecodeFormat::default(),
            drain_grace: Duration::from_millis(500),
            stop_grace: ProcessTransmitter::DEFAULT_STOP_GRACE,
            poll_interval: Duration::from_millis(20),
        }
    }
}

/// Processes owned by the active run.
#[derive(Default)]
struct Stages {
    decoder: Option<Child>,
    transmitter: Option<ProcessTransmitter>,
}

/// [`TrackRunner`] that pipes `ffmpeg` into `fm_transmitter`.
pub struct ProcessPipeline {
    settings: PipelineSettings,
    decoder: Decoder,
    stages: Mutex<Stages>,
    cancelled: AtomicBool,
}

impl ProcessPipeline {
    pub fn new(settings: PipelineSettings) -> Self {
        let decoder = Decoder::new(settings.decoder.clone(), settings.format);
        Self {
            settings,
            decoder,
            stages: Mutex::new(Stages::default()),
            cancelled: AtomicBool::new(false),
        }
    }

    pub const fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Whether a run currently holds any process.
    pub fn is_active(&self) -> bool {
        let stages = self.stages.lock();
        stages.decoder.is_some() || stages.transmitter.is_some()
    }

    /// Start both stages and hand them to `stages`. The transmitter handle is
    /// created first so a missing transmitter never leaves a decoder behind.
    fn launch(&self, track: &Path, config: &TransmitterConfig) -> Result<()> {
        let mut transmitter = ProcessTransmitter::new(&self.settings.transmitter)?
            .with_stop_grace(self.settings.stop_grace);

        let mut decoder = self.decoder.spawn(track)?;
        let Some(stdout) = decoder.stdout.take() else {
            let _ = process::kill_and_reap(&mut decoder);
            return Err(Error::Unknown("decoder stdout not captured".to_string()));
        };

        if let Err(e) = transmitter.start_stream(Stdio::from(stdout), config) {
            let _ = process::kill_and_reap(&mut decoder);
            return Err(e);
        }

        let mut stages = self.stages.lock();
        stages.decoder = Some(decoder);
        stages.transmitter = Some(transmitter);
        Ok(())
    }

    /// Block until the decoder exits. `None` means the run was cancelled.
    fn wait_for_decoder(&self) -> Result<Option<ExitStatus>> {
        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                return Ok(None);
            }
            {
                let mut stages = self.stages.lock();
                let Some(decoder) = stages.decoder.as_mut() else {
                    return Ok(None);
                };
                if let Some(status) = decoder.try_wait()? {
                    return Ok(Some(status));
                }
            }
            thread::sleep(self.settings.poll_interval);
        }
    }

    /// Give the transmitter time to play out buffered audio.
    fn drain(&self) {
        let deadline = Instant::now() + self.settings.drain_grace;
        while Instant::now() < deadline && !self.cancelled.load(Ordering::SeqCst) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            thread::sleep(remaining.min(self.settings.poll_interval));
        }
    }

    /// Release both stages. Returns the transmitter's failure, if it died on
    /// its own before being stopped.
    fn teardown(&self) -> Option<String> {
        let (decoder, transmitter) = {
            let mut stages = self.stages.lock();
            (stages.decoder.take(), stages.transmitter.take())
        };

        if let Some(mut decoder) = decoder {
            if let Err(e) = process::kill_and_reap(&mut decoder) {
                warn!("Failed to reap decoder: {e}");
            }
        }

        let mut transmitter = transmitter?;
        let failure = transmitter.failure();
        transmitter.stop();
        failure
    }
}

impl TrackRunner for ProcessPipeline {
    fn run(&self, track: &Path, config: &TransmitterConfig) -> Result<RunOutcome> {
        if self.cancelled.swap(false, Ordering::SeqCst) {
            debug!("Pending cancel consumed before {}", track.display());
            return Ok(RunOutcome::Cancelled);
        }

        self.launch(track, config)?;
        debug!("Pipeline running for {}", track.display());

        let waited = self.wait_for_decoder();
        if matches!(waited, Ok(Some(_))) {
            self.drain();
        }
        let transmit_failure = self.teardown();

        if self.cancelled.swap(false, Ordering::SeqCst) {
            info!("Skipped {}", display_name(track));
            return Ok(RunOutcome::Cancelled);
        }

        // A failed decode leaves the transmitter with a truncated stream, so
        // its own exit status says nothing about the track.
        match (waited?, transmit_failure) {
            (Some(status), failure) if !status.success() => {
                debug!("Decoder for {} exited with {status}", track.display());
                if let Some(reason) = failure {
                    debug!("Transmitter also failed: {reason}");
                }
                Err(Error::ConversionFailed(track.to_path_buf()))
            }
            (_, Some(reason)) => Err(Error::TransmissionFailed(reason)),
            (Some(_), None) => Ok(RunOutcome::Completed),
            (None, None) => Ok(RunOutcome::Cancelled),
        }
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);

        let mut stages = self.stages.lock();
        if let Some(decoder) = stages.decoder.as_mut() {
            if let Err(e) = decoder.kill() {
                debug!("Decoder kill failed: {e}");
            }
        }
        if let Some(transmitter) = stages.transmitter.as_mut() {
            transmitter.request_stop();
        }
    }

    fn reset_cancel(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

impl Drop for ProcessPipeline {
    fn drop(&mut self) {
        self.teardown();
    }
}
