//! # pirate-pipeline
//!
//! Per-track process pipeline for Pirate Radio.
//!
//! Features:
//! - FFmpeg decoding of any supported container to WAV PCM on a pipe
//! - `fm_transmitter` emission stage behind the [`Transmitter`] handle
//! - Cancellable [`ProcessPipeline`] with drain grace and guaranteed teardown

pub mod decode;
pub mod pipeline;
pub mod process;
pub mod transmitter;

pub use decode::{concat_list, ConcatDecode, Decoder};
pub use pipeline::{PipelineSettings, ProcessPipeline};
pub use transmitter::{ProcessTransmitter, Transmitter};

use std::path::Path;

use pirate_core::{Result, TransmitterConfig};

/// How a track run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The decoder reached the end of the track.
    Completed,
    /// The run was cut short by [`TrackRunner::cancel`].
    Cancelled,
}

/// Plays one track at a time on behalf of the broadcast loop.
pub trait TrackRunner: Send + Sync {
    /// Play `track` to completion or until cancelled. Blocks the caller.
    fn run(&self, track: &Path, config: &TransmitterConfig) -> Result<RunOutcome>;

    /// Interrupt the active run. A cancel issued while idle applies to the
    /// next run unless cleared with [`TrackRunner::reset_cancel`].
    fn cancel(&self);

    /// Drop a pending cancel request.
    fn reset_cancel(&self);
}
