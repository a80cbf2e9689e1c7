//! Transmitter configuration.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// FM broadcast band in MHz.
pub const FREQUENCY_RANGE: RangeInclusive<f32> = 87.5..=108.0;

/// Highest DMA channel the transmitter accepts.
pub const MAX_DMA_CHANNEL: u16 = 15;

/// Settings handed to the emission stage for every track.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransmitterConfig {
    /// Carrier frequency in MHz.
    pub frequency: f32,
    /// Bandwidth in kHz.
    pub bandwidth: f32,
    /// DMA channel (0-15).
    pub dma_channel: u16,
    /// Repeat the input once it ends.
    pub loop_playback: bool,
}

impl Default for TransmitterConfig {
    fn default() -> Self {
        Self {
            frequency: 100.0,
            bandwidth: 200.0,
            dma_channel: 0,
            loop_playback: false,
        }
    }
}

impl TransmitterConfig {
    #[must_use]
    pub const fn with_frequency(mut self, frequency: f32) -> Self {
        self.frequency = frequency;
        self
    }

    /// Check the values against what the transmitter can emit.
    pub fn validate(&self) -> Result<()> {
        if !FREQUENCY_RANGE.contains(&self.frequency) {
            return Err(Error::Config(format!(
                "frequency {:.1} MHz outside {:.1}-{:.1} MHz",
                self.frequency,
                FREQUENCY_RANGE.start(),
                FREQUENCY_RANGE.end()
            )));
        }
        if !(self.bandwidth > 0.0) {
            return Err(Error::Config(format!(
                "bandwidth must be positive, got {}",
                self.bandwidth
            )));
        }
        if self.dma_channel > MAX_DMA_CHANNEL {
            return Err(Error::Config(format!(
                "DMA channel {} exceeds {MAX_DMA_CHANNEL}",
                self.dma_channel
            )));
        }
        Ok(())
    }
}
