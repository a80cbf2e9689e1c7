//! # pirate-station
//!
//! Broadcast engine for Pirate Radio.
//!
//! Features:
//! - Background loop playing the catalog through a [`TrackRunner`]
//! - Synchronous transport controls callable from any thread
//! - Lifecycle events serialized onto a single observer thread

pub mod notify;
pub mod station;

pub use notify::{Notifier, StationObserver};
pub use station::{RadioStation, StationSettings};

pub use pirate_pipeline::{RunOutcome, TrackRunner};
