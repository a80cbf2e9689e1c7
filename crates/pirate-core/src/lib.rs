//! # pirate-core
//!
//! Core types and error handling for the Pirate Radio FM broadcaster.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
