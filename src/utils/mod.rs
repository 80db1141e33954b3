//! Shared utilities.
//!
//! - [`time`] - Timestamp parsing helpers

pub mod time;
