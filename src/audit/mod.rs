//! Core audit event parsing and data structures.
//!
//! ## Key Components
//!
//! - [`types`] - Data structures representing audit log events

pub mod types;
