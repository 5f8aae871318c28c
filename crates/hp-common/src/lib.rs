//! Host probe common types, IDs, and errors.
//!
//! This crate provides foundational types shared across hp-core modules:
//! - Process identity wrapper
//! - Unified error type with stable codes
//! - Output formats

pub mod error;
pub mod id;
pub mod output;

pub use error::{format_error_human, Error, ErrorCategory, Result, StructuredError, SuggestedAction};
pub use id::ProcessId;
pub use output::OutputFormat;

/// Schema version stamped on every JSON payload the probe emits.
pub const SCHEMA_VERSION: &str = "1.0.0";
