//! Node Bench common types, IDs, and errors.
//!
//! This crate provides foundational types shared across nb-core modules:
//! - Benchmark item identity
//! - Common error types with stable codes
//! - Output format specifications
//! - Report schema versioning

pub mod error;
pub mod id;
pub mod output;

pub use error::{format_error_human, Error, ErrorCategory, Result, StructuredError, SuggestedAction};
pub use id::ItemId;
pub use output::OutputFormat;

/// Schema version of the JSON report emitted by `node-bench`.
pub const SCHEMA_VERSION: &str = "1.0.0";
