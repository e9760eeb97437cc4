//! Error types for Node Bench.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Remediation suggestions for humans
//! - Suggested actions for automation
//!
//! Absence conditions (process not running, flag not set, file missing) are
//! never errors; they surface as skipped items. Everything in here is a hard
//! failure of a single check or of the run setup.
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ Permission Denied
//!   Reason: permission denied reading /etc/kubernetes/pki
//!   Fix: Run the benchmark as root so process and file metadata are readable.
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Node Bench operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration file errors.
    Config,
    /// Process table lookup errors.
    Process,
    /// Filesystem metadata errors.
    Filesystem,
    /// User and group database errors.
    Identity,
    /// Generic I/O and serialization errors.
    Io,
    /// Platform compatibility errors.
    Platform,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Process => write!(f, "process"),
            ErrorCategory::Filesystem => write!(f, "filesystem"),
            ErrorCategory::Identity => write!(f, "identity"),
            ErrorCategory::Io => write!(f, "io"),
            ErrorCategory::Platform => write!(f, "platform"),
        }
    }
}

/// Suggested actions for operators and automation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    /// Retry the run.
    Retry,
    /// Fix the configuration file.
    FixConfig,
    /// Re-run with elevated privileges.
    Elevate,
    /// Manual investigation required.
    ManualIntervention,
    /// Abort; nothing can be done from here.
    Abort,
}

impl std::fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuggestedAction::Retry => write!(f, "retry"),
            SuggestedAction::FixConfig => write!(f, "fix_config"),
            SuggestedAction::Elevate => write!(f, "elevate"),
            SuggestedAction::ManualIntervention => write!(f, "manual_intervention"),
            SuggestedAction::Abort => write!(f, "abort"),
        }
    }
}

/// Unified error type for Node Bench.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // Process table errors (20-29)
    #[error("process table lookup failed: {0}")]
    ProcessTable(String),

    #[error("permission denied enumerating processes under {path}")]
    ProcessTableDenied { path: PathBuf },

    // Filesystem errors (30-39)
    #[error("permission denied reading {path}")]
    PermissionDenied { path: PathBuf },

    #[error("cannot read metadata of {path}: {message}")]
    Metadata { path: PathBuf, message: String },

    #[error("{operation} timed out after {millis}ms")]
    Timeout { operation: String, millis: u64 },

    // Identity errors (40-49)
    #[error("unknown {kind} '{name}' on this host")]
    UnknownPrincipal { kind: String, name: String },

    #[error("cannot read {kind} database {path}: {message}")]
    PrincipalDatabase {
        kind: String,
        path: PathBuf,
        message: String,
    },

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Platform errors (70-79)
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Process table errors
    /// - 30-39: Filesystem errors
    /// - 40-49: Identity errors
    /// - 60-69: I/O errors
    /// - 70-79: Platform errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidConfig(_) => 11,
            Error::ProcessTable(_) => 20,
            Error::ProcessTableDenied { .. } => 21,
            Error::PermissionDenied { .. } => 30,
            Error::Metadata { .. } => 31,
            Error::Timeout { .. } => 32,
            Error::UnknownPrincipal { .. } => 40,
            Error::PrincipalDatabase { .. } => 41,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
            Error::UnsupportedPlatform(_) => 70,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidConfig(_) => ErrorCategory::Config,
            Error::ProcessTable(_) | Error::ProcessTableDenied { .. } => ErrorCategory::Process,
            Error::PermissionDenied { .. } | Error::Metadata { .. } | Error::Timeout { .. } => {
                ErrorCategory::Filesystem
            }
            Error::UnknownPrincipal { .. } | Error::PrincipalDatabase { .. } => {
                ErrorCategory::Identity
            }
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
            Error::UnsupportedPlatform(_) => ErrorCategory::Platform,
        }
    }

    /// Returns the suggested action for this error.
    pub fn suggested_action(&self) -> SuggestedAction {
        match self {
            Error::Config(_) | Error::InvalidConfig(_) => SuggestedAction::FixConfig,
            Error::ProcessTable(_) => SuggestedAction::Retry,
            Error::ProcessTableDenied { .. } | Error::PermissionDenied { .. } => {
                SuggestedAction::Elevate
            }
            Error::Metadata { .. } => SuggestedAction::ManualIntervention,
            Error::Timeout { .. } => SuggestedAction::Retry,
            Error::UnknownPrincipal { .. } | Error::PrincipalDatabase { .. } => {
                SuggestedAction::ManualIntervention
            }
            Error::Io(_) => SuggestedAction::Retry,
            Error::Json(_) => SuggestedAction::ManualIntervention,
            Error::UnsupportedPlatform(_) => SuggestedAction::Abort,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) | Error::InvalidConfig(_) => {
                "Check the TOML syntax and values in the config file, or run 'node-bench config show'."
            }
            Error::ProcessTable(_) => {
                "Retry the run. If persistent, check that the process table is mounted and readable."
            }
            Error::ProcessTableDenied { .. } | Error::PermissionDenied { .. } => {
                "Run the benchmark as root so process and file metadata are readable."
            }
            Error::Metadata { .. } => {
                "Inspect the path manually; the filesystem returned an unexpected error."
            }
            Error::Timeout { .. } => {
                "A filesystem or process-table call hung. Check for stale network mounts, or raise --timeout."
            }
            Error::UnknownPrincipal { .. } => {
                "The expected owner does not exist on this host. Check the user and group databases."
            }
            Error::PrincipalDatabase { .. } => {
                "The user or group database is unreadable. Check its permissions and format."
            }
            Error::Io(_) => "Check permissions and retry the operation.",
            Error::Json(_) => "Internal serialization failure. Please report it.",
            Error::UnsupportedPlatform(_) => {
                "This check is not available on your platform. Run it on a Linux node."
            }
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::InvalidConfig(_) => "Invalid Configuration",
            Error::ProcessTable(_) => "Process Lookup Error",
            Error::ProcessTableDenied { .. } => "Process Table Unreadable",
            Error::PermissionDenied { .. } => "Permission Denied",
            Error::Metadata { .. } => "Metadata Error",
            Error::Timeout { .. } => "Operation Timed Out",
            Error::UnknownPrincipal { .. } => "Unknown User or Group",
            Error::PrincipalDatabase { .. } => "Identity Database Error",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Error",
            Error::UnsupportedPlatform(_) => "Unsupported Platform",
        }
    }
}

/// Structured error for JSON output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Suggested action.
    pub suggested_action: SuggestedAction,

    /// Additional structured context (e.g., file path).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::ProcessTableDenied { path }
            | Error::PermissionDenied { path }
            | Error::Metadata { path, .. }
            | Error::PrincipalDatabase { path, .. } => {
                context.insert("path".to_string(), serde_json::json!(path));
            }
            Error::Timeout { operation, millis } => {
                context.insert("operation".to_string(), serde_json::json!(operation));
                context.insert("timeout_ms".to_string(), serde_json::json!(millis));
            }
            Error::UnknownPrincipal { kind, name } => {
                context.insert(kind.clone(), serde_json::json!(name));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            suggested_action: err.suggested_action(),
            context,
        }
    }
}

impl StructuredError {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}

/// Format an error for human-readable stderr output.
///
/// Output format:
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        red = red,
        cyan = cyan,
        reset = reset,
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}
