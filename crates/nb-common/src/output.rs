//! Output format specifications.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Supported output formats for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Structured JSON report (default for machine consumption)
    #[default]
    Json,

    /// Human-readable Markdown table
    Md,

    /// One-line summary for quick status checks
    Summary,

    /// One JSON object per item, streamed
    Jsonl,

    /// Minimal output (exit code only)
    Exitcode,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Md => write!(f, "md"),
            OutputFormat::Summary => write!(f, "summary"),
            OutputFormat::Jsonl => write!(f, "jsonl"),
            OutputFormat::Exitcode => write!(f, "exitcode"),
        }
    }
}
