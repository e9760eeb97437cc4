//! Per-item outcomes and the missing-process policy.

use nb_common::StructuredError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// What to report when a target process is not running.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum MissingProcessPolicy {
    /// Dependent items fail.
    Fail,
    /// Dependent items are skipped.
    #[default]
    Skip,
}

impl fmt::Display for MissingProcessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingProcessPolicy::Fail => write!(f, "fail"),
            MissingProcessPolicy::Skip => write!(f, "skip"),
        }
    }
}

/// Unmet prerequisite of a check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// The target process is not running.
    ProcessNotFound { process: String },
    /// The flag naming the subject is absent from the argument vector.
    FlagNotSet { flag: String },
    /// The subject path does not exist.
    FileNotFound { path: PathBuf },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::ProcessNotFound { process } => write!(f, "process not found: {}", process),
            SkipReason::FlagNotSet { flag } => write!(f, "flag not set: --{}", flag),
            SkipReason::FileNotFound { path } => write!(f, "file not found: {}", path.display()),
        }
    }
}

/// Coarse status of an outcome, for summaries and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pass,
    Fail,
    Skip,
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Pass => write!(f, "PASS"),
            Status::Fail => write!(f, "FAIL"),
            Status::Skip => write!(f, "SKIP"),
            Status::Error => write!(f, "ERROR"),
        }
    }
}

/// Exactly one of these is recorded per evaluated item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckOutcome {
    Pass { detail: String },
    Fail { detail: String },
    Skip { reason: SkipReason },
    Error { error: StructuredError },
}

impl CheckOutcome {
    pub fn error(err: &nb_common::Error) -> Self {
        CheckOutcome::Error {
            error: StructuredError::from(err),
        }
    }

    pub fn status(&self) -> Status {
        match self {
            CheckOutcome::Pass { .. } => Status::Pass,
            CheckOutcome::Fail { .. } => Status::Fail,
            CheckOutcome::Skip { .. } => Status::Skip,
            CheckOutcome::Error { .. } => Status::Error,
        }
    }

    /// Detail, skip reason or error message as one line.
    pub fn message(&self) -> String {
        match self {
            CheckOutcome::Pass { detail } | CheckOutcome::Fail { detail } => detail.clone(),
            CheckOutcome::Skip { reason } => reason.to_string(),
            CheckOutcome::Error { error } => error.message.clone(),
        }
    }
}

impl MissingProcessPolicy {
    /// Outcome for an item whose process is not running.
    pub fn outcome(self, process: &str) -> CheckOutcome {
        let reason = SkipReason::ProcessNotFound {
            process: process.to_string(),
        };
        match self {
            MissingProcessPolicy::Skip => CheckOutcome::Skip { reason },
            MissingProcessPolicy::Fail => CheckOutcome::Fail {
                detail: reason.to_string(),
            },
        }
    }
}
