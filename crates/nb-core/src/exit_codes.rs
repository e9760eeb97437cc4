//! Exit codes for the node-bench CLI.
//!
//! Exit codes communicate the run outcome without requiring output parsing.
//!
//! Exit code ranges:
//! - 0-9: Run outcomes (the benchmark ran; parse the result from the code)
//! - 10-19: User/environment errors (recoverable by user action)
//! - 20-29: Internal errors (bugs, should be reported)

use crate::bench::RunReport;

/// Exit codes for node-bench operations.
///
/// These codes are a stable contract for automation. Changes require
/// a major version bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    // ========================================================================
    // Run Outcomes (0-9)
    // ========================================================================
    /// No item failed or errored
    Clean = 0,

    /// At least one item failed
    Findings = 1,

    /// At least one item could not be evaluated
    CheckErrors = 3,

    // ========================================================================
    // User / Environment Errors (10-19)
    // ========================================================================
    /// Invalid arguments
    ArgsError = 10,

    /// Configuration file missing, unreadable or invalid
    ConfigError = 11,

    // ========================================================================
    // Internal Errors (20-29)
    // ========================================================================
    /// Internal error (bug - please report)
    InternalError = 20,
}

impl ExitCode {
    /// Exit code for a finished run. Errors outrank failures.
    pub fn from_report(report: &RunReport) -> Self {
        if report.has_errors() {
            ExitCode::CheckErrors
        } else if report.has_failures() {
            ExitCode::Findings
        } else {
            ExitCode::Clean
        }
    }

    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Check if this exit code reports a finished run (codes 0-9).
    pub fn is_operational(self) -> bool {
        (self as i32) < 10
    }

    /// Check if this exit code is a user/environment error (codes 10-19).
    pub fn is_user_error(self) -> bool {
        let code = self as i32;
        (10..20).contains(&code)
    }

    /// Check if this exit code is an internal error (codes 20-29).
    pub fn is_internal_error(self) -> bool {
        (self as i32) >= 20
    }

    /// Get the code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::Findings => "OK_FINDINGS",
            ExitCode::CheckErrors => "ERR_CHECKS",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::InternalError => "ERR_INTERNAL",
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::{CheckOutcome, ItemReport, MissingProcessPolicy, Summary};
    use chrono::Utc;

    fn report(outcomes: Vec<CheckOutcome>) -> RunReport {
        let items: Vec<ItemReport> = outcomes
            .into_iter()
            .enumerate()
            .map(|(i, outcome)| ItemReport {
                id: [2, 2, i as u32 + 1].into(),
                title: "t".into(),
                scored: true,
                outcome,
            })
            .collect();
        RunReport {
            schema_version: nb_common::SCHEMA_VERSION.into(),
            run_id: "run-1".into(),
            host_id: "host-1".into(),
            generated_at: Utc::now(),
            duration_ms: 1,
            missing_process: MissingProcessPolicy::Skip,
            summary: Summary::tally(&items),
            items,
        }
    }

    fn pass() -> CheckOutcome {
        CheckOutcome::Pass { detail: "ok".into() }
    }

    fn fail() -> CheckOutcome {
        CheckOutcome::Fail { detail: "bad".into() }
    }

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ExitCode::Clean.as_i32(), 0);
        assert_eq!(ExitCode::Findings.as_i32(), 1);
        assert_eq!(ExitCode::CheckErrors.as_i32(), 3);
        assert_eq!(ExitCode::ArgsError.as_i32(), 10);
        assert_eq!(ExitCode::ConfigError.as_i32(), 11);
        assert_eq!(ExitCode::InternalError.as_i32(), 20);
    }

    #[test]
    fn test_from_report() {
        assert_eq!(ExitCode::from_report(&report(vec![pass(), pass()])), ExitCode::Clean);
        assert_eq!(ExitCode::from_report(&report(vec![pass(), fail()])), ExitCode::Findings);

        let err = CheckOutcome::error(&nb_common::Error::ProcessTable("boom".into()));
        assert_eq!(
            ExitCode::from_report(&report(vec![fail(), err])),
            ExitCode::CheckErrors
        );
        assert_eq!(ExitCode::from_report(&report(vec![])), ExitCode::Clean);
    }

    #[test]
    fn test_ranges() {
        assert!(ExitCode::Findings.is_operational());
        assert!(ExitCode::ConfigError.is_user_error());
        assert!(ExitCode::InternalError.is_internal_error());
        assert_eq!(ExitCode::ArgsError.to_string(), "ERR_ARGS (10)");
    }
}
