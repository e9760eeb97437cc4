//! Permission-mask comparison.
//!
//! Modes are compared as plain numbers after masking to `0o777`, so
//! `<= 0644` accepts `0640` and `0600` but also `0077`. That is the
//! benchmark's definition, not a bitwise subset test.

use super::{mode_bits, PredicateError, Verdict};
use crate::bounded::IoBounds;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::Metadata;
use std::path::Path;
use std::str::FromStr;

/// Bits taken into account by permission checks.
pub const PERMISSION_MASK: u32 = 0o777;

/// Relational operator for permission thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermissionOp {
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = ">")]
    Gt,
}

impl PermissionOp {
    pub const ALL: [PermissionOp; 5] = [
        PermissionOp::Le,
        PermissionOp::Eq,
        PermissionOp::Lt,
        PermissionOp::Ge,
        PermissionOp::Gt,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            PermissionOp::Le => "<=",
            PermissionOp::Eq => "==",
            PermissionOp::Lt => "<",
            PermissionOp::Ge => ">=",
            PermissionOp::Gt => ">",
        }
    }

    /// Symbol that holds when this operator does not.
    pub fn negated_symbol(self) -> &'static str {
        match self {
            PermissionOp::Le => ">",
            PermissionOp::Eq => "!=",
            PermissionOp::Lt => ">=",
            PermissionOp::Ge => "<",
            PermissionOp::Gt => "<=",
        }
    }

    /// `actual op threshold`.
    pub fn apply(self, actual: u32, threshold: u32) -> bool {
        match self {
            PermissionOp::Le => actual <= threshold,
            PermissionOp::Eq => actual == threshold,
            PermissionOp::Lt => actual < threshold,
            PermissionOp::Ge => actual >= threshold,
            PermissionOp::Gt => actual > threshold,
        }
    }
}

impl fmt::Display for PermissionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for PermissionOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "<=" => Ok(PermissionOp::Le),
            "==" | "=" => Ok(PermissionOp::Eq),
            "<" => Ok(PermissionOp::Lt),
            ">=" => Ok(PermissionOp::Ge),
            ">" => Ok(PermissionOp::Gt),
            other => Err(format!("unknown permission operator: {}", other)),
        }
    }
}

/// `mode & 0o777 <op> threshold`, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionPredicate {
    pub op: PermissionOp,
    pub threshold: u32,
}

impl PermissionPredicate {
    pub fn new(op: PermissionOp, threshold: u32) -> Self {
        Self {
            op,
            threshold: threshold & PERMISSION_MASK,
        }
    }

    /// The usual benchmark form, `<= threshold`.
    pub fn at_most(threshold: u32) -> Self {
        Self::new(PermissionOp::Le, threshold)
    }

    /// Pure evaluation over raw mode bits.
    pub fn evaluate_mode(&self, mode: u32) -> Verdict {
        let actual = mode & PERMISSION_MASK;
        if self.op.apply(actual, self.threshold) {
            Verdict::pass(format!("{:04o} {} {:04o}", actual, self.op, self.threshold))
        } else {
            Verdict::fail(format!(
                "{:04o} {} {:04o}",
                actual,
                self.op.negated_symbol(),
                self.threshold
            ))
        }
    }

    pub fn evaluate_metadata(&self, meta: &Metadata) -> Result<Verdict, PredicateError> {
        Ok(self.evaluate_mode(mode_bits(meta)?))
    }

    /// Stat `path` (following symlinks) and evaluate.
    pub fn evaluate(&self, path: &Path, bounds: &IoBounds) -> Result<Verdict, PredicateError> {
        let meta = bounds
            .metadata(path)
            .map_err(|source| PredicateError::Metadata {
                path: path.to_path_buf(),
                source,
            })?;
        self.evaluate_metadata(&meta)
    }
}

impl fmt::Display for PermissionPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "permissions {} {:04o}", self.op, self.threshold)
    }
}

/// Check that `path`'s permission bits satisfy `op threshold`.
pub fn check_permissions(
    path: &Path,
    op: PermissionOp,
    threshold: u32,
    bounds: &IoBounds,
) -> Result<Verdict, PredicateError> {
    PermissionPredicate::new(op, threshold).evaluate(path, bounds)
}
