//! Predicates over a process's effective flag values.

use super::Verdict;
use crate::process::ProcessHandle;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Expected shape of a flag value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum FlagPredicate {
    Equals(String),
    NotEquals(String),
    IsSet,
    IsNotSet,
    /// A comma-separated list value must not contain the entry.
    ListExcludes(String),
}

impl fmt::Display for FlagPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagPredicate::Equals(v) => write!(f, "== {}", v),
            FlagPredicate::NotEquals(v) => write!(f, "!= {}", v),
            FlagPredicate::IsSet => write!(f, "is set"),
            FlagPredicate::IsNotSet => write!(f, "is not set"),
            FlagPredicate::ListExcludes(v) => write!(f, "excludes {}", v),
        }
    }
}

/// A flag predicate bound to a flag name and the process's built-in default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagCheck {
    pub flag: String,
    pub predicate: FlagPredicate,
    /// Value the process uses when the flag is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl FlagCheck {
    pub fn new(flag: impl Into<String>, predicate: FlagPredicate) -> Self {
        Self {
            flag: flag.into(),
            predicate,
            default: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Evaluate against the flags of `handle`.
    ///
    /// `IsSet` and `IsNotSet` look at the argument vector only; the other
    /// predicates see the default when the flag is absent.
    pub fn evaluate(&self, handle: &ProcessHandle) -> Verdict {
        let explicit = handle.flag_value(&self.flag).filter(|v| !v.is_empty());
        let effective = explicit.or(self.default.as_deref());
        let shown = self.describe(explicit, effective);

        let passed = match &self.predicate {
            FlagPredicate::IsSet => explicit.is_some(),
            FlagPredicate::IsNotSet => explicit.is_none(),
            FlagPredicate::Equals(expected) => effective == Some(expected.as_str()),
            FlagPredicate::NotEquals(unwanted) => effective != Some(unwanted.as_str()),
            FlagPredicate::ListExcludes(unwanted) => effective
                .map(|v| v.split(',').all(|entry| entry.trim() != unwanted))
                .unwrap_or(true),
        };

        if passed {
            Verdict::pass(shown)
        } else {
            Verdict::fail(format!("{}, expected {}", shown, self.predicate))
        }
    }

    fn describe(&self, explicit: Option<&str>, effective: Option<&str>) -> String {
        match (explicit, effective) {
            (Some(v), _) => format!("--{}={}", self.flag, v),
            (None, Some(v)) => format!("--{}={} (default)", self.flag, v),
            (None, None) => format!("--{} not set", self.flag),
        }
    }
}
