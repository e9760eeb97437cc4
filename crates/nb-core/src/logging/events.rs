//! Structured event definitions for logging.
//!
//! Every event carries the run correlation ids (`run_id`, `host_id`) and the
//! pipeline stage it was emitted from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Log levels for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Stages of a benchmark run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration.
    Init,
    /// Process table lookup.
    Locate,
    /// Flag and path resolution.
    Resolve,
    /// Predicate evaluation.
    Evaluate,
    /// Report rendering.
    Report,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Locate => "locate",
            Stage::Resolve => "resolve",
            Stage::Evaluate => "evaluate",
            Stage::Report => "report",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Run lifecycle
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";

    // Locate stage
    pub const LOCATE_FOUND: &str = "locate.found";
    pub const LOCATE_ABSENT: &str = "locate.absent";
    pub const LOCATE_FAILED: &str = "locate.failed";

    // Resolve stage
    pub const RESOLVE_SKIPPED: &str = "resolve.skipped";
    pub const RESOLVE_FAILED: &str = "resolve.failed";

    // Evaluate stage
    pub const GROUP_STARTED: &str = "evaluate.group_started";
    pub const ITEM_OUTCOME: &str = "evaluate.item_outcome";

    // Report stage
    pub const REPORT_WRITTEN: &str = "report.written";

    // Config/init events
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";
    pub const CONFIG_ERROR: &str = "config.error";

    pub const INTERNAL_ERROR: &str = "internal_error";
}

/// A structured log event for JSONL output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub ts: DateTime<Utc>,
    pub level: Level,
    /// Event name (e.g., "run.started", "locate.absent").
    pub event: String,
    pub run_id: String,
    pub stage: Stage,
    pub host_id: String,
    pub message: String,

    /// Additional structured fields (stable keys).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub fields: HashMap<String, serde_json::Value>,

    /// Benchmark item the event concerns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
}

impl LogEvent {
    pub fn new(
        level: Level,
        event: impl Into<String>,
        run_id: impl Into<String>,
        host_id: impl Into<String>,
        stage: Stage,
        message: impl Into<String>,
    ) -> Self {
        LogEvent {
            ts: Utc::now(),
            level,
            event: event.into(),
            run_id: run_id.into(),
            stage,
            host_id: host_id.into(),
            message: message.into(),
            fields: HashMap::new(),
            item_id: None,
        }
    }

    /// Add a field to the event.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.fields.insert(key.into(), v);
        }
        self
    }

    /// Attach the benchmark item id.
    pub fn with_item(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }

    /// Serialize to a single JSON line.
    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"error":"serialization_failed","event":"{}"}}"#,
                self.event
            )
        })
    }
}

/// Correlation ids shared by every event of one run.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub run_id: String,
    pub host_id: String,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>, host_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
            host_id: host_id.into(),
        }
    }

    /// Create an event with this context.
    pub fn event(
        &self,
        level: Level,
        event: impl Into<String>,
        stage: Stage,
        message: impl Into<String>,
    ) -> LogEvent {
        LogEvent::new(level, event, &self.run_id, &self.host_id, stage, message)
    }

    pub fn info(&self, event: impl Into<String>, stage: Stage, message: impl Into<String>) -> LogEvent {
        self.event(Level::Info, event, stage, message)
    }

    pub fn warn(&self, event: impl Into<String>, stage: Stage, message: impl Into<String>) -> LogEvent {
        self.event(Level::Warn, event, stage, message)
    }
}
