//! Structured logging for node-bench.
//!
//! Provides dual-mode logging:
//! - Human-readable console output for interactive use
//! - Machine-parseable JSONL for pipelines and log shippers
//!
//! # Usage
//!
//! ```ignore
//! use nb_core::logging::{init_logging, LogConfig, LogContext, Stage, event_names};
//!
//! let config = LogConfig::from_env(None, None);
//! init_logging(&config);
//!
//! let ctx = LogContext::new(generate_run_id(), get_host_id());
//! nb_core::log_event!(ctx, INFO, event_names::RUN_STARTED, Stage::Init, "starting benchmark");
//! ```
//!
//! stdout is reserved for the report; all log output goes to stderr.

pub mod config;
pub mod events;
pub mod layer;

pub use config::{LogConfig, LogFormat, LogLevel};
pub use events::{event_names, Level, LogContext, LogEvent, Stage};
pub use layer::JsonlLayer;

use std::io::IsTerminal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the logging subsystem.
///
/// Call once at startup. A second call is ignored.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_from_env("NB_LOG_FILTER")
        .unwrap_or_else(|_| EnvFilter::new(format!("{}", config.level)));

    let result = match config.format {
        LogFormat::Human => {
            let use_ansi = std::io::stderr().is_terminal();
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(use_ansi);

            if config.timestamps {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer)
                    .try_init()
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer.without_time())
                    .try_init()
            }
        }
        LogFormat::Jsonl => tracing_subscriber::registry()
            .with(filter)
            .with(JsonlLayer::stderr())
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("logging already initialized");
    }
}

/// Generate a unique run ID for this invocation.
pub fn generate_run_id() -> String {
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!("run-{}", &uuid[..12])
}

/// Host identifier for correlating runs.
///
/// Uses the machine-id when readable, then `HOSTNAME`, then a random id.
pub fn get_host_id() -> String {
    if let Ok(id) = std::fs::read_to_string("/etc/machine-id") {
        let id = id.trim();
        if id.len() >= 8 && id.is_ascii() {
            return format!("host-{}", &id[..8]);
        }
    }

    if let Ok(hostname) = std::env::var("HOSTNAME") {
        let hash = hash_string(&hostname);
        return format!("host-{}", &hash[..8]);
    }

    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!("host-{}", &uuid[..8])
}

fn hash_string(s: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    s.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Structured event logging with run correlation fields.
///
/// ```ignore
/// log_event!(ctx, INFO, event_names::LOCATE_FOUND, Stage::Locate, "process located",
///     process = "kubelet", pid = 1234u64);
/// ```
#[macro_export]
macro_rules! log_event {
    ($ctx:expr, INFO, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::info!(
            target: $event,
            run_id = %$ctx.run_id,
            host_id = %$ctx.host_id,
            stage = %$stage,
            $($key = $val,)*
            message = $msg,
        )
    };
    ($ctx:expr, DEBUG, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::debug!(
            target: $event,
            run_id = %$ctx.run_id,
            host_id = %$ctx.host_id,
            stage = %$stage,
            $($key = $val,)*
            message = $msg,
        )
    };
    ($ctx:expr, WARN, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::warn!(
            target: $event,
            run_id = %$ctx.run_id,
            host_id = %$ctx.host_id,
            stage = %$stage,
            $($key = $val,)*
            message = $msg,
        )
    };
    ($ctx:expr, ERROR, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::error!(
            target: $event,
            run_id = %$ctx.run_id,
            host_id = %$ctx.host_id,
            stage = %$stage,
            $($key = $val,)*
            message = $msg,
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_run_id() {
        let id1 = generate_run_id();
        let id2 = generate_run_id();

        assert!(id1.starts_with("run-"));
        assert_ne!(id1, id2);
        assert_eq!(id1.len(), 16);
        assert!(id1[4..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_get_host_id() {
        let host_id = get_host_id();
        assert!(host_id.starts_with("host-"));
        assert!(host_id.len() >= 13);
    }

    #[test]
    fn test_log_event_macro_compiles_for_all_levels() {
        let ctx = LogContext::new("run-test", "host-test");
        crate::log_event!(ctx, INFO, event_names::RUN_STARTED, Stage::Init, "info");
        crate::log_event!(ctx, DEBUG, event_names::LOCATE_FOUND, Stage::Locate, "debug", pid = 1u64);
        crate::log_event!(ctx, WARN, event_names::RESOLVE_FAILED, Stage::Resolve, "warn", flag = "config");
        crate::log_event!(ctx, ERROR, event_names::INTERNAL_ERROR, Stage::Report, "error");
    }
}
