//! Structured test traces.
//!
//! Tests append JSONL entries to `target/test-logs/nb-core-tests-<pid>.jsonl`
//! so a failing benchmark scenario can be replayed item by item.

use crate::bench::RunReport;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const LOG_DIR_NAME: &str = "test-logs";

/// Trace file for this test process.
pub fn log_file_path() -> PathBuf {
    let target = match std::env::var("CARGO_TARGET_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => Path::new(env!("CARGO_MANIFEST_DIR")).join("../../target"),
    };
    target
        .join(LOG_DIR_NAME)
        .join(format!("nb-core-tests-{}.jsonl", std::process::id()))
}

fn append_line(line: &str) {
    let path = log_file_path();
    if let Some(parent) = path.parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            eprintln!("test_log: cannot create {}: {}", parent.display(), err);
            return;
        }
    }
    let written = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .and_then(|mut file| file.write_all(format!("{}\n", line).as_bytes()));
    if let Err(err) = written {
        eprintln!("test_log: cannot write {}: {}", path.display(), err);
    }
}

/// Append one trace entry. Caller fields never overwrite the fixed ones;
/// a clash is stored as `extra_<key>`.
pub fn log_event(level: &str, msg: &str, file: &str, line: u32, fields: &[(&str, Value)]) {
    let mut map = Map::new();
    map.insert(
        "ts".into(),
        Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
    );
    map.insert("level".into(), Value::String(level.to_string()));
    map.insert("msg".into(), Value::String(msg.to_string()));
    map.insert("file".into(), Value::String(file.to_string()));
    map.insert("line".into(), Value::from(line));
    map.insert("pid".into(), Value::from(std::process::id()));
    let thread = std::thread::current().name().unwrap_or("unnamed").to_string();
    map.insert("test".into(), Value::String(thread));

    for (key, value) in fields {
        let key = if map.contains_key(*key) {
            format!("extra_{}", key)
        } else {
            (*key).to_string()
        };
        map.insert(key, value.clone());
    }

    match serde_json::to_string(&Value::Object(map)) {
        Ok(line) => append_line(&line),
        Err(err) => eprintln!("test_log: cannot serialize entry: {}", err),
    }
}

/// Trace every item of a run report, one entry per item.
pub fn log_report(report: &RunReport, file: &str, line: u32) {
    for item in &report.items {
        log_event(
            "INFO",
            "item outcome",
            file,
            line,
            &[
                ("run_id", Value::String(report.run_id.clone())),
                ("item_id", Value::String(item.id.to_string())),
                ("status", Value::String(item.status().to_string())),
                ("detail", Value::String(item.outcome.message())),
            ],
        );
    }
}

#[macro_export]
macro_rules! test_log {
    ($level:ident, $msg:expr $(, $key:ident = $val:expr )* $(,)?) => {{
        let fields = vec![
            $(
                (stringify!($key), serde_json::json!($val)),
            )*
        ];
        $crate::test_log::log_event(stringify!($level), &$msg.to_string(), file!(), line!(), &fields);
    }};
}

/// Trace a run report from a test.
#[macro_export]
macro_rules! test_log_report {
    ($report:expr) => {
        $crate::test_log::log_report(&$report, file!(), line!())
    };
}
