//! Custom tracing layer for JSONL output.
//!
//! Produces one JSON object per event on stderr so stdout stays reserved
//! for the report. Correlation fields (`run_id`, `host_id`, `stage`,
//! `item_id`) are lifted to the top level whether they were recorded on
//! the event itself or on an enclosing span.

use std::io::{self, Write};
use std::sync::Mutex;

use chrono::Utc;
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use super::events::Level;

const CONTEXT_KEYS: [&str; 4] = ["run_id", "host_id", "stage", "item_id"];

/// Correlation fields collected from a span or an event.
#[derive(Debug, Clone, Default)]
struct SpanContext {
    run_id: Option<String>,
    host_id: Option<String>,
    stage: Option<String>,
    item_id: Option<String>,
}

impl SpanContext {
    fn set(&mut self, key: &str, value: String) -> bool {
        let slot = match key {
            "run_id" => &mut self.run_id,
            "host_id" => &mut self.host_id,
            "stage" => &mut self.stage,
            "item_id" => &mut self.item_id,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    /// Fill empty slots from an outer context.
    fn inherit(&mut self, outer: &SpanContext) {
        if self.run_id.is_none() {
            self.run_id.clone_from(&outer.run_id);
        }
        if self.host_id.is_none() {
            self.host_id.clone_from(&outer.host_id);
        }
        if self.stage.is_none() {
            self.stage.clone_from(&outer.stage);
        }
        if self.item_id.is_none() {
            self.item_id.clone_from(&outer.item_id);
        }
    }
}

/// Extracts message, correlation fields and everything else from an event.
struct JsonFieldVisitor {
    context: SpanContext,
    fields: serde_json::Map<String, serde_json::Value>,
    message: Option<String>,
}

impl JsonFieldVisitor {
    fn new() -> Self {
        JsonFieldVisitor {
            context: SpanContext::default(),
            fields: serde_json::Map::new(),
            message: None,
        }
    }

    fn record_string(&mut self, name: &str, value: String) {
        if name == "message" {
            self.message = Some(value);
        } else if !self.context.set(name, value.clone()) {
            self.fields
                .insert(name.to_string(), serde_json::Value::String(value));
        }
    }
}

impl tracing::field::Visit for JsonFieldVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.record_string(field.name(), value.to_string());
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.record_string(field.name(), format!("{:?}", value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.fields.insert(
            field.name().to_string(),
            serde_json::Value::Number(value.into()),
        );
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.fields.insert(
            field.name().to_string(),
            serde_json::Value::Number(value.into()),
        );
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.fields
                .insert(field.name().to_string(), serde_json::Value::Number(n));
        }
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::Bool(value));
    }
}

/// Collects only correlation fields from span attributes.
struct SpanContextVisitor {
    context: SpanContext,
}

impl tracing::field::Visit for SpanContextVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.context.set(field.name(), value.to_string());
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if CONTEXT_KEYS.contains(&field.name()) {
            self.context.set(field.name(), format!("{:?}", value));
        }
    }
}

/// JSONL tracing layer, writing to stderr by default.
pub struct JsonlLayer<W = io::Stderr> {
    writer: Mutex<W>,
}

impl JsonlLayer<io::Stderr> {
    pub fn stderr() -> Self {
        JsonlLayer {
            writer: Mutex::new(io::stderr()),
        }
    }
}

impl<W: Write> JsonlLayer<W> {
    /// Create a layer with a custom writer.
    pub fn new(writer: W) -> Self {
        JsonlLayer {
            writer: Mutex::new(writer),
        }
    }
}

impl<S, W> Layer<S> for JsonlLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: Write + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = SpanContextVisitor {
            context: SpanContext::default(),
        };
        attrs.record(&mut visitor);

        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(visitor.context);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let ts = Utc::now();

        let mut visitor = JsonFieldVisitor::new();
        event.record(&mut visitor);

        // Event fields win over span fields; inner spans win over outer ones.
        let mut context = visitor.context.clone();
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope {
                if let Some(span_ctx) = span.extensions().get::<SpanContext>() {
                    context.inherit(span_ctx);
                }
            }
        }

        let level: Level = (*event.metadata().level()).into();
        let mut obj = serde_json::Map::new();

        obj.insert("ts".to_string(), serde_json::json!(ts.to_rfc3339()));
        obj.insert("level".to_string(), serde_json::json!(level));
        obj.insert(
            "event".to_string(),
            serde_json::json!(event.metadata().target()),
        );

        for (key, value) in [
            ("run_id", context.run_id),
            ("host_id", context.host_id),
            ("stage", context.stage),
            ("item_id", context.item_id),
        ] {
            if let Some(v) = value {
                obj.insert(key.to_string(), serde_json::json!(v));
            }
        }
        if let Some(msg) = visitor.message {
            obj.insert("message".to_string(), serde_json::json!(msg));
        }
        if !visitor.fields.is_empty() {
            obj.insert(
                "fields".to_string(),
                serde_json::Value::Object(visitor.fields),
            );
        }

        let json = serde_json::to_string(&serde_json::Value::Object(obj)).unwrap_or_default();
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", json);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tracing_subscriber::layer::SubscriberExt;

    struct BufWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for BufWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture<F: FnOnce()>(f: F) -> Vec<serde_json::Value> {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let layer = JsonlLayer::new(BufWriter(buffer.clone()));
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, f);

        let output = buffer.lock().unwrap();
        String::from_utf8_lossy(&output)
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_basic_event() {
        let lines = capture(|| {
            tracing::warn!(target: "test.event", message = "danger");
        });
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["level"], "warn");
        assert_eq!(lines[0]["event"], "test.event");
        assert_eq!(lines[0]["message"], "danger");
        assert!(lines[0]["ts"].is_string());
    }

    #[test]
    fn test_event_context_fields_are_lifted() {
        let lines = capture(|| {
            tracing::info!(
                target: "evaluate.item_outcome",
                run_id = "run-1",
                host_id = "host-2",
                stage = %"evaluate",
                item_id = "2.2.1",
                status = "fail",
                message = "item evaluated"
            );
        });
        let line = &lines[0];
        assert_eq!(line["run_id"], "run-1");
        assert_eq!(line["host_id"], "host-2");
        assert_eq!(line["stage"], "evaluate");
        assert_eq!(line["item_id"], "2.2.1");
        assert_eq!(line["fields"]["status"], "fail");
        assert!(line["fields"].get("run_id").is_none());
    }

    #[test]
    fn test_span_context_is_inherited() {
        let lines = capture(|| {
            let span = tracing::info_span!("group", run_id = "run-span", stage = "locate");
            let _guard = span.enter();
            tracing::info!(target: "locate.found", pid = 42u64, message = "found");
        });
        let line = &lines[0];
        assert_eq!(line["run_id"], "run-span");
        assert_eq!(line["stage"], "locate");
        assert_eq!(line["fields"]["pid"], 42);
    }

    #[test]
    fn test_extra_field_types() {
        let lines = capture(|| {
            tracing::info!(target: "test.fields", count = 42, active = true, ratio = 0.5, message = "hi");
        });
        assert_eq!(lines[0]["fields"]["count"], 42);
        assert_eq!(lines[0]["fields"]["active"], true);
        assert_eq!(lines[0]["fields"]["ratio"], 0.5);
    }
}
