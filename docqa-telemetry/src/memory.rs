use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;
use tracing::{Event, Id, Subscriber};
use tracing_subscriber::{Layer, layer::Context, registry::LookupSpan};

/// Span fields carried into every event logged inside the span.
const CONTEXT_KEYS: [&str; 2] = ["session.id", "session_id"];

/// A captured log event
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    /// Unix time in nanoseconds
    pub timestamp: u128,
    /// `TRACE` through `ERROR`
    pub level: String,
    /// Module path of the call site
    pub target: String,
    /// The event's `message` field
    pub message: String,
    /// Name of the innermost span the event was logged in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<String>,
    /// Session the event belongs to, from the event or any enclosing span
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Every other field recorded on the event
    pub fields: HashMap<String, serde_json::Value>,
}

impl LogRecord {
    /// True if `needle` occurs in the message or any field value.
    pub fn mentions(&self, needle: &str) -> bool {
        self.message.contains(needle)
            || self.fields.values().any(|value| match value {
                serde_json::Value::String(s) => s.contains(needle),
                other => other.to_string().contains(needle),
            })
    }
}

/// Shared storage for captured log records
#[derive(Debug, Clone, Default)]
pub struct SharedLogStorage {
    records: Arc<RwLock<Vec<LogRecord>>>,
}

impl SharedLogStorage {
    /// Create empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record.
    pub fn push(&self, record: LogRecord) {
        if let Ok(mut records) = self.records.write() {
            records.push(record);
        }
    }

    /// All records, oldest first.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.read().map(|r| r.clone()).unwrap_or_default()
    }

    /// Records logged under the given session id.
    pub fn for_session(&self, session_id: &str) -> Vec<LogRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.session_id.as_deref() == Some(session_id))
            .collect()
    }

    /// True if any record mentions `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.records.read().map(|r| r.iter().any(|rec| rec.mentions(needle))).unwrap_or(false)
    }

    /// Number of records captured so far.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    /// True if nothing has been captured.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every captured record.
    pub fn clear(&self) {
        if let Ok(mut records) = self.records.write() {
            records.clear();
        }
    }
}

/// A tracing layer that keeps log events in memory, tagged with their session
pub struct InMemoryLogLayer {
    storage: SharedLogStorage,
}

impl InMemoryLogLayer {
    /// Create a layer that writes into `storage`.
    pub fn new(storage: SharedLogStorage) -> Self {
        Self { storage }
    }
}

#[derive(Clone, Default)]
struct SpanFields(HashMap<String, serde_json::Value>);

impl SpanFields {
    fn session_id(&self) -> Option<String> {
        CONTEXT_KEYS.iter().find_map(|key| self.0.get(*key)).map(value_to_string)
    }
}

fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl<S> Layer<S> for InMemoryLogLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &tracing::span::Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };

        let mut visitor = JsonVisitor::default();
        attrs.record(&mut visitor);
        let mut fields = visitor.0;

        // Inherit the session from the parent unless this span sets its own
        if let Some(parent) = span.parent() {
            if let Some(parent_fields) = parent.extensions().get::<SpanFields>() {
                for key in CONTEXT_KEYS {
                    if !fields.contains_key(key) {
                        if let Some(value) = parent_fields.0.get(key) {
                            fields.insert(key.to_string(), value.clone());
                        }
                    }
                }
            }
        }

        span.extensions_mut().insert(SpanFields(fields));
    }

    fn on_record(&self, id: &Id, values: &tracing::span::Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        if let Some(fields) = extensions.get_mut::<SpanFields>() {
            let mut visitor = JsonVisitor::default();
            values.record(&mut visitor);
            fields.0.extend(visitor.0);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);
        let mut fields = visitor.0;

        let message = fields.remove("message").map(|v| value_to_string(&v)).unwrap_or_default();

        let mut span_name = None;
        let mut session_id = CONTEXT_KEYS
            .iter()
            .find_map(|key| fields.get(*key))
            .map(value_to_string);

        if let Some(scope) = ctx.event_scope(event) {
            for span in scope {
                if span_name.is_none() {
                    span_name = Some(span.name().to_string());
                }
                if session_id.is_none() {
                    session_id = span.extensions().get::<SpanFields>().and_then(SpanFields::session_id);
                }
                if session_id.is_some() {
                    break;
                }
            }
        }

        let metadata = event.metadata();
        self.storage.push(LogRecord {
            timestamp: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos(),
            level: metadata.level().to_string(),
            target: metadata.target().to_string(),
            message,
            span: span_name,
            session_id,
            fields,
        });
    }
}

#[derive(Default)]
struct JsonVisitor(HashMap<String, serde_json::Value>);

impl tracing::field::Visit for JsonVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), serde_json::Value::String(format!("{:?}", value)));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.insert(field.name().to_string(), serde_json::Value::Bool(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }
}
