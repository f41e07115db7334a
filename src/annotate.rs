//! # Annotation / telemetry sink
//!
//! `AnnotationCollector` is the trait the engine writes structured events
//! to (§6): phase boundaries, the subquery strategy chosen for a given
//! call, decorrelation bookkeeping, and similar. The core ships two
//! implementations: `TracingCollector`, which forwards each event as a
//! `tracing` span field set (the structured field=value style used
//! throughout this codebase), and `RecordingCollector`, an in-memory
//! `Vec`-backed collector for tests that want to assert on exactly which
//! events fired.

use parking_lot::Mutex;
use std::sync::Arc;

/// One structured event: a stable event name and its field values,
/// rendered as strings so the sink doesn't need to know the concrete
/// value types upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationEvent {
    pub name: &'static str,
    pub fields: Vec<(&'static str, String)>,
}

impl AnnotationEvent {
    pub fn new(name: &'static str) -> Self {
        AnnotationEvent {
            name,
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, key: &'static str, value: impl ToString) -> Self {
        self.fields.push((key, value.to_string()));
        self
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Sink for structured execution events. Implementations must not block
/// the executor for long: this is a fire-and-forget observability path,
/// not a control channel.
pub trait AnnotationCollector: Send + Sync {
    fn add(&self, event: AnnotationEvent);
}

/// Discards every event. The default when a caller doesn't need
/// telemetry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCollector;

impl AnnotationCollector for NullCollector {
    fn add(&self, _event: AnnotationEvent) {}
}

/// Forwards each event to `tracing` as an info-level event with the
/// event name as the message and each field emitted as `key = value`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingCollector;

impl AnnotationCollector for TracingCollector {
    fn add(&self, event: AnnotationEvent) {
        for (key, value) in &event.fields {
            tracing::info!(target: "datalog_engine::annotate", field = %key, value = %value, event = event.name);
        }
        if event.fields.is_empty() {
            tracing::info!(target: "datalog_engine::annotate", event = event.name);
        }
    }
}

/// Collects every event into an in-memory `Vec`, for tests that assert on
/// the exact sequence (or presence) of annotation events.
#[derive(Debug, Clone, Default)]
pub struct RecordingCollector {
    events: Arc<Mutex<Vec<AnnotationEvent>>>,
}

impl RecordingCollector {
    pub fn new() -> Self {
        RecordingCollector::default()
    }

    pub fn events(&self) -> Vec<AnnotationEvent> {
        self.events.lock().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(|e| e.name).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.events.lock().iter().any(|e| e.name == name)
    }
}

impl AnnotationCollector for RecordingCollector {
    fn add(&self, event: AnnotationEvent) {
        self.events.lock().push(event);
    }
}
