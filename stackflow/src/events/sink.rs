//! Destinations for deployment lifecycle events.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn, Level};

/// Receives lifecycle events raised while stacks deploy.
///
/// Sinks are shared by every task of a run. Emission is fire-and-forget:
/// a sink must never fail or block the deployment that raised the event.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Records an event. `data` is a JSON payload, usually naming the stack.
    fn try_emit(&self, event_type: &str, data: Option<Value>);

    /// Async form of [`EventSink::try_emit`], for sinks that forward events.
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.try_emit(event_type, data);
    }
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn try_emit(&self, _event_type: &str, _data: Option<Value>) {}
}

/// Writes events to the log.
///
/// Failure events (`*.failed`) are always logged at warn level.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

impl LoggingEventSink {
    /// Logs ordinary events at `level`. Only debug and info are honored;
    /// anything else logs at info.
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self { level }
    }

    /// Logs ordinary events at debug level.
    #[must_use]
    pub const fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl EventSink for LoggingEventSink {
    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        let stack = stack_of(data.as_ref()).unwrap_or_default();
        let payload = data.as_ref().map(ToString::to_string).unwrap_or_default();

        if event_type.ends_with(".failed") {
            warn!(event = event_type, stack, payload, "Deployment event");
        } else if self.level == Level::DEBUG {
            debug!(event = event_type, stack, payload, "Deployment event");
        } else {
            info!(event = event_type, stack, payload, "Deployment event");
        }
    }
}

/// An event kept by [`CollectingEventSink`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedEvent {
    /// Event name, e.g. `stack.started`.
    pub event_type: String,
    /// Stack named in the payload, if any.
    pub stack: Option<String>,
    /// Payload as emitted.
    pub data: Option<Value>,
    /// When the sink received the event.
    pub at: DateTime<Utc>,
}

/// Keeps every event in emission order.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: Mutex<Vec<RecordedEvent>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events so far.
    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().clone()
    }

    /// Number of events so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// True until the first event arrives.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Event names, in emission order.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .map(|e| e.event_type.clone())
            .collect()
    }

    /// Events raised for `stack`, in emission order.
    #[must_use]
    pub fn events_for_stack(&self, stack: &str) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.stack.as_deref() == Some(stack))
            .cloned()
            .collect()
    }

    /// Number of events named `event_type`.
    #[must_use]
    pub fn count(&self, event_type: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

impl EventSink for CollectingEventSink {
    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        let event = RecordedEvent {
            event_type: event_type.to_string(),
            stack: stack_of(data.as_ref()).map(str::to_string),
            data,
            at: Utc::now(),
        };
        self.events.lock().push(event);
    }
}

fn stack_of(data: Option<&Value>) -> Option<&str> {
    data?.get("stack")?.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_noop_sink_accepts_events() {
        let sink = NoOpEventSink;
        sink.emit("stack.started", None).await;
        sink.try_emit("stack.failed", Some(json!({"stack": "app"})));
    }

    #[test]
    fn test_logging_sink_handles_all_shapes() {
        let sink = LoggingEventSink::debug();
        sink.try_emit("stack.started", Some(json!({"stack": "app"})));
        sink.try_emit("stack.failed", Some(json!({"stack": "app", "error": {}})));
        LoggingEventSink::default().try_emit("run.completed", None);
    }

    #[tokio::test]
    async fn test_collecting_sink_attributes_stacks() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit("stack.started", Some(json!({"stack": "a"}))).await;
        sink.try_emit("stack.started", Some(json!({"stack": "b"})));
        sink.try_emit("stack.completed", Some(json!({"stack": "b"})));
        sink.try_emit("run.completed", Some(json!({"stacks": 2})));

        assert_eq!(sink.len(), 4);
        assert_eq!(sink.count("stack.started"), 2);
        assert_eq!(sink.event_types().last().unwrap(), "run.completed");

        let for_b = sink.events_for_stack("b");
        assert_eq!(for_b.len(), 2);
        assert_eq!(for_b[1].event_type, "stack.completed");
        assert!(for_b[0].at <= for_b[1].at);
        assert_eq!(sink.events()[3].stack, None);
    }
}
