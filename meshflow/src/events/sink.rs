//! Event sink trait and implementations.

use super::RunEvent;
use parking_lot::RwLock;
use tracing::{debug, info, warn, Level};

/// Receives run events.
///
/// Emission must never fail or block the run; sinks swallow their own errors.
#[cfg_attr(test, mockall::automock)]
pub trait EventSink: Send + Sync {
    /// Emits an event.
    fn emit(&self, event: &RunEvent);
}

/// A no-op event sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn emit(&self, _event: &RunEvent) {}
}

/// An event sink that logs events through tracing.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a new logging event sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl EventSink for LoggingEventSink {
    fn emit(&self, event: &RunEvent) {
        let data = serde_json::to_string(&event.data).unwrap_or_default();
        if event.event_type == "stage.failed" {
            warn!(event_type = %event.event_type, event_data = %data, "Event: {}", event.event_type);
        } else if self.level == Level::DEBUG {
            debug!(event_type = %event.event_type, event_data = %data, "Event: {}", event.event_type);
        } else {
            info!(event_type = %event.event_type, event_data = %data, "Event: {}", event.event_type);
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<RunEvent>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<RunEvent> {
        self.events.read().clone()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Returns events matching a type prefix.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<RunEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type.starts_with(type_prefix))
            .cloned()
            .collect()
    }
}

impl EventSink for CollectingEventSink {
    fn emit(&self, event: &RunEvent) {
        self.events.write().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_and_logging_sinks() {
        let event = RunEvent::run_started("run-1", "install");
        NoOpEventSink.emit(&event);
        LoggingEventSink::default().emit(&event);
        LoggingEventSink::debug().emit(&RunEvent::new("stage.failed"));
    }

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit(&RunEvent::new("stage.started"));
        sink.emit(&RunEvent::new("stage.completed"));
        sink.emit(&RunEvent::new("poll.finished"));

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.events_of_type("stage.").len(), 2);
        assert_eq!(sink.events()[2].event_type, "poll.finished");
    }

    #[test]
    fn test_mock_sink() {
        let mut sink = MockEventSink::new();
        sink.expect_emit()
            .withf(|event| event.event_type == "run.started")
            .times(1)
            .return_const(());
        sink.emit(&RunEvent::run_started("run-1", "install"));
    }
}
