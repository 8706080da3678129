//! Run lifecycle events.
//!
//! The sequencer and orchestrator emit a `RunEvent` at each stage boundary.
//! Sinks decide where they go: the tracing log, a test collector, or nowhere.

mod event;
mod sink;

pub use event::RunEvent;
#[cfg(test)]
pub use sink::MockEventSink;
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
