//! Readiness polling.
//!
//! A `ReadinessSpec` names what to query, the predicate that means "ready",
//! and the window to wait in. `ReadinessPoller` runs the loop.

mod outcome;
mod poller;
mod spec;

pub use outcome::PollOutcome;
pub use poller::ReadinessPoller;
pub use spec::{
    Observation, ReadinessCheck, ReadinessSpec, ResourceRef, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT,
};
