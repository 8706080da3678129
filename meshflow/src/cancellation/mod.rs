//! Cooperative cancellation.
//!
//! This module provides:
//! - `CancellationToken`, checked between stages and awaited during polls
//! - a Ctrl-C hook that trips a token

mod signal;
mod token;

pub use signal::cancel_on_interrupt;
pub use token::CancellationToken;
