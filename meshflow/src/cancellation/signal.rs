//! Interrupt handling.

use super::CancellationToken;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, warn};

/// Reason recorded when the operator presses Ctrl-C.
pub const INTERRUPT_REASON: &str = "interrupted by operator";

/// Spawns a task that cancels `token` on the first Ctrl-C.
///
/// The in-flight command is allowed to finish; the sequencer stops before the
/// next stage and any readiness wait returns at its next sleep.
pub fn cancel_on_interrupt(token: Arc<CancellationToken>) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, finishing the current command and stopping");
                token.cancel(INTERRUPT_REASON);
            }
            Err(e) => error!("Failed to listen for interrupt: {}", e),
        }
    })
}
