//! The readiness wait loop.

use super::{PollOutcome, ReadinessSpec};
use crate::cancellation::CancellationToken;
use crate::command::{ClusterCli, CommandOutput, CommandRunner};
use crate::errors::CommandError;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Repeatedly queries the cluster until a readiness spec holds.
///
/// The query is never retried on its own: a query that cannot be started
/// ends the wait, while a query that runs but reports an error is just a
/// "not yet" observation.
#[derive(Debug, Clone, Default)]
pub struct ReadinessPoller {
    cancel: Arc<CancellationToken>,
}

impl ReadinessPoller {
    /// Creates a poller that stops when `cancel` is tripped.
    #[must_use]
    pub fn new(cancel: Arc<CancellationToken>) -> Self {
        Self { cancel }
    }

    /// Polls `spec` through `runner`.
    pub async fn wait(&self, spec: &ReadinessSpec, runner: &dyn CommandRunner, cli: &ClusterCli) -> PollOutcome {
        let query = spec.query(cli);
        self.wait_for(spec, || runner.run(&query, None)).await
    }

    /// Polls `spec`, calling `fetch` once per attempt.
    ///
    /// Attempts are spaced by the spec's interval. The attempt that lands on
    /// the deadline is the last one, so at most `timeout / interval + 1`
    /// queries run and a first-attempt success never sleeps.
    pub async fn wait_for<F, Fut>(&self, spec: &ReadinessSpec, mut fetch: F) -> PollOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<CommandOutput, CommandError>>,
    {
        let started = Instant::now();
        let deadline = started + spec.timeout;
        let mut attempts = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                return self.cancelled(attempts);
            }

            attempts += 1;
            let output = match fetch().await {
                Ok(output) => output,
                Err(e) => {
                    warn!("Readiness query for {} could not run: {}", spec, e);
                    return PollOutcome::CommandFailed {
                        attempts,
                        error: e.to_string(),
                    };
                }
            };

            let observation = spec.check.evaluate(&output);
            if observation.satisfied {
                return PollOutcome::Satisfied {
                    attempts,
                    elapsed_ms: elapsed_ms(started),
                };
            }
            debug!(attempt = attempts, "{} not yet satisfied: {}", spec, observation.snapshot);

            if Instant::now() >= deadline {
                return PollOutcome::TimedOut {
                    attempts,
                    elapsed_ms: elapsed_ms(started),
                    last_snapshot: observation.snapshot,
                };
            }

            tokio::select! {
                () = tokio::time::sleep(spec.poll_interval) => {}
                () = self.cancel.cancelled() => return self.cancelled(attempts),
            }
        }
    }

    fn cancelled(&self, attempts: u32) -> PollOutcome {
        PollOutcome::Cancelled {
            attempts,
            reason: self.cancel.reason().unwrap_or_else(|| "cancelled".to_string()),
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
