//! Ordered stage execution.

use super::{Direction, Halt, SequenceReport};
use crate::cancellation::CancellationToken;
use crate::command::{summarize_argv, ClusterCli, CommandRunner, ToleranceTable};
use crate::events::{EventSink, NoOpEventSink, RunEvent};
use crate::poll::{PollOutcome, ReadinessPoller};
use crate::stages::{Stage, StageResult, StageStatus, TimeoutPolicy};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Runs stages one at a time, fail-fast.
///
/// Each stage issues its command, classifies the response against the
/// tolerance table, then waits for readiness if the stage has a spec. A
/// failed or cancelled stage halts the sequence; a timed-out wait under a
/// continue policy does not.
pub struct StageSequencer {
    runner: Arc<dyn CommandRunner>,
    cli: ClusterCli,
    tolerance: ToleranceTable,
    poller: ReadinessPoller,
    cancel: Arc<CancellationToken>,
    sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for StageSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageSequencer")
            .field("cli", &self.cli)
            .field("tolerance_rules", &self.tolerance.rules().len())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl StageSequencer {
    /// Creates a sequencer with the default tolerance table.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, cli: ClusterCli) -> Self {
        let cancel = Arc::new(CancellationToken::new());
        Self {
            runner,
            cli,
            tolerance: ToleranceTable::default(),
            poller: ReadinessPoller::new(cancel.clone()),
            cancel,
            sink: Arc::new(NoOpEventSink),
        }
    }

    /// Replaces the tolerance table.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: ToleranceTable) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Shares a cancellation token with the caller.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: Arc<CancellationToken>) -> Self {
        self.poller = ReadinessPoller::new(cancel.clone());
        self.cancel = cancel;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the cluster CLI renderer.
    #[must_use]
    pub fn cli(&self) -> &ClusterCli {
        &self.cli
    }

    /// Returns the command runner.
    #[must_use]
    pub fn runner(&self) -> &Arc<dyn CommandRunner> {
        &self.runner
    }

    /// Returns the cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &Arc<CancellationToken> {
        &self.cancel
    }

    /// Returns the event sink.
    #[must_use]
    pub fn event_sink(&self) -> &Arc<dyn EventSink> {
        &self.sink
    }

    /// Runs `stages` in order.
    pub async fn run_forward(&self, stages: &[Stage]) -> SequenceReport {
        self.run(Direction::Forward, stages).await
    }

    /// Runs the inverse of each stage that has one, in reverse order.
    pub async fn run_backward(&self, stages: &[Stage]) -> SequenceReport {
        let inverted: Vec<Stage> = stages.iter().rev().filter_map(Stage::inverse).collect();
        self.run(Direction::Backward, &inverted).await
    }

    async fn run(&self, direction: Direction, stages: &[Stage]) -> SequenceReport {
        let mut report = SequenceReport::new(direction);

        for stage in stages {
            if self.cancel.is_cancelled() {
                let reason = self.cancel_reason();
                warn!("Stopping {} sequence before '{}': {}", direction, stage.name, reason);
                report.halted = Some(Halt {
                    stage: stage.name.clone(),
                    status: StageStatus::Cancelled,
                    reason,
                });
                break;
            }

            let result = self.execute(stage).await;
            let halt = result.status.halts().then(|| Halt {
                stage: result.name.clone(),
                status: result.status,
                reason: result
                    .failure()
                    .map_or_else(|| self.cancel_reason(), |f| f.to_string()),
            });
            report.results.push(result);

            if let Some(halt) = halt {
                error!("{} sequence {}", direction, halt);
                report.halted = Some(halt);
                break;
            }
        }

        report
    }

    /// Executes one stage and returns its result. Never panics or errors:
    /// every outcome is encoded in the result.
    pub async fn execute(&self, stage: &Stage) -> StageResult {
        let started_at = Utc::now();
        let (argv, input) = stage.action.render(&self.cli);
        let command = summarize_argv(&argv);

        info!(stage = %stage.name, kind = %stage.kind(), "Running: {}", command);
        self.sink.emit(&RunEvent::stage_started(stage, &command));

        let mut result = StageResult::new(
            stage.name.clone(),
            stage.kind(),
            StageStatus::Succeeded,
            command,
            started_at,
        );

        match self.runner.run(&argv, input.as_deref()).await {
            Err(e) => {
                result.status = StageStatus::Failed;
                result.error = Some(e.to_string());
            }
            Ok(output) => {
                result.exit_code = output.exit_code;
                if !output.is_success() {
                    if let Some(label) = self.tolerance.tolerated(stage.kind(), stage.verb(), &output) {
                        info!(stage = %stage.name, "Tolerated rejection: {}", label);
                        result.status = StageStatus::Tolerated;
                        result.tolerated = Some(label.to_string());
                    } else {
                        result.status = StageStatus::Failed;
                    }
                    result.stderr = output.stderr.trim().to_string();
                }
            }
        }

        if result.status.is_success() {
            if let Some(ref spec) = stage.readiness {
                info!(stage = %stage.name, "Waiting for {}", spec);
                let outcome = self.poller.wait(spec, self.runner.as_ref(), &self.cli).await;
                self.sink.emit(&RunEvent::poll_finished(&stage.name, &outcome));
                apply_poll_outcome(&mut result, stage.on_timeout, &outcome);
                result.poll = Some(outcome);
            }
        }

        result.ended_at = Utc::now();
        self.sink.emit(&RunEvent::stage_finished(&result));
        result
    }

    fn cancel_reason(&self) -> String {
        self.cancel.reason().unwrap_or_else(|| "cancelled".to_string())
    }
}

fn apply_poll_outcome(result: &mut StageResult, policy: TimeoutPolicy, outcome: &PollOutcome) {
    match outcome {
        PollOutcome::Satisfied { .. } => {}
        PollOutcome::TimedOut { .. } => match policy {
            TimeoutPolicy::Continue => {
                warn!(stage = %result.name, "Readiness wait timed out, continuing: {}", outcome);
                result.status = StageStatus::TimedOut;
            }
            TimeoutPolicy::Escalate => {
                result.status = StageStatus::Failed;
                result.error = Some(format!("readiness wait timed out: {outcome}"));
            }
        },
        PollOutcome::CommandFailed { error, .. } => {
            result.status = StageStatus::Failed;
            result.error = Some(format!("readiness query could not run: {error}"));
        }
        PollOutcome::Cancelled { reason, .. } => {
            result.status = StageStatus::Cancelled;
            result.error = Some(reason.clone());
        }
    }
}
