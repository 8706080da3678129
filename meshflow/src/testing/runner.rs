//! A scripted command runner.

use crate::command::{CommandOutput, CommandRunner};
use crate::errors::CommandError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
enum Response {
    Output(CommandOutput),
    StartupFailure,
}

#[derive(Debug)]
struct Script {
    tokens: Vec<String>,
    queue: VecDeque<Response>,
    last: Response,
}

impl Script {
    fn matches(&self, argv: &[String]) -> bool {
        self.tokens.iter().all(|t| argv.contains(t))
    }

    fn next(&mut self) -> Response {
        match self.queue.pop_front() {
            Some(response) => {
                self.last = response.clone();
                response
            }
            None => self.last.clone(),
        }
    }
}

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// The argv.
    pub argv: Vec<String>,
    /// Stdin, if any.
    pub input: Option<String>,
}

/// A [`CommandRunner`] that answers from a script instead of a cluster.
///
/// Each script entry is keyed by tokens that must all appear in the argv;
/// when several entries match, the one with the most tokens wins. Responses
/// are consumed in order and the last one repeats. Unscripted commands
/// succeed with empty output.
#[derive(Debug)]
pub struct ScriptedRunner {
    scripts: Mutex<Vec<Script>>,
    calls: Mutex<Vec<RecordedCall>>,
    default: CommandOutput,
}

impl Default for ScriptedRunner {
    fn default() -> Self {
        Self {
            scripts: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            default: CommandOutput::success(""),
        }
    }
}

impl ScriptedRunner {
    /// Creates a runner where every command succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the responses for commands containing all `tokens`.
    ///
    /// # Panics
    ///
    /// Panics if `responses` is empty.
    #[must_use]
    pub fn on(self, tokens: &[&str], responses: Vec<CommandOutput>) -> Self {
        let mut queue: VecDeque<Response> = responses.into_iter().map(Response::Output).collect();
        let last = queue.pop_back().expect("at least one scripted response");
        queue.push_back(last.clone());
        self.push(tokens, queue, last)
    }

    /// Commands containing all `tokens` fail to start.
    #[must_use]
    pub fn fail_to_start(self, tokens: &[&str]) -> Self {
        self.push(tokens, VecDeque::new(), Response::StartupFailure)
    }

    fn push(self, tokens: &[&str], queue: VecDeque<Response>, last: Response) -> Self {
        self.scripts.lock().push(Script {
            tokens: tokens.iter().map(|t| (*t).to_string()).collect(),
            queue,
            last,
        });
        self
    }

    /// Returns every recorded call.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Returns the argv of every recorded call.
    #[must_use]
    pub fn argvs(&self) -> Vec<Vec<String>> {
        self.calls.lock().iter().map(|c| c.argv.clone()).collect()
    }

    /// Counts calls containing all `tokens`.
    #[must_use]
    pub fn count(&self, tokens: &[&str]) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| tokens.iter().all(|t| c.argv.iter().any(|a| a == t)))
            .count()
    }

    /// Index of the first call containing all `tokens`.
    #[must_use]
    pub fn position(&self, tokens: &[&str]) -> Option<usize> {
        self.calls
            .lock()
            .iter()
            .position(|c| tokens.iter().all(|t| c.argv.iter().any(|a| a == t)))
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, argv: &[String], input: Option<&str>) -> Result<CommandOutput, CommandError> {
        self.calls.lock().push(RecordedCall {
            argv: argv.to_vec(),
            input: input.map(str::to_string),
        });

        let (program, _) = argv.split_first().ok_or(CommandError::EmptyArgv)?;

        let response = {
            let mut scripts = self.scripts.lock();
            scripts
                .iter_mut()
                .filter(|s| s.matches(argv))
                .max_by_key(|s| s.tokens.len())
                .map(Script::next)
        };

        match response {
            Some(Response::Output(output)) => Ok(output),
            Some(Response::StartupFailure) => Err(CommandError::startup(
                program.clone(),
                std::io::Error::new(std::io::ErrorKind::NotFound, "scripted startup failure"),
            )),
            None => Ok(self.default.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|a| (*a).to_string()).collect()
    }

    #[tokio::test]
    async fn test_unscripted_commands_succeed() {
        let runner = ScriptedRunner::new();
        let output = runner.run(&argv(&["oc", "whoami"]), None).await.unwrap();
        assert!(output.is_success());
        assert_eq!(runner.count(&["whoami"]), 1);
    }

    #[tokio::test]
    async fn test_responses_in_order_then_last_repeats() {
        let runner = ScriptedRunner::new().on(
            &["get", "pod"],
            vec![CommandOutput::success("first"), CommandOutput::success("second")],
        );
        let cmd = argv(&["oc", "get", "pod", "-n", "bookinfo"]);
        assert_eq!(runner.run(&cmd, None).await.unwrap().stdout, "first");
        assert_eq!(runner.run(&cmd, None).await.unwrap().stdout, "second");
        assert_eq!(runner.run(&cmd, None).await.unwrap().stdout, "second");
    }

    #[tokio::test]
    async fn test_most_specific_script_wins() {
        let runner = ScriptedRunner::new()
            .on(&["get"], vec![CommandOutput::success("generic")])
            .on(&["get", "pod"], vec![CommandOutput::success("pods")]);
        let output = runner.run(&argv(&["oc", "get", "pod"]), None).await.unwrap();
        assert_eq!(output.stdout, "pods");
    }

    #[tokio::test]
    async fn test_fail_to_start() {
        let runner = ScriptedRunner::new().fail_to_start(&["oc"]);
        let err = runner.run(&argv(&["oc", "whoami"]), None).await.unwrap_err();
        assert!(matches!(err, CommandError::Startup { .. }));
    }

    #[tokio::test]
    async fn test_records_input() {
        let runner = ScriptedRunner::new();
        runner
            .run(&argv(&["oc", "apply", "-f", "-"]), Some("kind: Namespace"))
            .await
            .unwrap();
        assert_eq!(runner.calls()[0].input.as_deref(), Some("kind: Namespace"));
        assert_eq!(runner.position(&["apply"]), Some(0));
    }
}
