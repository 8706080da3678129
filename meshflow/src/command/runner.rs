//! Command runner trait and the `tokio::process` implementation.

use crate::errors::CommandError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Captured result of one command invocation.
///
/// A nonzero exit is an ordinary value: several callers tolerate
/// "already exists" or "not found" rejections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
    /// Exit code; `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    /// Creates a successful output with the given stdout.
    #[must_use]
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    /// Creates a rejected output with the given exit code and stderr.
    #[must_use]
    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: Some(exit_code),
        }
    }

    /// Returns true if the command exited with status zero.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs an external command and captures its output.
///
/// Implementations never retry; retry policy belongs to the readiness poller.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `argv` (program first), optionally feeding `input` on stdin.
    ///
    /// # Errors
    ///
    /// Returns an error only when the process cannot be started or driven.
    async fn run(&self, argv: &[String], input: Option<&str>) -> Result<CommandOutput, CommandError>;
}

/// Runs commands as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Creates a new process runner.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, argv: &[String], input: Option<&str>) -> Result<CommandOutput, CommandError> {
        let (program, args) = argv.split_first().ok_or(CommandError::EmptyArgv)?;

        debug!(command = %summarize_argv(argv), "Running command");

        let mut child = Command::new(program)
            .args(args)
            .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CommandError::startup(program.clone(), e))?;

        if let Some(text) = input {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(text.as_bytes()).await.map_err(|e| CommandError::Io {
                    program: program.clone(),
                    source: e,
                })?;
                // Dropping stdin closes the pipe so the child sees EOF.
            }
        }

        let output = child.wait_with_output().await.map_err(|e| CommandError::Io {
            program: program.clone(),
            source: e,
        })?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }
}

/// Renders an argv for logs and reports, eliding long `--template=` payloads.
#[must_use]
pub fn summarize_argv(argv: &[String]) -> String {
    argv.iter()
        .map(|arg| {
            if arg.starts_with("--template=") || arg.starts_with("jsonpath=") {
                let (head, _) = arg.split_once('=').unwrap_or((arg.as_str(), ""));
                format!("{head}=...")
            } else if arg.contains(char::is_whitespace) {
                format!("'{arg}'")
            } else {
                arg.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
