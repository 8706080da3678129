//! `meshflow` command-line entry point.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use meshflow::cancellation::{cancel_on_interrupt, CancellationToken};
use meshflow::command::ProcessRunner;
use meshflow::config::MeshflowConfig;
use meshflow::errors::MeshflowError;
use meshflow::events::LoggingEventSink;
use meshflow::observability::{init_tracing, LogFormat};
use meshflow::orchestrator::{Component, Orchestrator};
use meshflow::stages::Stage;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Install and tear down service-mesh test environments.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file.
    #[arg(long, short, global = true, default_value = "meshflow.yaml")]
    config: PathBuf,

    /// Components to run; overrides the file. Repeat or comma-separate.
    #[arg(long = "component", global = true, value_enum, value_delimiter = ',')]
    components: Vec<Component>,

    /// Kubeconfig passed to every cluster command; overrides the file.
    #[arg(long, global = true)]
    kubeconfig: Option<PathBuf>,

    /// Report format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Log line format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Install the selected components.
    Install,
    /// Remove the selected components in reverse order.
    Uninstall,
    /// Print the install and uninstall stages without running them.
    Plan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct PlanPreview {
    install: Vec<Stage>,
    uninstall: Vec<Stage>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = init_tracing(cli.log_format) {
        eprintln!("warning: logging not initialised: {e}");
    }

    let code = match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            match e.downcast_ref::<MeshflowError>() {
                Some(MeshflowError::Cancelled(_)) => 130,
                _ => 1,
            }
        }
    };
    std::process::exit(code);
}

async fn run(cli: &Cli) -> Result<i32> {
    let mut config = MeshflowConfig::from_path(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?
        .with_components(cli.components.clone());
    if let Some(ref kubeconfig) = cli.kubeconfig {
        config = config.with_kubeconfig(kubeconfig);
    }
    let cluster = config.cluster_cli();

    if matches!(cli.command, Command::Plan) {
        let plan = config.to_plan().context("building install plan")?;
        let orchestrator = Orchestrator::new(plan, Arc::new(ProcessRunner::new()), cluster);
        print_plan(cli.output, orchestrator.install_stages(), orchestrator.uninstall_stages())?;
        return Ok(0);
    }

    let plan = config.into_plan().context("building install plan")?;
    let cancel = Arc::new(CancellationToken::new());
    let interrupt = cancel_on_interrupt(cancel.clone());
    let orchestrator = Orchestrator::new(plan, Arc::new(ProcessRunner::new()), cluster)
        .with_cancellation(cancel)
        .with_event_sink(Arc::new(LoggingEventSink::debug()));

    let code = match cli.command {
        Command::Install => {
            let report = orchestrator.install().await.context("install")?;
            emit(cli.output, &report)?;
            report.exit_code()
        }
        Command::Uninstall => {
            let report = orchestrator.uninstall().await.context("uninstall")?;
            emit(cli.output, &report)?;
            report.exit_code()
        }
        Command::Plan => 0,
    };
    interrupt.abort();
    Ok(code)
}

fn emit<R: Serialize + std::fmt::Display>(format: OutputFormat, report: &R) -> Result<()> {
    match format {
        OutputFormat::Text => print!("{report}"),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report).context("serializing report")?);
        }
    }
    Ok(())
}

fn print_plan(format: OutputFormat, install: Vec<Stage>, uninstall: Vec<Stage>) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!("install:");
            for (i, stage) in install.iter().enumerate() {
                println!("  {:>2}. {stage}", i + 1);
            }
            println!("uninstall:");
            for (i, stage) in uninstall.iter().enumerate() {
                println!("  {:>2}. {stage}", i + 1);
            }
        }
        OutputFormat::Json => {
            let preview = PlanPreview { install, uninstall };
            println!("{}", serde_json::to_string_pretty(&preview).context("serializing plan")?);
        }
    }
    Ok(())
}
