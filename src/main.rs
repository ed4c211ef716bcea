//! Taskloom - task and workflow orchestration engine
//!
//! Main entry point for the Taskloom CLI.

mod cli;
mod register;

use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use taskloom_config::{Config, ConfigLoader, ConfigValidator, LoggingConfig, ValidationResult};
use taskloom_core::{
    Branch, FailurePolicy, RunStatus, Workflow, WorkflowDefinition, WorkflowExecutor, WorkflowKind,
};
use taskloom_protocols::Variables;

use crate::cli::{Cli, Commands};
use crate::register::register_agents;

/// Initialize tracing with console and file output.
///
/// Console output goes to stderr so that reports printed on stdout stay
/// machine-readable. Log files rotate daily under `logging.directory`.
fn init_tracing(logging: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let file_layer = if logging.file {
        let log_dir = ConfigLoader::expand_path(&logging.directory);
        std::fs::create_dir_all(&log_dir)?;

        let file_appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("taskloom")
            .filename_suffix("log")
            .max_log_files(logging.max_files)
            .build(&log_dir)?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        // The guard flushes the file writer on drop; keep it for the whole run.
        static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
            std::sync::OnceLock::new();
        let _ = GUARD.set(guard);

        Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = ConfigLoader::load_or_default(cli.config.as_deref())?;
    init_tracing(&config.logging)?;

    match cli.command {
        Commands::Run {
            workflow,
            vars,
            best_effort,
            max_concurrency,
        } => {
            let initial: Variables = vars.into_iter().collect();
            run_workflow(&config, &workflow, initial, best_effort, max_concurrency).await
        }
        Commands::Validate { workflow } => validate_workflow(&config, &workflow),
        Commands::Plan { workflow } => plan_workflow(&config, &workflow),
    }
}

/// A workflow argument is a file path, or the name of an inline workflow.
fn load_definition(
    config: &Config,
    workflow: &str,
) -> Result<WorkflowDefinition, Box<dyn std::error::Error>> {
    let path = Path::new(workflow);
    if !path.exists() {
        if let Some(definition) = config.workflow(workflow) {
            return Ok(definition.clone());
        }
    }
    Ok(ConfigLoader::load_workflow(path)?)
}

async fn run_workflow(
    config: &Config,
    workflow: &str,
    initial: Variables,
    best_effort: bool,
    max_concurrency: Option<usize>,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let validation = ConfigValidator::validate(config)?;
    if !validation.is_valid() {
        print_validation("config", &validation);
        return Ok(ExitCode::FAILURE);
    }

    let definition = load_definition(config, workflow)?;
    let workflow = Workflow::from_definition(&definition)?;
    let registry = register_agents(config)?;

    let mut executor = WorkflowExecutor::from_config(registry, &config.engine);
    if best_effort {
        executor = executor.with_failure_policy(FailurePolicy::BestEffort);
    }
    if let Some(limit) = max_concurrency {
        executor = executor.with_max_concurrency(limit);
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling run");
            on_interrupt.cancel();
        }
    });

    let report = executor.run_with_cancel(&workflow, initial, cancel).await;
    info!(
        "Run {} finished with status {:?} in {:?}",
        report.run_id,
        report.status,
        Duration::from_millis(report.duration_ms)
    );
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(if report.status == RunStatus::Completed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn validate_workflow(config: &Config, workflow: &str) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let definition = load_definition(config, workflow)?;
    let result = ConfigValidator::validate_workflow(config, &definition)?;
    print_validation(&definition.name, &result);

    if result.is_valid() {
        println!(
            "Workflow '{}' is valid ({}, {} tasks)",
            definition.name,
            definition.pattern,
            definition.tasks.len()
        );
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn print_validation(subject: &str, result: &ValidationResult) {
    for error in &result.errors {
        eprintln!("error: {}: {}", error.path, error.message);
    }
    for warning in &result.warnings {
        eprintln!("warning: {}: {}", warning.path, warning.message);
    }
    if !result.is_valid() {
        eprintln!(
            "{}: {} error(s), {} warning(s)",
            subject,
            result.errors.len(),
            result.warnings.len()
        );
    }
}

fn plan_workflow(config: &Config, workflow: &str) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let definition = load_definition(config, workflow)?;
    let workflow = Workflow::from_definition(&definition)?;
    print_plan(&workflow, 0);
    Ok(ExitCode::SUCCESS)
}

fn print_plan(workflow: &Workflow, depth: usize) {
    let indent = "  ".repeat(depth);
    println!("{}{} ({})", indent, workflow.name(), workflow.pattern());

    for (index, wave) in workflow.schedule().waves.iter().enumerate() {
        println!("{}  wave {}: {}", indent, index + 1, wave.join(", "));
    }

    match workflow.kind() {
        WorkflowKind::Loop { max_iterations, .. } => {
            println!("{}  repeats up to {} times", indent, max_iterations);
        }
        WorkflowKind::Parallel { merge: Some(merge) } => {
            println!("{}  merges into '{}'", indent, merge.output_key);
        }
        WorkflowKind::Conditional { branches, .. } => {
            for (key, branch) in branches {
                match branch {
                    Branch::Task(task) => {
                        println!("{}  branch '{}': task {}", indent, key, task.id);
                    }
                    Branch::Workflow(sub) => {
                        println!("{}  branch '{}':", indent, key);
                        print_plan(sub, depth + 2);
                    }
                }
            }
        }
        _ => {}
    }
}
