//! Sintegra-Queue main entry point
//!
//! This is the command-line interface for submitting registry lookups,
//! polling their outcome and running the worker that performs them.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use sintegra_queue::config::{load_config_with_hash, Config};
use sintegra_queue::service::{error_body, split_list, RequestMetrics, Service};
use sintegra_queue::worker::Worker;
use sintegra_queue::PipelineError;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Sintegra-Queue: asynchronous registry lookups
///
/// Lookups are queued and answered later: `submit` returns task ids, a
/// `worker` process fetches and parses the registry pages, and `results`
/// reports each task's outcome until it expires.
#[derive(Parser, Debug)]
#[command(name = "sintegra-queue")]
#[command(version)]
#[command(about = "Asynchronous registry lookups", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    /// Print request metrics after the command
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Queue lookups; one identifier is a single submission, several a batch
    Submit {
        #[arg(required = true, value_name = "IDENT")]
        identifiers: Vec<String>,
    },

    /// Show task outcomes; ids may also be comma-separated
    Results {
        #[arg(required = true, value_name = "TASK_ID")]
        task_ids: Vec<String>,
    },

    /// Show persisted registrant records (requires persistence)
    Registrants {
        #[arg(required = true, value_name = "IDENT")]
        identifiers: Vec<String>,
    },

    /// Check that the status store is reachable
    Health,

    /// Consume queued lookups until interrupted
    Worker,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries JSON only
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if let Command::Worker = cli.command {
        run_worker(&config).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let metrics = Arc::new(RequestMetrics::new());
    let service = Service::from_config(&config, metrics.clone())
        .await
        .context("Failed to open stores")?;

    let outcome = dispatch(&service, cli.command).await;

    let code = match outcome {
        Ok(value) => {
            print_json(&value)?;
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::debug!(code = e.code(), status = e.status_code(), "Command failed");
            print_json(&error_body(&e))?;
            ExitCode::FAILURE
        }
    };

    if cli.metrics {
        print_json(&json!({ "requests": metrics.snapshot() }))?;
    }

    Ok(code)
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sintegra_queue=info,warn"),
            1 => EnvFilter::new("sintegra_queue=debug,info"),
            2 => EnvFilter::new("sintegra_queue=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Runs a request command against the service
async fn dispatch(service: &Service, command: Command) -> Result<Value, PipelineError> {
    match command {
        Command::Submit { identifiers } => {
            if let [single] = identifiers.as_slice() {
                render(service.submit(single).await?)
            } else {
                let tasks = service.submit_batch(&identifiers).await?;
                Ok(json!({ "tasks": render(tasks)? }))
            }
        }
        Command::Results { task_ids } => {
            let ids = split_list(&task_ids);
            if let [single] = ids.as_slice() {
                render(service.get_result(single)?)
            } else {
                render(service.get_results(&ids)?)
            }
        }
        Command::Registrants { identifiers } => render(service.lookup_registrants(&identifiers)?),
        Command::Health => render(service.health()),
        Command::Worker => Err(PipelineError::BadRequest(
            "the worker does not run through the service".to_string(),
        )),
    }
}

/// Runs the worker until Ctrl-C
async fn run_worker(config: &Config) -> anyhow::Result<()> {
    let worker = Worker::from_config(config)
        .await
        .context("Failed to start worker")?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let stats = worker.run(shutdown).await?;
    tracing::info!("Worker processed {} messages", stats.processed());
    Ok(())
}

fn render<T: Serialize>(value: T) -> Result<Value, PipelineError> {
    Ok(serde_json::to_value(value)?)
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
