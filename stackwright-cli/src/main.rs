//! Command-line entry point for stackwright.

mod cli;
mod commands;
mod output;
mod prompt;

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use stackwright::cancellation::CancellationToken;
use stackwright::errors::StackwrightError;

use crate::cli::{Cli, GlobalArgs, LogFormat};

const LOG_ENV: &str = "STACKWRIGHT_LOG";

fn init_tracing(global: &GlobalArgs) {
    let filter = if global.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match global.log_format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn report(err: &anyhow::Error) {
    if let Some(StackwrightError::DocumentValidation(validation)) = err.downcast_ref::<StackwrightError>() {
        eprintln!(
            "error: Document has {} validation error(s)",
            validation.violations.len()
        );
        for violation in &validation.violations {
            eprintln!("  - {violation}");
        }
        return;
    }
    eprintln!("error: {err:#}");
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.global);

    let cancel = Arc::new(CancellationToken::new());
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel("Interrupted");
        }
    });

    match commands::run(cli.command, &cli.global, &cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}
