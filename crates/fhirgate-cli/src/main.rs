mod cli;
mod commands;
mod logging;
mod output;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};
use output::{error_message, print_error};

/// Exit status for a denied request; errors use 1.
const EXIT_DENIED: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            if let Some(category) = output::error_category(&e) {
                tracing::error!(%category, error = %format!("{e:#}"), "Command failed");
            }
            print_error(&error_message(&e));
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init_tracing(&cli.log_level);

    match &cli.command {
        Commands::Check(args) => {
            let decision = commands::check::check(args).await?;
            if decision.is_allowed() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(EXIT_DENIED))
            }
        }
        Commands::ValidateConfig(args) => {
            commands::config::validate(&args.config)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
