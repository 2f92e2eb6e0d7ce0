use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "fhirgate")]
#[command(about = "fhirgate - evaluate list-compartment access decisions")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log level when RUST_LOG is not set
    #[arg(long, global = true, env = "FHIRGATE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Decide one request against a live backend
    Check(CheckArgs),
    /// Load and validate a configuration file
    ValidateConfig(ValidateConfigArgs),
}

#[derive(clap::Args)]
pub struct CheckArgs {
    /// Engine configuration (TOML). Defaults apply when omitted.
    #[arg(short, long, env = "FHIRGATE_CONFIG")]
    pub config: Option<PathBuf>,
    /// Decoded token claims (JSON object)
    #[arg(long)]
    pub claims: PathBuf,
    /// HTTP method of the request
    #[arg(short, long, default_value = "GET")]
    pub method: String,
    /// Request target relative to the FHIR base, e.g. "Observation?subject=Patient/123"
    #[arg(short, long)]
    pub path: String,
    /// Request body (JSON resource)
    #[arg(short, long)]
    pub body: Option<PathBuf>,
    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(clap::Args)]
pub struct ValidateConfigArgs {
    /// Engine configuration (TOML)
    #[arg(short, long, env = "FHIRGATE_CONFIG")]
    pub config: PathBuf,
}
