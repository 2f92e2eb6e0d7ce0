use anyhow::Result;
use colored::Colorize;
use fhirgate_auth::{AccessDecision, AccessError, ErrorCategory};

use crate::cli::OutputFormat;

pub fn print_decision(decision: &AccessDecision, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => println!("{}", decision_line(decision)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(decision)?),
    }
    Ok(())
}

fn decision_line(decision: &AccessDecision) -> String {
    match decision {
        AccessDecision::Allow => "ALLOW".green().bold().to_string(),
        AccessDecision::Deny(reason) => format!("{} ({reason})", "DENY".red().bold()),
    }
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Category of the engine error behind `err`, if an engine error caused it.
pub fn error_category(err: &anyhow::Error) -> Option<ErrorCategory> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<AccessError>())
        .map(AccessError::category)
}

/// Error line for the terminal, prefixed with the engine error category.
pub fn error_message(err: &anyhow::Error) -> String {
    match error_category(err) {
        Some(category) => format!("{category} error: {err:#}"),
        None => format!("{err:#}"),
    }
}
