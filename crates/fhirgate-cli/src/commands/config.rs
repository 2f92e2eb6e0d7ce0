use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use fhirgate_auth::AccessConfig;

use crate::output::print_success;

pub fn validate(path: &Path) -> Result<()> {
    let config = AccessConfig::from_file(path)
        .with_context(|| format!("Failed to load config: {}", path.display()))?;
    config.validate().context("Invalid configuration")?;

    print_success(&format!("{} is valid", path.display()));
    println!("{}: {}", "List claim".cyan(), config.list_claim);
    println!("{}: {}", "Backend".cyan(), config.backend.base_url);
    println!("{}: {:?}", "Timeout".cyan(), config.backend.request_timeout);
    if config.rules.is_empty() {
        println!("{}: (defaults only)", "Rules".cyan());
    } else {
        let types: Vec<&str> = config.rules.keys().map(String::as_str).collect();
        println!("{}: {}", "Rules".cyan(), types.join(", "));
    }
    Ok(())
}
