use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use fhirgate_auth::{
    AccessCheckerFactory, AccessConfig, AccessDecision, HttpFhirClient, HttpMethod,
    IncomingRequest,
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::cli::CheckArgs;
use crate::output::print_decision;

pub async fn check(args: &CheckArgs) -> Result<AccessDecision> {
    let config = match &args.config {
        Some(path) => AccessConfig::from_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => AccessConfig::default(),
    };
    config.validate().context("Invalid configuration")?;

    let claims = read_claims(&args.claims)?;
    let body = args
        .body
        .as_ref()
        .map(|path| fs::read(path).with_context(|| format!("Failed to read body: {}", path.display())))
        .transpose()?;

    let method: HttpMethod = args.method.parse()?;
    let request = IncomingRequest::from_path(method, &args.path, body)?;
    let client = HttpFhirClient::new(config.backend.clone())?;
    tracing::debug!(%method, path = %args.path, backend = %client.base_url(), "Evaluating request");
    let checker = AccessCheckerFactory::from_config(&config)
        .create(&claims, Arc::new(client))
        .context("Cannot authorize this caller")?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let decision = checker
        .check_access_with_cancel(&request, &cancel)
        .await
        .context("No decision could be rendered")?;

    print_decision(&decision, args.format)?;
    Ok(decision)
}

fn read_claims(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read claims: {}", path.display()))?;
    let claims: Value = serde_json::from_str(&content).context("Claims file is not valid JSON")?;
    if !claims.is_object() {
        anyhow::bail!("Claims file must contain a JSON object");
    }
    Ok(claims)
}
