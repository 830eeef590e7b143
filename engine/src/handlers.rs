//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - serve: start the web chat server
//! - ask: answer one question and exit
//! - catalog: list the operations in the catalog
//! - doctor: validate configuration and check provider availability

use anyhow::Result;
use serde_json::json;
use std::sync::Arc;

use crate::assistant::Assistant;
use crate::config::Config;
use crate::endpoint::{Backends, CosmosEndpoint, LocalApiEndpoint};
use crate::executor::PlanExecutor;
use crate::llm::{gemini::GeminiClient, grok::GrokClient, LlmClient, LlmRouter};
use crate::planner::QueryPlanner;
use crate::registry::Registry;
use crate::server;

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Build the full assistant stack from configuration. The catalog is
/// validated here, so a malformed entry aborts startup instead of
/// surfacing mid-query.
pub fn build_assistant(config: &Config) -> Result<Arc<Assistant>> {
    let registry = Arc::new(Registry::builtin()?);
    tracing::info!("Operation catalog loaded: {} operations", registry.len());

    let providers: Vec<Box<dyn LlmClient>> = vec![
        Box::new(GeminiClient::new(config.llm.gemini.clone())),
        Box::new(GrokClient::new(config.llm.grok.clone())),
    ];
    let router = LlmRouter::new(providers, Arc::new(config.llm.clone()));

    let backends = Backends::new(
        Arc::new(LocalApiEndpoint::new(&config.local_api)),
        Arc::new(CosmosEndpoint::new(&config.upstream)),
    );

    Ok(Arc::new(Assistant::new(
        QueryPlanner::new(router, Arc::clone(&registry)),
        PlanExecutor::new(backends, registry, config.query.clone()),
    )))
}

/// Start the web chat server and block until it exits.
pub async fn handle_serve(config: &Config) -> Result<()> {
    let assistant = build_assistant(config)?;
    server::serve(assistant, &config.server.bind).await?;
    Ok(())
}

/// Answer one question on the command line.
pub async fn handle_ask(question: String, config: &Config, format: OutputFormat) -> Result<()> {
    let assistant = build_assistant(config)?;
    let answer = assistant.answer(&question, "cli").await;

    match format {
        OutputFormat::Text => {
            println!("{}", answer.text);
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "response": answer.text,
                    "locale": answer.locale,
                    "partial": answer.partial,
                }))?
            );
        }
    }
    Ok(())
}

/// Print the operation catalog.
pub fn handle_catalog(format: OutputFormat) -> Result<()> {
    let registry = Registry::builtin()?;

    match format {
        OutputFormat::Text => {
            for op in registry.list() {
                let paging = if op.paginated.is_some() {
                    " (paginated)"
                } else {
                    ""
                };
                println!("{} [{}]{}", op.name, op.target, paging);
                println!("    {}", op.description);
                for param in &op.params {
                    let req = if param.required { "required" } else { "optional" };
                    println!("    - {} ({:?}, {})", param.name, param.ty, req);
                }
            }
            println!("\n{} operations", registry.len());
        }
        OutputFormat::Json => {
            let ops: Vec<_> = registry.list().collect();
            println!("{}", serde_json::to_string_pretty(&ops)?);
        }
    }
    Ok(())
}

/// Validate configuration and probe LLM provider availability.
pub async fn handle_doctor(config: &Config, format: OutputFormat) -> Result<()> {
    let mut checks: Vec<(&str, bool, String)> = Vec::new();

    let config_ok = config.validate();
    checks.push((
        "config",
        config_ok.is_ok(),
        config_ok.err().map(|e| e.to_string()).unwrap_or_default(),
    ));

    let registry = Registry::builtin();
    let catalog_detail = match &registry {
        Ok(r) => format!("{} operations", r.len()),
        Err(e) => e.to_string(),
    };
    checks.push(("catalog", registry.is_ok(), catalog_detail));

    let providers: Vec<Box<dyn LlmClient>> = vec![
        Box::new(GeminiClient::new(config.llm.gemini.clone())),
        Box::new(GrokClient::new(config.llm.grok.clone())),
    ];
    let router = LlmRouter::new(providers, Arc::new(config.llm.clone()));
    for (name, healthy) in router.check_health().await {
        checks.push((
            name,
            healthy,
            if healthy {
                "API key present".to_string()
            } else {
                "API key missing".to_string()
            },
        ));
    }

    let all_ok = checks.iter().all(|(_, ok, _)| *ok);

    match format {
        OutputFormat::Text => {
            for (name, ok, detail) in &checks {
                let mark = if *ok { "ok" } else { "FAIL" };
                if detail.is_empty() {
                    println!("{name:<10} {mark}");
                } else {
                    println!("{name:<10} {mark}  {detail}");
                }
            }
        }
        OutputFormat::Json => {
            let report: Vec<_> = checks
                .iter()
                .map(|(name, ok, detail)| json!({"check": name, "ok": ok, "detail": detail}))
                .collect();
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    if !all_ok {
        anyhow::bail!("Some checks failed");
    }
    Ok(())
}
