//! LLM Router
//!
//! Orders providers so the configured default is attempted first, then
//! fails over to the remaining providers. Each attempt runs under the
//! configured per-call timeout. The specific model behind the capability is
//! interchangeable: the planner only sees raw text that it validates.

use super::{LlmClient, LlmError, Message};
use crate::config::LlmConfig;
use std::sync::Arc;
use std::time::Duration;

/// Failover router over the configured LLM providers
pub struct LlmRouter {
    providers: Vec<Box<dyn LlmClient>>,
    config: Arc<LlmConfig>,
}

impl LlmRouter {
    /// Create a new router.
    ///
    /// # Arguments
    /// * `providers` - Available LLM providers
    /// * `config` - LLM configuration (default provider, call timeout)
    pub fn new(providers: Vec<Box<dyn LlmClient>>, config: Arc<LlmConfig>) -> Self {
        Self { providers, config }
    }

    /// Providers in attempt order: the configured default first, then the
    /// rest in registration order.
    fn ordered(&self) -> Vec<&dyn LlmClient> {
        let default = &self.config.default_provider;
        let mut ordered: Vec<&dyn LlmClient> =
            self.providers.iter().map(|b| b.as_ref()).collect();
        ordered.sort_by_key(|p| if p.name() == default { 0 } else { 1 });
        ordered
    }

    /// Call providers with automatic failover.
    ///
    /// Returns the raw completion text and the name of the provider that
    /// produced it, or `ProviderUnavailable` when every provider failed.
    pub async fn complete(&self, messages: &[Message]) -> super::Result<(String, String)> {
        if self.providers.is_empty() {
            return Err(LlmError::ProviderUnavailable(
                "No LLM providers configured".to_string(),
            ));
        }

        let timeout = Duration::from_secs(self.config.call_timeout_secs);

        for provider in self.ordered() {
            tracing::debug!(
                "Attempting provider: {} (timeout: {}s)",
                provider.name(),
                timeout.as_secs()
            );

            match tokio::time::timeout(timeout, provider.complete(messages)).await {
                Ok(Ok(text)) => {
                    tracing::info!("Provider {} succeeded", provider.name());
                    return Ok((text, provider.name().to_string()));
                }
                Ok(Err(e)) => {
                    tracing::warn!("Provider {} failed: {}", provider.name(), e);
                }
                Err(_) => {
                    tracing::warn!(
                        "Provider {} timed out after {}s",
                        provider.name(),
                        timeout.as_secs()
                    );
                }
            }
        }

        tracing::error!("All LLM providers exhausted");
        Err(LlmError::ProviderUnavailable(
            "All LLM providers failed".to_string(),
        ))
    }

    /// Check the health of all registered providers.
    /// Returns a list of (provider_name, is_healthy).
    pub async fn check_health(&self) -> Vec<(&str, bool)> {
        let mut results = Vec::new();
        for provider in &self.providers {
            let is_healthy = provider.check_health().await;
            results.push((provider.name(), is_healthy));
        }
        results
    }
}
