//! Data endpoint adapters
//!
//! Normalizes the two heterogeneous backends — the local analytics API and
//! the upstream Cosmos REST API — behind one `DataEndpoint` trait that
//! returns uniform `Page`s. The pagination convention (offset vs next_key)
//! is declared per operation in the registry; the adapters only translate
//! it to wire parameters.
//!
//! Provider rate-limit signals (HTTP 429) and server errors are classified
//! as transient so the pagination walker's retry/backoff can handle them.

pub mod cosmos;
pub mod local;

pub use cosmos::CosmosEndpoint;
pub use local::LocalApiEndpoint;

use crate::registry::{OperationDescriptor, Target};
use async_trait::async_trait;
use sdk::types::{Cursor, Page};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Concrete parameter values for one call
pub type ParamMap = BTreeMap<String, serde_json::Value>;

/// Errors from a single backend call
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited by provider")]
    RateLimited,

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Missing parameter '{0}'")]
    MissingParameter(String),
}

impl CallError {
    /// Whether retrying the same call can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            CallError::Network(_) | CallError::RateLimited | CallError::Timeout => true,
            CallError::Status { status, .. } => *status >= 500,
            CallError::Decode(_) | CallError::MissingParameter(_) => false,
        }
    }
}

/// A backend that can serve registry operations page by page.
#[async_trait]
pub trait DataEndpoint: Send + Sync {
    /// Issue one call for `op`. `cursor` continues a previous page walk;
    /// `None` requests the first page.
    async fn fetch(
        &self,
        op: &OperationDescriptor,
        params: &ParamMap,
        cursor: Option<&Cursor>,
    ) -> Result<Page, CallError>;
}

/// The pair of configured backends, dispatched by operation target.
#[derive(Clone)]
pub struct Backends {
    pub local: Arc<dyn DataEndpoint>,
    pub upstream: Arc<dyn DataEndpoint>,
}

impl Backends {
    pub fn new(local: Arc<dyn DataEndpoint>, upstream: Arc<dyn DataEndpoint>) -> Self {
        Self { local, upstream }
    }

    /// The endpoint serving a target.
    pub fn endpoint_for(&self, target: Target) -> &Arc<dyn DataEndpoint> {
        match target {
            Target::Local => &self.local,
            Target::Upstream => &self.upstream,
        }
    }
}

/// Retry policy for transient call failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure
    pub retries: u32,

    /// Base delay; doubles per attempt
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    /// No retries; used by tests and one-shot probes.
    pub fn none() -> Self {
        Self {
            retries: 0,
            delay: Duration::ZERO,
        }
    }
}

/// Issue one call, retrying transient failures with doubling backoff.
///
/// Permanent failures (bad parameters, undecodable body) return
/// immediately; only transient ones consume retry budget.
pub async fn call_with_retry(
    endpoint: &Arc<dyn DataEndpoint>,
    op: &OperationDescriptor,
    params: &ParamMap,
    cursor: Option<&Cursor>,
    policy: RetryPolicy,
) -> Result<Page, CallError> {
    let mut delay = policy.delay;
    let mut attempt = 0u32;

    loop {
        match endpoint.fetch(op, params, cursor).await {
            Ok(page) => return Ok(page),
            Err(e) if e.is_transient() && attempt < policy.retries => {
                attempt += 1;
                tracing::warn!(
                    "Call to '{}' failed ({}), retry {}/{} in {:?}",
                    op.name,
                    e,
                    attempt,
                    policy.retries,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Replace `{param}` segments in a path template with values from `params`,
/// removing consumed entries. Remaining params become query parameters.
pub fn fill_path_template(
    path: &str,
    params: &ParamMap,
) -> Result<(String, ParamMap), CallError> {
    let mut remaining = params.clone();
    let mut filled = String::with_capacity(path.len());
    let mut rest = path;

    while let Some(open) = rest.find('{') {
        let Some(close_rel) = rest[open..].find('}') else {
            filled.push_str(rest);
            break;
        };
        filled.push_str(&rest[..open]);
        let key = &rest[open + 1..open + close_rel];
        let value = remaining
            .remove(key)
            .ok_or_else(|| CallError::MissingParameter(key.to_string()))?;
        filled.push_str(&value_to_segment(&value));
        rest = &rest[open + close_rel + 1..];
    }
    filled.push_str(rest);

    Ok((filled, remaining))
}

/// Render a JSON value as a path/query segment (strings unquoted).
pub fn value_to_segment(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Map a reqwest error to a `CallError`.
pub(crate) fn map_reqwest_error(e: reqwest::Error) -> CallError {
    if e.is_timeout() {
        CallError::Timeout
    } else {
        CallError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fill_path_template() {
        let mut params = ParamMap::new();
        params.insert("validator_addr".into(), json!("celestiavaloper1xyz"));
        params.insert("status".into(), json!("BOND_STATUS_BONDED"));

        let (path, remaining) = fill_path_template(
            "/cosmos/staking/v1beta1/validators/{validator_addr}/delegations",
            &params,
        )
        .unwrap();

        assert_eq!(
            path,
            "/cosmos/staking/v1beta1/validators/celestiavaloper1xyz/delegations"
        );
        // Consumed path params are removed; the rest stay for the query string
        assert_eq!(remaining.len(), 1);
        assert!(remaining.contains_key("status"));
    }

    #[test]
    fn test_fill_path_template_integer_param() {
        let mut params = ParamMap::new();
        params.insert("height".into(), json!(1234567));
        let (path, _) = fill_path_template("/blocks/{height}", &params).unwrap();
        assert_eq!(path, "/blocks/1234567");
    }

    #[test]
    fn test_fill_path_template_missing_param() {
        let err = fill_path_template("/blocks/{height}", &ParamMap::new()).unwrap_err();
        assert!(matches!(err, CallError::MissingParameter(p) if p == "height"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(CallError::RateLimited.is_transient());
        assert!(CallError::Timeout.is_transient());
        assert!(CallError::Network("reset".into()).is_transient());
        assert!(CallError::Status {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(!CallError::Status {
            status: 404,
            body: String::new()
        }
        .is_transient());
        assert!(!CallError::MissingParameter("x".into()).is_transient());
        assert!(!CallError::Decode("bad json".into()).is_transient());
    }
}
