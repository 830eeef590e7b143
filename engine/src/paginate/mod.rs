//! Pagination walker and incremental reducers
//!
//! Drives repeated calls across a paginated operation and merges rows under
//! a reducer without materializing the full row set: a running sum, a
//! bounded top-N heap, a distinct set. Memory stays proportional to the
//! reducer's output size, not to the rows scanned.
//!
//! The walk is strictly sequential (cursors are stateful). A page cap
//! bounds the number of calls; reaching it stops the walk and labels the
//! result truncated rather than erroring. Transient page failures retry
//! with bounded backoff; exhausting retries aborts the walk, keeps what
//! was accumulated, and tags the outcome with a step error kind so the
//! formatter can disclose incomplete data.

mod reducer;

pub use reducer::{Reducer, ReducerState, SortDirection};

use crate::endpoint::{call_with_retry, CallError, DataEndpoint, ParamMap, RetryPolicy};
use crate::registry::OperationDescriptor;
use sdk::types::StepErrorKind;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Comparison operator in a row filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Gt => ">",
            FilterOp::Ge => ">=",
            FilterOp::Lt => "<",
            FilterOp::Le => "<=",
            FilterOp::Eq => "==",
            FilterOp::Ne => "!=",
        }
    }
}

/// Row filter applied before reduction.
///
/// Numeric comparisons coerce string-encoded numbers (Cosmos amounts are
/// decimal strings); equality falls back to string comparison when either
/// side is not numeric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldFilter {
    /// Dot-path to the field inside a row (e.g. `balance.amount`)
    pub field: String,

    /// Comparison operator
    pub operator: FilterOp,

    /// Right-hand side value
    pub value: serde_json::Value,
}

impl FieldFilter {
    /// Whether a row passes the filter. Rows missing the field fail every
    /// comparison except `!=`.
    pub fn matches(&self, row: &serde_json::Value) -> bool {
        let field_value = value_at_path(row, &self.field);

        if let (Some(lhs), Some(rhs)) = (
            field_value.and_then(coerce_number),
            coerce_number(&self.value),
        ) {
            return match self.operator {
                FilterOp::Gt => lhs > rhs,
                FilterOp::Ge => lhs >= rhs,
                FilterOp::Lt => lhs < rhs,
                FilterOp::Le => lhs <= rhs,
                FilterOp::Eq => lhs == rhs,
                FilterOp::Ne => lhs != rhs,
            };
        }

        match self.operator {
            FilterOp::Eq => field_value == Some(&self.value),
            FilterOp::Ne => field_value != Some(&self.value),
            _ => false,
        }
    }
}

/// Walk limits and retry policy
#[derive(Debug, Clone, Copy)]
pub struct WalkOptions {
    /// Maximum page calls before the walk stops, truncated
    pub page_cap: u32,

    /// Maximum rows retained by `collect`, `top_n` output, and `distinct`
    pub result_cap: usize,

    /// Retry policy for transient page failures
    pub retry: RetryPolicy,
}

/// Outcome of one pagination walk
#[derive(Debug, Clone)]
pub struct WalkOutcome {
    /// Reduced rows (scalar reducers materialize as a single row)
    pub rows: Vec<serde_json::Value>,

    /// Rows retrieved across all pages before filtering
    pub total_seen: u64,

    /// True when a cap stopped the walk before exhaustion
    pub truncated: bool,

    /// Pages actually fetched
    pub pages: u32,

    /// Error that aborted the walk, if any (accumulated rows are kept)
    pub error: Option<StepErrorKind>,
}

/// Walk a paginated operation, applying `filter` then `reducer`
/// incrementally per page.
pub async fn walk(
    endpoint: &Arc<dyn DataEndpoint>,
    op: &OperationDescriptor,
    params: &ParamMap,
    filter: Option<&FieldFilter>,
    reducer: &Reducer,
    opts: WalkOptions,
) -> WalkOutcome {
    let mut state = ReducerState::new(reducer, opts.result_cap);
    let mut cursor = None;
    let mut total_seen = 0u64;
    let mut pages = 0u32;
    let mut truncated = false;
    let mut error = None;

    tracing::debug!(
        "Starting walk of '{}' (page_cap={}, reducer={:?})",
        op.name,
        opts.page_cap,
        reducer
    );

    loop {
        if pages >= opts.page_cap {
            tracing::warn!(
                "Walk of '{}' hit page cap ({}); returning truncated result",
                op.name,
                opts.page_cap
            );
            truncated = true;
            break;
        }

        let page = match call_with_retry(endpoint, op, params, cursor.as_ref(), opts.retry).await
        {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("Walk of '{}' aborted on page {}: {}", op.name, pages + 1, e);
                error = Some(step_error_kind(&e));
                break;
            }
        };

        pages += 1;
        total_seen += page.rows.len() as u64;

        for row in &page.rows {
            if filter.map_or(true, |f| f.matches(row)) {
                if state.push(row) {
                    // Collector reached its row cap
                    truncated = true;
                }
            }
        }

        match page.next_cursor {
            Some(next) if !truncated => cursor = Some(next),
            Some(_) => {
                truncated = true;
                break;
            }
            None => break,
        }
    }

    tracing::debug!(
        "Walk of '{}' done: {} pages, {} rows seen, truncated={}",
        op.name,
        pages,
        total_seen,
        truncated
    );

    WalkOutcome {
        rows: state.finish(),
        total_seen,
        truncated,
        pages,
        error,
    }
}

/// Map a call failure to the step error taxonomy.
pub fn step_error_kind(e: &CallError) -> StepErrorKind {
    match e {
        CallError::Timeout => StepErrorKind::Timeout,
        CallError::MissingParameter(_) => StepErrorKind::InvalidParameters,
        CallError::Network(_)
        | CallError::RateLimited
        | CallError::Status { .. }
        | CallError::Decode(_) => StepErrorKind::UpstreamUnavailable,
    }
}

/// Traverse a JSON value along a dot-separated path.
/// Numeric segments index into arrays.
pub fn value_at_path<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = value;
    for part in path.split('.') {
        current = match current {
            serde_json::Value::Object(map) => map.get(part)?,
            serde_json::Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Coerce a JSON value to a number, accepting string-encoded decimals.
pub fn coerce_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
