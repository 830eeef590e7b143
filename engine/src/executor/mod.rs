//! Plan Executor
//!
//! Runs validated plans against the configured backends. Steps with no
//! unresolved references run concurrently, bounded by a semaphore; a step
//! whose dependency failed is skipped instead of being attempted with
//! garbage parameters. Execution never fails as a whole: every step ends in
//! a terminal state inside the result bundle, and partial data is kept.

use crate::config::QueryConfig;
use crate::endpoint::{call_with_retry, Backends, ParamMap, RetryPolicy};
use crate::paginate::{self, Reducer, ReducerState, WalkOptions};
use crate::planner::{ParamValue, Plan, PlanStep, PostProcess};
use crate::registry::Registry;
use sdk::types::StepErrorKind;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Terminal state of one executed step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Succeeded,
    Failed,
    Skipped,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Succeeded => write!(f, "succeeded"),
            StepStatus::Failed => write!(f, "failed"),
            StepStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Result of one step. Rows accumulated before a mid-walk failure are kept
/// alongside the error.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub status: StepStatus,
    pub rows: Vec<serde_json::Value>,
    pub total_seen: u64,
    pub truncated: bool,
    pub error: Option<StepErrorKind>,
}

impl StepOutcome {
    fn skipped() -> Self {
        Self {
            status: StepStatus::Skipped,
            rows: Vec::new(),
            total_seen: 0,
            truncated: false,
            error: None,
        }
    }

    fn failed(error: StepErrorKind) -> Self {
        Self {
            status: StepStatus::Failed,
            rows: Vec::new(),
            total_seen: 0,
            truncated: false,
            error: Some(error),
        }
    }
}

/// Outcomes of every step in a plan, keyed by step id.
#[derive(Debug, Clone, Default)]
pub struct ResultBundle {
    outcomes: BTreeMap<usize, StepOutcome>,
}

impl ResultBundle {
    pub fn get(&self, step_id: usize) -> Option<&StepOutcome> {
        self.outcomes.get(&step_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &StepOutcome)> {
        self.outcomes.iter().map(|(id, o)| (*id, o))
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Whether any step failed, was skipped, or returned truncated data.
    pub fn is_partial(&self) -> bool {
        self.outcomes
            .values()
            .any(|o| o.status != StepStatus::Succeeded || o.truncated)
    }

    /// The final step's outcome, which carries the answer to the question.
    pub fn last(&self) -> Option<&StepOutcome> {
        self.outcomes.values().next_back()
    }

    #[cfg(test)]
    pub(crate) fn insert_for_tests(&mut self, step_id: usize, outcome: StepOutcome) {
        self.outcomes.insert(step_id, outcome);
    }
}

pub struct PlanExecutor {
    backends: Backends,
    registry: Arc<Registry>,
    config: QueryConfig,
}

impl PlanExecutor {
    pub fn new(backends: Backends, registry: Arc<Registry>, config: QueryConfig) -> Self {
        Self {
            backends,
            registry,
            config,
        }
    }

    /// Execute every step of a plan. Always returns a bundle with exactly
    /// one terminal outcome per step.
    pub async fn execute(&self, plan: &Plan) -> ResultBundle {
        let mut bundle = ResultBundle::default();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_steps.max(1)));
        let step_timeout = Duration::from_secs(self.config.step_timeout_secs);

        let mut pending: Vec<&PlanStep> = plan.steps.iter().collect();

        while !pending.is_empty() {
            // Everything whose dependencies already have outcomes can run
            // in this wave; dependencies always point at earlier steps, so
            // at least the first pending step is always ready.
            let (wave, rest): (Vec<&PlanStep>, Vec<&PlanStep>) = pending
                .into_iter()
                .partition(|s| s.dependencies().iter().all(|d| bundle.get(*d).is_some()));
            pending = rest;

            let mut tasks: JoinSet<(usize, StepOutcome)> = JoinSet::new();
            let mut spawned: Vec<usize> = Vec::new();

            for step in wave {
                let outcome_or_params = self.resolve_params(step, &bundle);

                let params = match outcome_or_params {
                    Ok(params) => params,
                    Err(outcome) => {
                        bundle.outcomes.insert(step.id, outcome);
                        continue;
                    }
                };

                let step = step.clone();
                let backends = self.backends.clone();
                let registry = Arc::clone(&self.registry);
                let config = self.config.clone();
                let semaphore = Arc::clone(&semaphore);

                spawned.push(step.id);
                tasks.spawn(async move {
                    let _permit = semaphore.acquire_owned().await;
                    let outcome = match tokio::time::timeout(
                        step_timeout,
                        run_step(&backends, &registry, &config, &step, &params),
                    )
                    .await
                    {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            tracing::warn!(
                                "Step {} ('{}') exceeded the {}s deadline",
                                step.id,
                                step.operation,
                                step_timeout.as_secs()
                            );
                            StepOutcome::failed(StepErrorKind::Timeout)
                        }
                    };
                    (step.id, outcome)
                });
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((id, outcome)) => {
                        bundle.outcomes.insert(id, outcome);
                    }
                    Err(e) => {
                        // A panicked step task must not sink the request.
                        tracing::error!("Step task aborted: {}", e);
                    }
                }
            }

            // A panicked task joins with an error and never reports its id,
            // leaving its step without an outcome. Record it failed here so
            // dependent steps settle instead of waiting on it forever.
            for id in spawned {
                bundle
                    .outcomes
                    .entry(id)
                    .or_insert_with(|| StepOutcome::failed(StepErrorKind::UpstreamUnavailable));
            }
        }

        tracing::info!(
            "Plan {} executed: {} steps, partial={}",
            plan.id,
            bundle.len(),
            bundle.is_partial()
        );

        bundle
    }

    /// Resolve step parameters against earlier outcomes. A reference into a
    /// failed or skipped dependency skips this step; a reference into a
    /// succeeded step that lacks the field fails it.
    fn resolve_params(
        &self,
        step: &PlanStep,
        bundle: &ResultBundle,
    ) -> Result<ParamMap, StepOutcome> {
        let mut params = ParamMap::new();

        for (name, value) in &step.params {
            match value {
                ParamValue::Literal(v) => {
                    params.insert(name.clone(), v.clone());
                }
                ParamValue::Ref { from_step, field } => {
                    let dep = match bundle.get(*from_step) {
                        Some(dep) => dep,
                        None => return Err(StepOutcome::skipped()),
                    };
                    if dep.status != StepStatus::Succeeded {
                        tracing::debug!(
                            "Skipping step {}: dependency {} {}",
                            step.id,
                            from_step,
                            dep.status
                        );
                        return Err(StepOutcome::skipped());
                    }
                    let resolved = dep
                        .rows
                        .first()
                        .and_then(|row| paginate::value_at_path(row, field));
                    match resolved {
                        Some(v) => {
                            params.insert(name.clone(), v.clone());
                        }
                        None => {
                            tracing::warn!(
                                "Step {}: field '{}' not present in step {} output",
                                step.id,
                                field,
                                from_step
                            );
                            return Err(StepOutcome::failed(StepErrorKind::InvalidParameters));
                        }
                    }
                }
            }
        }

        Ok(params)
    }
}

async fn run_step(
    backends: &Backends,
    registry: &Registry,
    config: &QueryConfig,
    step: &PlanStep,
    params: &ParamMap,
) -> StepOutcome {
    let op = match registry.get(&step.operation) {
        Ok(op) => op,
        Err(_) => return StepOutcome::failed(StepErrorKind::InvalidParameters),
    };
    let endpoint = backends.endpoint_for(op.target);
    let retry = RetryPolicy::new(
        config.page_retries,
        Duration::from_millis(config.retry_delay_ms),
    );
    let post = step.post.clone().unwrap_or_default();
    let filter = post.filter.as_ref();
    let reducer = post.aggregate.clone().unwrap_or(Reducer::Collect);

    let mut outcome = if op.paginated.is_some() {
        let walk = paginate::walk(
            endpoint,
            op,
            params,
            filter,
            &reducer,
            WalkOptions {
                page_cap: config.page_cap,
                result_cap: config.result_cap,
                retry,
            },
        )
        .await;

        StepOutcome {
            status: if walk.error.is_some() {
                StepStatus::Failed
            } else {
                StepStatus::Succeeded
            },
            rows: walk.rows,
            total_seen: walk.total_seen,
            truncated: walk.truncated,
            error: walk.error,
        }
    } else {
        match call_with_retry(endpoint, op, params, None, retry).await {
            Ok(page) => {
                let rows = reduce_rows(&page.rows, filter, &reducer, config.result_cap);
                StepOutcome {
                    status: StepStatus::Succeeded,
                    total_seen: page.rows.len() as u64,
                    truncated: false,
                    rows,
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!("Step {} ('{}') failed: {}", step.id, op.name, e);
                StepOutcome::failed(paginate::step_error_kind(&e))
            }
        }
    };

    apply_limit(&mut outcome, &post);
    outcome
}

/// Post-hoc filter and reduction for single-call operations.
fn reduce_rows(
    rows: &[serde_json::Value],
    filter: Option<&crate::paginate::FieldFilter>,
    reducer: &Reducer,
    result_cap: usize,
) -> Vec<serde_json::Value> {
    let mut state = ReducerState::new(reducer, result_cap);
    for row in rows {
        if filter.map_or(true, |f| f.matches(row)) {
            if state.push(row) {
                break;
            }
        }
    }
    state.finish()
}

fn apply_limit(outcome: &mut StepOutcome, post: &PostProcess) {
    if let Some(limit) = post.limit {
        if outcome.rows.len() > limit {
            outcome.rows.truncate(limit);
        }
    }
}
