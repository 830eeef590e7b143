//! Query Planner
//!
//! Turns a natural-language question into a validated multi-step plan over
//! the operation catalog. The language model only proposes plans; every
//! proposal is re-validated deterministically against the registry before
//! anything executes, so a hallucinated operation or parameter is rejected
//! here rather than at call time.

use crate::llm::{self, LlmRouter, Message};
use crate::paginate::{FieldFilter, Reducer};
use crate::registry::{ParamType, Registry};
use sdk::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Hard ceiling on plan length. A question that genuinely needs more than
/// this is out of scope for a chat answer.
const MAX_PLAN_STEPS: usize = 8;

/// One parameter value in a plan step: either a literal, or a reference
/// into the output of an earlier step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ParamValue {
    /// Value taken from the first row of an earlier step's output
    Ref {
        from_step: usize,
        field: String,
    },
    Literal(serde_json::Value),
}

/// Per-step post-processing: filter rows, then reduce, then cut.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostProcess {
    /// Row filter applied before aggregation
    #[serde(default)]
    pub filter: Option<FieldFilter>,

    /// Aggregation over the filtered rows
    #[serde(default)]
    pub aggregate: Option<Reducer>,

    /// Keep at most this many output rows
    #[serde(default)]
    pub limit: Option<usize>,
}

impl PostProcess {
    pub fn is_empty(&self) -> bool {
        self.filter.is_none() && self.aggregate.is_none() && self.limit.is_none()
    }
}

/// One step of a validated plan. Step ids are 1-based positions; references
/// always point at a strictly earlier step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: usize,
    pub operation: String,
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
    #[serde(default)]
    pub post: Option<PostProcess>,
}

impl PlanStep {
    /// Ids of the earlier steps this step reads from.
    pub fn dependencies(&self) -> Vec<usize> {
        let mut deps: Vec<usize> = self
            .params
            .values()
            .filter_map(|v| match v {
                ParamValue::Ref { from_step, .. } => Some(*from_step),
                ParamValue::Literal(_) => None,
            })
            .collect();
        deps.sort_unstable();
        deps.dedup();
        deps
    }
}

/// A validated execution plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub question: String,
    pub locale: String,
    pub steps: Vec<PlanStep>,
}

/// Intermediate deserialization type for LLM JSON output
#[derive(Debug, Deserialize)]
struct RawStep {
    operation: String,
    #[serde(default)]
    params: BTreeMap<String, ParamValue>,
    #[serde(default)]
    post: Option<PostProcess>,
}

#[derive(Debug, Deserialize)]
struct RawPlan {
    steps: Vec<RawStep>,
}

pub struct QueryPlanner {
    router: LlmRouter,
    registry: Arc<Registry>,
}

impl QueryPlanner {
    pub fn new(router: LlmRouter, registry: Arc<Registry>) -> Self {
        Self { router, registry }
    }

    /// Produce a validated plan for a question, or fail the whole request.
    /// `history` carries recent conversation turns so follow-up questions
    /// ("and for that validator?") can be planned in context.
    pub async fn plan(
        &self,
        question: &str,
        locale: &str,
        history: &[Message],
    ) -> Result<Plan, EngineError> {
        let mut messages = vec![Message::system(self.system_prompt())];
        messages.extend_from_slice(history);
        messages.push(Message::user(question));

        let (content, provider) = self
            .router
            .complete(&messages)
            .await
            .map_err(|e| EngineError::Planning(format!("language model call failed: {e}")))?;

        tracing::debug!("Plan proposal from '{}': {}", provider, content);

        let steps = parse_steps(&content)?;
        validate_steps(&self.registry, &steps)?;

        Ok(Plan {
            id: uuid::Uuid::new_v4().to_string(),
            question: question.to_string(),
            locale: locale.to_string(),
            steps,
        })
    }

    fn system_prompt(&self) -> String {
        format!(
            "You translate questions about the Celestia network into a JSON query plan.\n\
            Available operations:\n{}\n\
            Output ONLY a JSON object: {{\"steps\": [...]}}. Each step has:\n\
            - \"operation\": an operation name from the list above\n\
            - \"params\": object of parameter values. A value may be a literal, or\n  \
              {{\"from_step\": N, \"field\": \"dot.path\"}} to take a field from the first\n  \
              result row of an earlier step N (steps are numbered from 1).\n\
            - \"post\" (optional): {{\"filter\": {{\"field\", \"operator\", \"value\"}},\n  \
              \"aggregate\": {{\"kind\": one of \"collect\", \"count\", \"sum\", \"min\", \"max\",\n  \
              \"top_n\", \"distinct\", plus \"field\" and for top_n \"n\" and \"direction\"}},\n  \
              \"limit\": max rows to keep}}\n\
            Filter operators: \">\", \">=\", \"<\", \"<=\", \"==\", \"!=\".\n\
            On-chain amounts are in utia; 1 TIA = 1,000,000 utia. When the user asks\n\
            about TIA, compare against utia values (multiply TIA by 1000000).\n\
            Use aggregation instead of collecting full lists whenever the question\n\
            asks for a total, a count, or a top list.\n\n\
            Example, \"top 3 validators by delegated stake\":\n\
            {{\"steps\":[{{\"operation\":\"get_validators\",\"params\":{{}},\"post\":{{\"aggregate\":\
            {{\"kind\":\"top_n\",\"field\":\"tokens\",\"n\":3,\"direction\":\"desc\"}}}}}}]}}\n\n\
            Output ONLY the JSON object, no markdown, no explanation.",
            self.registry.llm_docs()
        )
    }
}

/// Parse LLM output into plan steps, tolerating fenced or chatty replies.
fn parse_steps(content: &str) -> Result<Vec<PlanStep>, EngineError> {
    let value = llm::extract_json(content)
        .ok_or_else(|| EngineError::Planning("response contained no JSON".into()))?;

    // Accept either {"steps": [...]} or a bare array of steps.
    let raw_steps: Vec<RawStep> = if value.is_array() {
        serde_json::from_value(value)
            .map_err(|e| EngineError::Planning(format!("unparseable steps: {e}")))?
    } else {
        let raw: RawPlan = serde_json::from_value(value)
            .map_err(|e| EngineError::Planning(format!("unparseable plan: {e}")))?;
        raw.steps
    };

    Ok(raw_steps
        .into_iter()
        .enumerate()
        .map(|(i, raw)| PlanStep {
            id: i + 1,
            operation: raw.operation,
            params: raw.params,
            post: raw.post.filter(|p| !p.is_empty()),
        })
        .collect())
}

/// Deterministic plan validation against the registry. Rejects anything the
/// executor could not carry out exactly as written.
pub fn validate_steps(registry: &Registry, steps: &[PlanStep]) -> Result<(), EngineError> {
    if steps.is_empty() {
        return Err(EngineError::PlanInvalid("plan has no steps".into()));
    }
    if steps.len() > MAX_PLAN_STEPS {
        return Err(EngineError::PlanInvalid(format!(
            "plan has {} steps, maximum is {}",
            steps.len(),
            MAX_PLAN_STEPS
        )));
    }

    for step in steps {
        let op = registry.get(&step.operation).map_err(|_| {
            EngineError::PlanInvalid(format!(
                "step {} uses unknown operation '{}'",
                step.id, step.operation
            ))
        })?;

        for spec in &op.params {
            if spec.required && !step.params.contains_key(&spec.name) {
                return Err(EngineError::PlanInvalid(format!(
                    "step {} is missing required parameter '{}' of '{}'",
                    step.id, spec.name, op.name
                )));
            }
        }

        for (name, value) in &step.params {
            let spec = op.param(name).ok_or_else(|| {
                EngineError::PlanInvalid(format!(
                    "step {} passes unknown parameter '{}' to '{}'",
                    step.id, name, op.name
                ))
            })?;

            match value {
                ParamValue::Literal(v) => {
                    if !spec.ty.accepts(v) && !coercible(spec.ty, v) {
                        return Err(EngineError::PlanInvalid(format!(
                            "step {} parameter '{}' has wrong type (expected {:?})",
                            step.id, name, spec.ty
                        )));
                    }
                }
                ParamValue::Ref { from_step, field } => {
                    if *from_step == 0 || *from_step >= step.id {
                        return Err(EngineError::PlanInvalid(format!(
                            "step {} references step {}, which is not an earlier step",
                            step.id, from_step
                        )));
                    }
                    if field.is_empty() {
                        return Err(EngineError::PlanInvalid(format!(
                            "step {} reference to step {} has an empty field path",
                            step.id, from_step
                        )));
                    }
                }
            }
        }

        if let Some(post) = &step.post {
            validate_post(step.id, post)?;
        }
    }

    Ok(())
}

/// Numeric parameters are accepted as decimal strings because models often
/// quote them; the endpoint layer renders them back into the URL anyway.
fn coercible(ty: ParamType, value: &serde_json::Value) -> bool {
    match (ty, value) {
        (ParamType::Integer, serde_json::Value::String(s)) => s.parse::<i64>().is_ok(),
        (ParamType::Float, serde_json::Value::String(s)) => s.parse::<f64>().is_ok(),
        _ => false,
    }
}

fn validate_post(step_id: usize, post: &PostProcess) -> Result<(), EngineError> {
    if let Some(filter) = &post.filter {
        if filter.field.is_empty() {
            return Err(EngineError::PlanInvalid(format!(
                "step {} filter has an empty field path",
                step_id
            )));
        }
    }

    if let Some(aggregate) = &post.aggregate {
        let field = match aggregate {
            Reducer::Collect | Reducer::Count => None,
            Reducer::Sum { field }
            | Reducer::Min { field }
            | Reducer::Max { field }
            | Reducer::Distinct { field } => Some(field),
            Reducer::TopN { field, n, .. } => {
                if *n == 0 {
                    return Err(EngineError::PlanInvalid(format!(
                        "step {} top_n aggregate asks for 0 rows",
                        step_id
                    )));
                }
                Some(field)
            }
        };
        if let Some(field) = field {
            if field.is_empty() {
                return Err(EngineError::PlanInvalid(format!(
                    "step {} aggregate has an empty field path",
                    step_id
                )));
            }
        }
    }

    if post.limit == Some(0) {
        return Err(EngineError::PlanInvalid(format!(
            "step {} limit must be at least 1",
            step_id
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;
    use crate::llm::{LlmClient, LlmError};
    use async_trait::async_trait;

    struct CannedClient {
        reply: String,
    }

    #[async_trait]
    impl LlmClient for CannedClient {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, _messages: &[Message]) -> Result<String, LlmError> {
            Ok(self.reply.clone())
        }
    }

    fn planner_with_reply(reply: &str) -> QueryPlanner {
        let router = LlmRouter::new(
            vec![Box::new(CannedClient {
                reply: reply.to_string(),
            })],
            Arc::new(LlmConfig::default()),
        );
        let registry = Arc::new(Registry::builtin().unwrap());
        QueryPlanner::new(router, registry)
    }

    fn registry() -> Registry {
        Registry::builtin().unwrap()
    }

    #[tokio::test]
    async fn test_plan_single_step() {
        let planner = planner_with_reply(
            r#"{"steps":[{"operation":"get_latest_block_height","params":{}}]}"#,
        );
        let plan = planner.plan("what is the current block height", "en", &[]).await.unwrap();
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].id, 1);
        assert_eq!(plan.steps[0].operation, "get_latest_block_height");
        assert_eq!(plan.locale, "en");
    }

    #[tokio::test]
    async fn test_plan_with_chaining_and_aggregate() {
        let planner = planner_with_reply(
            r#"```json
            {"steps":[
              {"operation":"get_validators","params":{},
               "post":{"aggregate":{"kind":"top_n","field":"tokens","n":1,"direction":"desc"}}},
              {"operation":"get_validator_delegations",
               "params":{"validator_addr":{"from_step":1,"field":"operator_address"}},
               "post":{"aggregate":{"kind":"count"}}}
            ]}
            ```"#,
        );
        let plan = planner.plan("how many delegators does the top validator have", "en", &[]).await.unwrap();
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[1].dependencies(), vec![1]);
        match &plan.steps[1].params["validator_addr"] {
            ParamValue::Ref { from_step, field } => {
                assert_eq!(*from_step, 1);
                assert_eq!(field, "operator_address");
            }
            other => panic!("expected a step reference, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_plan_rejects_unknown_operation() {
        let planner =
            planner_with_reply(r#"{"steps":[{"operation":"get_blockz","params":{}}]}"#);
        let err = planner.plan("blocks", "en", &[]).await.unwrap_err();
        assert!(matches!(err, EngineError::PlanInvalid(_)));
        assert!(err.to_string().contains("get_blockz"));
    }

    #[tokio::test]
    async fn test_plan_rejects_garbage_reply() {
        let planner = planner_with_reply("I am sorry, I cannot help with that.");
        let err = planner.plan("hi", "en", &[]).await.unwrap_err();
        assert!(matches!(err, EngineError::Planning(_)));
    }

    #[test]
    fn test_validate_rejects_forward_reference() {
        let steps = vec![
            PlanStep {
                id: 1,
                operation: "get_validator".into(),
                params: BTreeMap::from([(
                    "validator_addr".into(),
                    ParamValue::Ref {
                        from_step: 2,
                        field: "operator_address".into(),
                    },
                )]),
                post: None,
            },
            PlanStep {
                id: 2,
                operation: "get_validators".into(),
                params: BTreeMap::new(),
                post: None,
            },
        ];
        let err = validate_steps(&registry(), &steps).unwrap_err();
        assert!(err.to_string().contains("not an earlier step"));
    }

    #[test]
    fn test_validate_rejects_missing_required_param() {
        let steps = vec![PlanStep {
            id: 1,
            operation: "get_balances".into(),
            params: BTreeMap::new(),
            post: None,
        }];
        let err = validate_steps(&registry(), &steps).unwrap_err();
        assert!(err.to_string().contains("address"));
    }

    #[test]
    fn test_validate_rejects_unknown_param() {
        let steps = vec![PlanStep {
            id: 1,
            operation: "get_validators".into(),
            params: BTreeMap::from([(
                "colour".into(),
                ParamValue::Literal(serde_json::json!("red")),
            )]),
            post: None,
        }];
        let err = validate_steps(&registry(), &steps).unwrap_err();
        assert!(err.to_string().contains("colour"));
    }

    #[test]
    fn test_validate_accepts_stringly_numeric_literal() {
        let steps = vec![PlanStep {
            id: 1,
            operation: "get_block".into(),
            params: BTreeMap::from([(
                "height".into(),
                ParamValue::Literal(serde_json::json!("1234567")),
            )]),
            post: None,
        }];
        validate_steps(&registry(), &steps).unwrap();
    }

    #[test]
    fn test_validate_rejects_empty_plan() {
        assert!(validate_steps(&registry(), &[]).is_err());
    }

    #[test]
    fn test_param_value_untagged_deserialization() {
        let v: ParamValue = serde_json::from_str(r#"{"from_step":1,"field":"a.b"}"#).unwrap();
        assert!(matches!(v, ParamValue::Ref { .. }));
        let v: ParamValue = serde_json::from_str(r#""celestia1abc""#).unwrap();
        assert!(matches!(v, ParamValue::Literal(_)));
    }
}
