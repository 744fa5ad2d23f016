//! Replanner (§4.7): called when a step has exhausted its retry budget, and
//! decides how the plan should adapt.
//!
//! Grounded on the same LLM-call idiom as the Planner, but at `model=main`,
//! `temperature=0.1` (spec §4.7's parameters), with a `confidence` gate before
//! any mutation is applied — mirroring how `orca::executor::retry`'s caller
//! decides whether a failure is worth absorbing versus surfacing, generalized
//! from "retry the same call" to "restructure the plan".

use serde::Deserialize;
use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::llm::{ChatClient, ChatRequest, Message, ModelAlias};
use crate::plan::mutator::{mark_skipped, MutationInfo, NewStep, StepChanges};
use crate::plan::{Plan, PlanMutator, PlanStore, Step};
use crate::tools::ToolRegistry;

/// Minimum confidence the replanner's own judgment must clear before its
/// proposed strategy is applied (§4.7: "confidence >= 0.6").
pub const CONFIDENCE_THRESHOLD: f64 = 0.6;

#[derive(Debug, Deserialize)]
struct ReplanJson {
    strategy: String,
    confidence: f64,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    acceptance_criteria: Option<String>,
    #[serde(default)]
    chosen_tool: Option<String>,
    #[serde(default)]
    tool_input: Option<Value>,
    #[serde(default)]
    subtasks: Vec<SubtaskJson>,
}

#[derive(Debug, Deserialize)]
struct SubtaskJson {
    description: String,
    acceptance_criteria: String,
}

/// What the replanner decided to do, after applying it.
#[derive(Debug)]
pub enum ReplanOutcome {
    Applied(MutationInfo),
    /// Confidence fell below the threshold, or the model asked to give up on
    /// this step; it is marked SKIPPED and the loop proceeds (§4.7: "skip").
    SkippedLowConfidence,
}

pub struct Replanner<'a> {
    llm: &'a dyn ChatClient,
    tools: &'a ToolRegistry,
}

impl<'a> Replanner<'a> {
    pub fn new(llm: &'a dyn ChatClient, tools: &'a ToolRegistry) -> Self {
        Self { llm, tools }
    }

    /// Decide and apply a recovery strategy for the failed step at `position`
    /// in `plan_id` (§4.7: `retry_with_params`, `swap_tool`, `decompose_task`,
    /// `skip`).
    pub async fn replan(&self, store: &dyn PlanStore, plan_id: &str, position: u32) -> Result<ReplanOutcome> {
        let plan = store.load(plan_id).await?;
        let step = plan
            .step(position)
            .ok_or_else(|| EngineError::NotFound(format!("step {position} in plan {plan_id}")))?;

        let prompt = self.build_prompt(&plan, step);
        let request = ChatRequest::new(
            vec![Message::system(SYSTEM_PROMPT), Message::user(prompt)],
            ModelAlias::Main,
        )
        .with_response_format("json_object")
        .with_temperature(0.1);

        let response = self.llm.chat(request).await?;
        let raw = response
            .parsed
            .unwrap_or_else(|| Value::String(response.content.clone()));
        let parsed: ReplanJson = serde_json::from_value(raw)
            .map_err(|e| EngineError::InvalidJson(format!("replanner response: {e}")))?;

        if parsed.confidence < CONFIDENCE_THRESHOLD || parsed.strategy == "skip" {
            mark_skipped(store, plan_id, position).await?;
            return Ok(ReplanOutcome::SkippedLowConfidence);
        }

        let mutator = PlanMutator::new(store);
        let info = match parsed.strategy.as_str() {
            "retry_with_params" => {
                let changes = StepChanges {
                    tool_input: parsed.tool_input,
                    ..StepChanges::default()
                };
                mutator.modify_step(plan_id, position, changes).await?
            }
            "swap_tool" => {
                // §4.7 maps swap_tool to replace_step, not modify_step: the step
                // is recreated fresh at the same position with the new tool,
                // rather than patched in place.
                let new_step = NewStep {
                    description: parsed.description.unwrap_or_else(|| step.description.clone()),
                    acceptance_criteria: parsed
                        .acceptance_criteria
                        .unwrap_or_else(|| step.acceptance_criteria.clone()),
                    chosen_tool: parsed.chosen_tool,
                    tool_input: parsed.tool_input,
                };
                mutator.replace_step(plan_id, position, new_step).await?
            }
            "decompose_task" => {
                if parsed.subtasks.is_empty() {
                    return Err(EngineError::InvalidJson(
                        "decompose_task strategy requires subtasks".into(),
                    ));
                }
                let subtasks = parsed
                    .subtasks
                    .into_iter()
                    .map(|s| (s.description, s.acceptance_criteria))
                    .collect();
                mutator.decompose_step(plan_id, position, subtasks).await?
            }
            other => {
                return Err(EngineError::InvalidJson(format!("unknown replan strategy: {other}")));
            }
        };

        Ok(ReplanOutcome::Applied(info))
    }

    fn build_prompt(&self, plan: &Plan, step: &Step) -> String {
        let tools_desc = serde_json::to_string_pretty(&self.tools.describe_all())
            .unwrap_or_else(|_| "[]".to_string());
        let history = serde_json::to_string_pretty(&step.execution_history).unwrap_or_default();
        format!(
            "Plan notes: {}\n\nFailed step #{} ({}), acceptance criteria: {}\nLast chosen tool: {:?}\n\
             Execution history:\n{history}\n\nAvailable tools:\n{tools_desc}\n\n\
             Pick one strategy: retry_with_params, swap_tool, decompose_task, or skip. \
             Respond as JSON: {{\"strategy\": ..., \"confidence\": 0.0-1.0, \"description\": ..., \
             \"acceptance_criteria\": ..., \"chosen_tool\": ..., \"tool_input\": ..., \
             \"subtasks\": [{{\"description\": ..., \"acceptance_criteria\": ...}}]}}.",
            plan.notes, step.position, step.description, step.acceptance_criteria, step.chosen_tool
        )
    }
}

const SYSTEM_PROMPT: &str = "A plan step has exhausted its retry budget. Decide how the plan \
should adapt: retry with different parameters, swap to a different tool, break the step into \
smaller subtasks, or give up on it. State your confidence honestly; a low-confidence guess is \
worse than admitting the step should be skipped.";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::FakeLlmClient;
    use crate::plan::store::InMemoryPlanStore;
    use crate::plan::Step;

    async fn seeded_store_with_failed_step() -> (InMemoryPlanStore, String) {
        let store = InMemoryPlanStore::new();
        let mut step = Step::new(1, "send email", "email sent");
        step.max_attempts = 1;
        step.record_attempt("email", &serde_json::json!({"success": false, "error": "boom"}));
        let plan = Plan::new(vec![step]);
        let id = plan.id.clone();
        store.create(&plan).await.unwrap();
        (store, id)
    }

    #[tokio::test]
    async fn low_confidence_marks_step_skipped() {
        let (store, plan_id) = seeded_store_with_failed_step().await;
        let llm = FakeLlmClient::new();
        llm.push_json(serde_json::json!({"strategy": "retry_with_params", "confidence": 0.2}));
        let tools = ToolRegistry::builder().build();
        let replanner = Replanner::new(&llm, &tools);

        let outcome = replanner.replan(&store, &plan_id, 1).await.unwrap();
        assert!(matches!(outcome, ReplanOutcome::SkippedLowConfidence));
        let plan = store.load(&plan_id).await.unwrap();
        assert_eq!(plan.step(1).unwrap().status, crate::plan::StepStatus::Skipped);
    }

    #[tokio::test]
    async fn swap_tool_strategy_applies_mutation() {
        let (store, plan_id) = seeded_store_with_failed_step().await;
        let llm = FakeLlmClient::new();
        llm.push_json(serde_json::json!({
            "strategy": "swap_tool", "confidence": 0.9, "chosen_tool": "file_write"
        }));
        let tools = ToolRegistry::builder().build();
        let replanner = Replanner::new(&llm, &tools);

        let outcome = replanner.replan(&store, &plan_id, 1).await.unwrap();
        let new_position = match outcome {
            ReplanOutcome::Applied(MutationInfo::Replaced { new_position }) => new_position,
            other => panic!("expected Applied(Replaced), got {other:?}"),
        };
        let plan = store.load(&plan_id).await.unwrap();
        let replaced = plan.step(new_position).unwrap();
        assert_eq!(replaced.chosen_tool.as_deref(), Some("file_write"));
        assert_eq!(replaced.status, crate::plan::StepStatus::Pending);
    }

    #[tokio::test]
    async fn decompose_task_strategy_requires_subtasks() {
        let (store, plan_id) = seeded_store_with_failed_step().await;
        let llm = FakeLlmClient::new();
        llm.push_json(serde_json::json!({"strategy": "decompose_task", "confidence": 0.9}));
        let tools = ToolRegistry::builder().build();
        let replanner = Replanner::new(&llm, &tools);

        let result = replanner.replan(&store, &plan_id, 1).await;
        assert!(matches!(result, Err(EngineError::InvalidJson(_))));
    }
}
