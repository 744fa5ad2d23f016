//! Planner (§4.6): turns a mission statement into a persisted Plan.
//!
//! Grounded on `orca::pattern`'s agent-pattern prompt-assembly idiom (a fixed
//! system preamble plus structured context fields) and on the teacher's own
//! planning call shape — `model=fast`, `temperature=0`, strict JSON response —
//! reused verbatim here since spec §4.6 specifies exactly that combination.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::llm::{ChatClient, ChatRequest, Message, ModelAlias};
use crate::plan::{Plan, PlanStore, Step};
use crate::tools::ToolRegistry;

/// Raw shape the planning call is asked to return (§4.6: `items[]`,
/// `open_questions[]`, `notes`).
#[derive(Debug, Deserialize)]
struct PlanJson {
    items: Vec<PlanItemJson>,
    #[serde(default)]
    open_questions: Vec<String>,
    #[serde(default)]
    notes: String,
}

#[derive(Debug, Deserialize)]
struct PlanItemJson {
    description: String,
    acceptance_criteria: String,
    #[serde(default)]
    dependencies: Vec<u32>,
    #[serde(default)]
    chosen_tool: Option<String>,
    #[serde(default)]
    tool_input: Option<Value>,
}

pub struct Planner<'a> {
    llm: &'a dyn ChatClient,
    store: &'a dyn PlanStore,
    tools: &'a ToolRegistry,
}

impl<'a> Planner<'a> {
    pub fn new(llm: &'a dyn ChatClient, store: &'a dyn PlanStore, tools: &'a ToolRegistry) -> Self {
        Self { llm, store, tools }
    }

    /// Produce and persist a Plan for `mission`, given any answers already on
    /// file from a prior `ask_user` round (§4.6: "prior answers").
    pub async fn plan(&self, mission: &str, prior_answers: &[(String, String)]) -> Result<Plan> {
        let prompt = self.build_prompt(mission, prior_answers);
        let request = ChatRequest::new(
            vec![Message::system(SYSTEM_PROMPT), Message::user(prompt)],
            ModelAlias::Fast,
        )
        .with_response_format("json_object")
        .with_temperature(0.0);

        let response = self.llm.chat(request).await?;
        let raw = response
            .parsed
            .unwrap_or_else(|| Value::String(response.content.clone()));
        let parsed: PlanJson = serde_json::from_value(raw)
            .map_err(|e| EngineError::InvalidJson(format!("planner response: {e}")))?;

        if parsed.items.is_empty() {
            return Err(EngineError::InvalidJson("planner returned no items".into()));
        }

        let steps = parsed
            .items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                let mut step = Step::new(i as u32 + 1, item.description, item.acceptance_criteria);
                step.dependencies = item.dependencies.into_iter().collect();
                step.chosen_tool = item.chosen_tool;
                step.tool_input = item.tool_input;
                step
            })
            .collect();

        let mut plan = Plan::new(steps);
        plan.open_questions = parsed.open_questions;
        plan.notes = parsed.notes;
        plan.validate().map_err(EngineError::InvalidMutation)?;

        self.store.create(&plan).await?;
        Ok(plan)
    }

    fn build_prompt(&self, mission: &str, prior_answers: &[(String, String)]) -> String {
        let tools_desc = serde_json::to_string_pretty(&self.tools.describe_all())
            .unwrap_or_else(|_| "[]".to_string());
        let answers = if prior_answers.is_empty() {
            "(none)".to_string()
        } else {
            prior_answers
                .iter()
                .map(|(k, v)| format!("- {k}: {v}"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        format!(
            "Mission:\n{mission}\n\nAvailable tools:\n{tools_desc}\n\nPrior answers:\n{answers}\n\n\
             Respond with a JSON object: {{\"items\": [{{\"description\": ..., \
             \"acceptance_criteria\": ..., \"dependencies\": [..], \"chosen_tool\": ..., \
             \"tool_input\": ..}}], \"open_questions\": [..], \"notes\": \"...\"}}."
        )
    }
}

const SYSTEM_PROMPT: &str = "You turn a mission into an ordered list of actionable steps. \
Every step must name what tool (if any) satisfies it and what acceptance criteria mark it done. \
Respond only with the requested JSON object.";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::FakeLlmClient;
    use crate::plan::InMemoryPlanStore;

    #[tokio::test]
    async fn plan_builds_steps_from_llm_response() {
        let llm = FakeLlmClient::new();
        llm.push_json(serde_json::json!({
            "items": [
                {"description": "write greeting", "acceptance_criteria": "file exists",
                 "chosen_tool": "file_write", "tool_input": {"path": "hi.txt", "content": "hi"}}
            ],
            "open_questions": [],
            "notes": "straightforward"
        }));
        let store = InMemoryPlanStore::new();
        let tools = ToolRegistry::builder().build();
        let planner = Planner::new(&llm, &store, &tools);

        let plan = planner.plan("say hello", &[]).await.unwrap();
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].chosen_tool.as_deref(), Some("file_write"));
        assert!(store.load(&plan.id).await.is_ok());
    }

    #[tokio::test]
    async fn plan_rejects_empty_items() {
        let llm = FakeLlmClient::new();
        llm.push_json(serde_json::json!({"items": []}));
        let store = InMemoryPlanStore::new();
        let tools = ToolRegistry::builder().build();
        let planner = Planner::new(&llm, &store, &tools);

        let result = planner.plan("do nothing", &[]).await;
        assert!(matches!(result, Err(EngineError::InvalidJson(_))));
    }

    #[tokio::test]
    async fn plan_rejects_cyclic_dependencies() {
        let llm = FakeLlmClient::new();
        llm.push_json(serde_json::json!({
            "items": [
                {"description": "a", "acceptance_criteria": "a done", "dependencies": [2]},
                {"description": "b", "acceptance_criteria": "b done", "dependencies": [1]}
            ]
        }));
        let store = InMemoryPlanStore::new();
        let tools = ToolRegistry::builder().build();
        let planner = Planner::new(&llm, &store, &tools);

        let result = planner.plan("cyclic mission", &[]).await;
        assert!(matches!(result, Err(EngineError::InvalidMutation(_))));
    }
}
