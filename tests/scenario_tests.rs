//! End-to-end scenario tests (seed scenarios 3 and 4): a step that fails once
//! then succeeds on retry, and a step that exhausts its retry budget and is
//! automatically decomposed by the replanner.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use engine::plan::InMemoryPlanStore;
use engine::state::{InMemoryStateStore, RiskLevel};
use engine::tools::{Tool, ToolRegistry, ToolResult};
use engine::{ExitStatus, FakeLlmClient, Input, Scheduler};

/// Fails its first call, succeeds on every call after that.
struct FlakyTool {
    calls: AtomicU32,
}

impl FlakyTool {
    fn new() -> Self {
        Self { calls: AtomicU32::new(0) }
    }
}

#[async_trait]
impl Tool for FlakyTool {
    fn name(&self) -> &str {
        "flaky"
    }
    fn description(&self) -> &str {
        "fails once, then succeeds"
    }
    fn parameters_schema(&self) -> Value {
        serde_json::json!({"type": "object"})
    }
    fn requires_approval(&self) -> bool {
        false
    }
    fn approval_risk_level(&self) -> RiskLevel {
        RiskLevel::Low
    }
    async fn execute(&self, _args: Value) -> ToolResult {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == 0 {
            ToolResult::failure("transient failure")
        } else {
            ToolResult::ok(serde_json::Map::new())
        }
    }
}

/// Always fails, used to exhaust a step's retry budget.
struct AlwaysFailTool;

#[async_trait]
impl Tool for AlwaysFailTool {
    fn name(&self) -> &str {
        "always_fail"
    }
    fn description(&self) -> &str {
        "always fails"
    }
    fn parameters_schema(&self) -> Value {
        serde_json::json!({"type": "object"})
    }
    fn requires_approval(&self) -> bool {
        false
    }
    fn approval_risk_level(&self) -> RiskLevel {
        RiskLevel::Low
    }
    async fn execute(&self, _args: Value) -> ToolResult {
        ToolResult::failure("permanent failure")
    }
}

#[tokio::test]
async fn retry_then_succeed_keeps_step_pending_across_the_failed_attempt() {
    let llm = FakeLlmClient::new();
    llm.push_json(serde_json::json!({
        "items": [{"description": "call a flaky dependency", "acceptance_criteria": "call succeeds",
                   "chosen_tool": "flaky"}]
    }));
    // First tool_call: the tool fails, but attempts (1) < max_attempts (3), so
    // the step stays PENDING and the loop reasons about it again.
    llm.push_json(serde_json::json!({"thought": "try the flaky call", "action": {"type": "tool_call"}}));
    // Second tool_call: succeeds.
    llm.push_json(serde_json::json!({"thought": "retry the flaky call", "action": {"type": "tool_call"}}));
    llm.push_json(serde_json::json!({"thought": "done", "action": {"type": "finish_step"}}));

    let plan_store = InMemoryPlanStore::new();
    let state_store = InMemoryStateStore::new();
    let tools = ToolRegistry::builder().register(Arc::new(FlakyTool::new())).build();
    let scheduler = Scheduler::new(&llm, &plan_store, &state_store, &tools);

    let result = scheduler
        .execute("retry-scenario", Input::Mission("call flaky dependency".into()))
        .await
        .unwrap();

    assert_eq!(result.status, ExitStatus::Completed);
    assert!(result.final_message.as_deref().is_some_and(|m| !m.is_empty()));
}

#[tokio::test]
async fn step_exhausting_retries_is_automatically_decomposed() {
    let llm = FakeLlmClient::new();
    llm.push_json(serde_json::json!({
        "items": [{"description": "do something hard", "acceptance_criteria": "it works",
                   "chosen_tool": "always_fail"}]
    }));
    // Three tool_call thoughts, one per attempt, exhausting max_attempts (3).
    for _ in 0..3 {
        llm.push_json(serde_json::json!({"thought": "try again", "action": {"type": "tool_call"}}));
    }
    // After the third failure the step goes FAILED and maybe_replan calls the
    // replanner automatically; this is its scripted response.
    llm.push_json(serde_json::json!({
        "strategy": "decompose_task",
        "confidence": 0.9,
        "subtasks": [
            {"description": "smaller step one", "acceptance_criteria": "one done"},
            {"description": "smaller step two", "acceptance_criteria": "two done"}
        ]
    }));
    // The loop now reasons about the first new subtask and finishes it.
    llm.push_json(serde_json::json!({"thought": "subtask one looks satisfied", "action": {"type": "finish_step"}}));
    llm.push_json(serde_json::json!({"thought": "subtask two looks satisfied", "action": {"type": "finish_step"}}));

    let plan_store = InMemoryPlanStore::new();
    let state_store = InMemoryStateStore::new();
    let tools = ToolRegistry::builder().register(Arc::new(AlwaysFailTool)).build();
    let scheduler = Scheduler::new(&llm, &plan_store, &state_store, &tools);

    let result = scheduler
        .execute("decompose-scenario", Input::Mission("do something hard".into()))
        .await
        .unwrap();

    assert_eq!(result.status, ExitStatus::Completed);
    assert!(result
        .events
        .iter()
        .any(|e| e.data.get("replan").is_some()));
    assert!(result.final_message.as_deref().is_some_and(|m| !m.is_empty()));
}
