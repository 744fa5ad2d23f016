//! Scheduler (§4.8): the ReAct loop itself. Reason about the current
//! actionable step, act (call a tool, ask the user, finish, replan, or
//! complete the mission), observe, repeat.
//!
//! Grounded on `orca::executor::task_executor`'s execute-one-task shape, but
//! the loop is hand-built here rather than delegated to
//! `langgraph_prebuilt::agents::create_react_agent` — spec §4.8 requires the
//! ReAct loop to be core engine logic, not a call into an external graph
//! framework.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::events::{Event, EventKind, EventLog};
use crate::llm::{ChatClient, ChatRequest, Message, ModelAlias};
use crate::plan::{Plan, PlanStore, Step, StepStatus};
use crate::planner::Planner;
use crate::replanner::{ReplanOutcome, Replanner};
use crate::state::{ApprovalDecision, ApprovalRecord, PendingQuestion, RiskLevel, SessionState, StateStore};
use crate::tools::ToolRegistry;

/// Guards against a runaway loop that never converges (§3, §8 scenario 6).
pub const MAX_ITERATIONS: u32 = 50;

const APPROVAL_PREFIX: &str = "approval:";

/// What the caller is handing the scheduler this call: a brand new mission, or
/// an answer to a question the loop previously paused on (§4.8's ask_user /
/// resume pair, §8 scenario 2).
#[derive(Debug, Clone)]
pub enum Input {
    Mission(String),
    Answer(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Completed,
    Paused,
    Failed,
}

#[derive(Debug)]
pub struct ExecutionResult {
    pub session_id: String,
    pub status: ExitStatus,
    pub reason: Option<String>,
    pub events: Vec<Event>,
    pub final_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ThoughtJson {
    #[serde(default)]
    thought: String,
    action: ActionJson,
}

#[derive(Debug, Deserialize)]
struct ActionJson {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    tool: Option<String>,
    #[serde(default)]
    tool_input: Option<Value>,
    #[serde(default)]
    question: Option<String>,
    #[serde(default)]
    answer_key: Option<String>,
    #[serde(default)]
    message: Option<Value>,
}

pub struct Scheduler<'a> {
    llm: &'a dyn ChatClient,
    plan_store: &'a dyn PlanStore,
    state_store: &'a dyn StateStore,
    tools: &'a ToolRegistry,
}

impl<'a> Scheduler<'a> {
    pub fn new(
        llm: &'a dyn ChatClient,
        plan_store: &'a dyn PlanStore,
        state_store: &'a dyn StateStore,
        tools: &'a ToolRegistry,
    ) -> Self {
        Self {
            llm,
            plan_store,
            state_store,
            tools,
        }
    }

    pub async fn execute(&self, session_id: &str, input: Input) -> Result<ExecutionResult> {
        let mut state = self.state_store.load(session_id).await?;
        let mut log = EventLog::new();

        let plan_id = self.bind_plan(session_id, &mut state, input, &mut log).await?;
        let plan_id = match plan_id {
            Some(id) => id,
            None => return Ok(self.pack(session_id, ExitStatus::Paused, None, log, None)),
        };

        self.state_store.save(session_id, state.clone()).await?;

        let mut iterations = 0u32;
        loop {
            iterations += 1;
            if iterations > MAX_ITERATIONS {
                log.push(
                    EventKind::Error,
                    session_id,
                    serde_json::json!({"reason": "max_iterations"}),
                );
                return Ok(self.pack(
                    session_id,
                    ExitStatus::Failed,
                    Some("max_iterations".into()),
                    log,
                    Some("execution stopped: maximum iterations reached without completing the plan".into()),
                ));
            }

            let mut plan = self.plan_store.load(&plan_id).await?;
            if plan.is_complete() {
                log.push(EventKind::Complete, session_id, serde_json::json!({}));
                let final_message = final_message_from_plan(&plan);
                return Ok(self.pack(session_id, ExitStatus::Completed, None, log, Some(final_message)));
            }

            let position = match plan.next_actionable() {
                Some(p) => p,
                None => {
                    log.push(
                        EventKind::Error,
                        session_id,
                        serde_json::json!({"reason": "incomplete"}),
                    );
                    return Ok(self.pack(session_id, ExitStatus::Failed, Some("incomplete".into()), log, None));
                }
            };

            let thought = self.think(&plan, position).await?;
            log.push(
                EventKind::Thought,
                session_id,
                serde_json::json!({"step": position, "thought": thought.thought}),
            );

            match thought.action.kind.as_str() {
                "tool_call" => {
                    let step = plan.step(position).unwrap().clone();
                    let tool_name = thought.action.tool.clone().or(step.chosen_tool.clone());
                    let tool_name = match tool_name {
                        Some(t) => t,
                        None => {
                            log.push(
                                EventKind::Error,
                                session_id,
                                serde_json::json!({"step": position, "reason": "no tool chosen"}),
                            );
                            continue;
                        }
                    };
                    let tool_input = thought
                        .action
                        .tool_input
                        .clone()
                        .or(step.tool_input.clone())
                        .unwrap_or(Value::Null);

                    if self.needs_approval(&state, &tool_name) {
                        self.pause_for_approval(session_id, &mut state, position, &tool_name, &tool_input, &mut log)
                            .await?;
                        return Ok(self.pack(session_id, ExitStatus::Paused, None, log, None));
                    }

                    self.run_tool(&plan_id, &mut plan, position, &tool_name, tool_input, session_id, &mut log)
                        .await?;

                    self.maybe_replan(&plan_id, position, session_id, &mut log).await?;
                }
                "finish_step" => {
                    let mut plan = self.plan_store.load(&plan_id).await?;
                    if let Some(step) = plan.step_mut(position) {
                        step.status = StepStatus::Completed;
                    }
                    self.plan_store.update(&plan).await?;
                    log.push(
                        EventKind::StateUpdated,
                        session_id,
                        serde_json::json!({"step": position, "status": "COMPLETED"}),
                    );
                }
                "ask_user" => {
                    let answer_key = thought
                        .action
                        .answer_key
                        .unwrap_or_else(|| format!("step_{position}"));
                    let question = thought
                        .action
                        .question
                        .unwrap_or_else(|| "additional input needed".to_string());
                    state.pending_question = Some(PendingQuestion {
                        answer_key,
                        question: question.clone(),
                        for_step: Some(position),
                    });
                    self.state_store.save(session_id, state.clone()).await?;
                    log.push(
                        EventKind::AskUser,
                        session_id,
                        serde_json::json!({"step": position, "question": question}),
                    );
                    return Ok(self.pack(session_id, ExitStatus::Paused, None, log, None));
                }
                "replan" => {
                    self.replan_current(&plan_id, position, session_id, &mut log).await?;
                }
                "complete" => {
                    let mut plan = self.plan_store.load(&plan_id).await?;
                    if let Some(step) = plan.step_mut(position) {
                        step.status = StepStatus::Completed;
                    }
                    self.plan_store.update(&plan).await?;
                    self.skip_remaining(&plan_id).await?;

                    let plan = self.plan_store.load(&plan_id).await?;
                    let final_message = thought
                        .action
                        .message
                        .as_ref()
                        .and_then(extract_final_message)
                        .unwrap_or_else(|| final_message_from_plan(&plan));
                    log.push(EventKind::Complete, session_id, serde_json::json!({}));
                    return Ok(ExecutionResult {
                        session_id: session_id.to_string(),
                        status: ExitStatus::Completed,
                        reason: None,
                        events: log.into_events(),
                        final_message: Some(final_message),
                    });
                }
                other => {
                    log.push(
                        EventKind::Error,
                        session_id,
                        serde_json::json!({"reason": format!("unknown action type: {other}")}),
                    );
                }
            }
        }
    }

    /// Resolve which plan this call continues, or bind a freshly planned one.
    /// Returns `None` if the caller's input could not be applied (the result
    /// has already been packed as a Paused outcome in that case — none of the
    /// current branches take that path, but the signature leaves room for one
    /// without the caller needing to change).
    async fn bind_plan(
        &self,
        session_id: &str,
        state: &mut SessionState,
        input: Input,
        log: &mut EventLog,
    ) -> Result<Option<String>> {
        match (input, state.pending_question.take()) {
            (Input::Answer(answer), Some(pending)) => {
                if let Some(decision) = parse_approval_decision(&pending.answer_key, &answer) {
                    self.apply_approval_decision(state, &pending, decision).await?;
                } else {
                    state.answers.insert(pending.answer_key.clone(), answer);
                }
                log.push(
                    EventKind::StateUpdated,
                    session_id,
                    serde_json::json!({"answered": pending.answer_key}),
                );
                Ok(state.todolist_id.clone())
            }
            (Input::Answer(_), None) => Err(EngineError::Other(
                "no pending question to answer for this session".into(),
            )),
            (Input::Mission(_), Some(pending)) => {
                state.pending_question = Some(pending);
                Err(EngineError::Other(
                    "session has a pending question; submit Input::Answer instead".into(),
                ))
            }
            (Input::Mission(mission), None) if state.todolist_id.is_none() => {
                let prior_answers: Vec<(String, String)> =
                    state.answers.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                let planner = Planner::new(self.llm, self.plan_store, self.tools);
                let plan = planner.plan(&mission, &prior_answers).await?;
                state.todolist_id = Some(plan.id.clone());
                Ok(state.todolist_id.clone())
            }
            (Input::Mission(_), None) => Ok(state.todolist_id.clone()),
        }
    }

    fn needs_approval(&self, state: &SessionState, tool_name: &str) -> bool {
        let requires = self.tools.get(tool_name).map(|t| t.requires_approval()).unwrap_or(false);
        requires && !crate::state::has_standing_approval(state, tool_name)
    }

    async fn pause_for_approval(
        &self,
        session_id: &str,
        state: &mut SessionState,
        position: u32,
        tool_name: &str,
        tool_input: &Value,
        log: &mut EventLog,
    ) -> Result<()> {
        let preview = self
            .tools
            .get(tool_name)
            .and_then(|t| t.approval_preview(tool_input))
            .unwrap_or_else(|| format!("run tool '{tool_name}'"));
        state.pending_question = Some(PendingQuestion {
            answer_key: format!("{APPROVAL_PREFIX}{tool_name}"),
            question: format!("approve this action? {preview}"),
            for_step: Some(position),
        });
        self.state_store.save(session_id, state.clone()).await?;
        log.push(
            EventKind::AskUser,
            session_id,
            serde_json::json!({"step": position, "tool": tool_name, "approval_required": true}),
        );
        Ok(())
    }

    /// Record the decision, and — for a denial — fail the step directly rather
    /// than let it re-enter the normal retry budget (§4.8: a user's explicit
    /// denial is not a transient failure worth retrying blindly).
    async fn apply_approval_decision(
        &self,
        state: &mut SessionState,
        pending: &PendingQuestion,
        decision: ApprovalDecision,
    ) -> Result<()> {
        let tool_name = pending
            .answer_key
            .strip_prefix(APPROVAL_PREFIX)
            .unwrap_or(&pending.answer_key)
            .to_string();
        let risk = self
            .tools
            .get(&tool_name)
            .map(|t| t.approval_risk_level())
            .unwrap_or(RiskLevel::Medium);
        if matches!(decision, ApprovalDecision::Trusted) {
            state.approval_cache.insert(tool_name.clone(), true);
        }
        let denied = matches!(decision, ApprovalDecision::Denied);
        state.approval_history.push(ApprovalRecord {
            timestamp: chrono::Utc::now().to_rfc3339(),
            tool: tool_name,
            step: pending.for_step.unwrap_or(0),
            risk,
            decision,
            policy: None,
        });

        if denied {
            if let (Some(plan_id), Some(position)) = (state.todolist_id.clone(), pending.for_step) {
                let mut plan = self.plan_store.load(&plan_id).await?;
                if let Some(step) = plan.step_mut(position) {
                    step.status = StepStatus::Failed;
                    step.execution_history.push(crate::plan::AttemptSummary {
                        tool: step.chosen_tool.clone().unwrap_or_default(),
                        success: false,
                        error: Some("approval denied".to_string()),
                        attempt: step.attempts + 1,
                    });
                    step.attempts += 1;
                }
                self.plan_store.update(&plan).await?;
            }
        }
        Ok(())
    }

    async fn run_tool(
        &self,
        plan_id: &str,
        plan: &mut Plan,
        position: u32,
        tool_name: &str,
        tool_input: Value,
        session_id: &str,
        log: &mut EventLog,
    ) -> Result<()> {
        log.push(
            EventKind::ToolStarted,
            session_id,
            serde_json::json!({"step": position, "tool": tool_name, "input": tool_input}),
        );
        let result = self.tools.execute(tool_name, tool_input).await;
        let result_value = match result {
            Ok(tool_result) => tool_result.to_value(),
            Err(EngineError::UnknownTool(name)) => {
                serde_json::json!({"success": false, "error": format!("unknown tool: {name}")})
            }
            Err(err) => serde_json::json!({"success": false, "error": err.to_string()}),
        };
        log.push(
            EventKind::ToolResult,
            session_id,
            serde_json::json!({"step": position, "result": result_value}),
        );

        if let Some(step) = plan.step_mut(position) {
            step.record_attempt(tool_name, &result_value);
        }
        self.plan_store.update(plan).await?;
        Ok(())
    }

    /// If the step at `position` just went FAILED, hand it to the replanner.
    async fn maybe_replan(&self, plan_id: &str, position: u32, session_id: &str, log: &mut EventLog) -> Result<()> {
        let plan = self.plan_store.load(plan_id).await?;
        let Some(step) = plan.step(position) else { return Ok(()) };
        if step.status != StepStatus::Failed {
            return Ok(());
        }
        let replanner = Replanner::new(self.llm, self.tools);
        let outcome = replanner.replan(self.plan_store, plan_id, position).await?;
        let summary = match outcome {
            ReplanOutcome::Applied(info) => format!("{info:?}"),
            ReplanOutcome::SkippedLowConfidence => "skipped (low confidence)".to_string(),
        };
        log.push(
            EventKind::StateUpdated,
            session_id,
            serde_json::json!({"step": position, "replan": summary}),
        );
        Ok(())
    }

    /// Explicit `replan` thought (§4.8): always invoke the Replanner for the
    /// current step regardless of its status — unlike `maybe_replan`, which
    /// only fires automatically once a step has gone FAILED. On a Replanner
    /// error, fall back to marking the step SKIPPED rather than leaving it
    /// untouched or failing the whole run.
    async fn replan_current(&self, plan_id: &str, position: u32, session_id: &str, log: &mut EventLog) -> Result<()> {
        let replanner = Replanner::new(self.llm, self.tools);
        match replanner.replan(self.plan_store, plan_id, position).await {
            Ok(outcome) => {
                let summary = match outcome {
                    ReplanOutcome::Applied(info) => format!("{info:?}"),
                    ReplanOutcome::SkippedLowConfidence => "skipped (low confidence)".to_string(),
                };
                log.push(
                    EventKind::StateUpdated,
                    session_id,
                    serde_json::json!({"step": position, "replan": summary}),
                );
            }
            Err(err) => {
                crate::plan::mutator::mark_skipped(self.plan_store, plan_id, position).await?;
                log.push(
                    EventKind::StateUpdated,
                    session_id,
                    serde_json::json!({"step": position, "replan": "skipped (error)", "error": err.to_string()}),
                );
            }
        }
        Ok(())
    }

    async fn skip_remaining(&self, plan_id: &str) -> Result<()> {
        let mut plan = self.plan_store.load(plan_id).await?;
        for step in &mut plan.steps {
            if step.status == StepStatus::Pending {
                step.status = StepStatus::Skipped;
            }
        }
        self.plan_store.update(&plan).await
    }

    async fn think(&self, plan: &Plan, position: u32) -> Result<ThoughtJson> {
        let step = plan.step(position).unwrap();
        let prompt = self.build_thought_prompt(plan, step);
        let request = ChatRequest::new(
            vec![Message::system(THOUGHT_SYSTEM_PROMPT), Message::user(prompt)],
            ModelAlias::Main,
        )
        .with_response_format("json_object")
        .with_temperature(0.0);

        let response = self.llm.chat(request).await?;
        let raw = response
            .parsed
            .unwrap_or_else(|| Value::String(response.content.clone()));
        serde_json::from_value(raw).map_err(|e| EngineError::InvalidJson(format!("thought response: {e}")))
    }

    fn build_thought_prompt(&self, plan: &Plan, step: &Step) -> String {
        let last_failure = step
            .execution_history
            .iter()
            .rev()
            .find(|a| !a.success)
            .map(|a| a.error.clone().unwrap_or_default())
            .unwrap_or_default();
        let recent_history: Vec<_> = step.execution_history.iter().rev().take(5).collect();
        let tools_desc = serde_json::to_string_pretty(&self.tools.describe_all()).unwrap_or_default();

        format!(
            "Mission notes: {}\n\nCurrent step #{}: {}\nAcceptance criteria: {}\nLast failure: {}\n\
             Recent attempts: {:?}\n\nAvailable tools:\n{tools_desc}\n\n\
             Respond as JSON: {{\"thought\": \"...\", \"action\": {{\"type\": \
             \"tool_call\"|\"ask_user\"|\"complete\"|\"replan\"|\"finish_step\", \"tool\": ..., \
             \"tool_input\": ..., \"question\": ..., \"answer_key\": ..., \"message\": ...}}}}.",
            plan.notes, step.position, step.description, step.acceptance_criteria, last_failure, recent_history
        )
    }

    fn pack(
        &self,
        session_id: &str,
        status: ExitStatus,
        reason: Option<String>,
        log: EventLog,
        final_message: Option<String>,
    ) -> ExecutionResult {
        ExecutionResult {
            session_id: session_id.to_string(),
            status,
            reason,
            events: log.into_events(),
            final_message,
        }
    }
}

const THOUGHT_SYSTEM_PROMPT: &str = "You drive one step of a task loop at a time. Look at the \
current step and its history, then choose exactly one action. Prefer tool_call when a tool can \
make progress, finish_step when the step's acceptance criteria are already satisfied, ask_user \
when you are missing information only a person can supply, replan when the step needs to change \
shape, and complete only when the whole mission is done.";

/// §4.8 step 4: on loop exit, walk completed steps in reverse position order
/// and pull the first non-empty textual field out of a step's
/// `execution_result`, falling back to a generic success message.
fn final_message_from_plan(plan: &Plan) -> String {
    let mut completed: Vec<&Step> = plan
        .steps
        .iter()
        .filter(|s| s.status == StepStatus::Completed)
        .collect();
    completed.sort_by_key(|s| s.position);
    completed
        .into_iter()
        .rev()
        .find_map(|s| s.execution_result.as_ref().and_then(extract_final_message))
        .unwrap_or_else(|| "mission completed successfully".to_string())
}

/// Walk the common shapes a tool/LLM result places its user-facing text under
/// (§4.8: `generated_text`/`response`/`content`/`result`/`data.*`).
fn extract_final_message(value: &Value) -> Option<String> {
    if let Value::String(s) = value {
        return Some(s.clone());
    }
    for key in ["generated_text", "response", "content", "result"] {
        if let Some(Value::String(s)) = value.get(key) {
            return Some(s.clone());
        }
    }
    if let Some(data) = value.get("data") {
        return extract_final_message(data);
    }
    None
}

fn parse_approval_decision(answer_key: &str, answer: &str) -> Option<ApprovalDecision> {
    if !answer_key.starts_with(APPROVAL_PREFIX) {
        return None;
    }
    match answer.to_ascii_lowercase().as_str() {
        "approved" | "approve" | "yes" => Some(ApprovalDecision::Approved),
        "denied" | "deny" | "no" => Some(ApprovalDecision::Denied),
        "trusted" | "trust" => Some(ApprovalDecision::Trusted),
        _ => Some(ApprovalDecision::Denied),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::FakeLlmClient;
    use crate::plan::InMemoryPlanStore;
    use crate::state::InMemoryStateStore;
    use crate::tools::builtin::{FileWriteTool, ShellTool};
    use std::sync::Arc;

    fn registry() -> ToolRegistry {
        ToolRegistry::builder()
            .register(Arc::new(FileWriteTool::new()))
            .register(Arc::new(ShellTool::new()))
            .build()
    }

    #[tokio::test]
    async fn happy_path_completes_a_single_tool_step() {
        let llm = FakeLlmClient::new();
        llm.push_json(serde_json::json!({
            "items": [{"description": "write greeting", "acceptance_criteria": "file exists",
                       "chosen_tool": "file_write", "tool_input": {"path": "hi.txt", "content": "hi"}}]
        }));
        llm.push_json(serde_json::json!({
            "thought": "call the tool",
            "action": {"type": "tool_call"}
        }));
        llm.push_json(serde_json::json!({
            "thought": "acceptance criteria met",
            "action": {"type": "finish_step"}
        }));

        let plan_store = InMemoryPlanStore::new();
        let state_store = InMemoryStateStore::new();
        let tools = registry();
        let scheduler = Scheduler::new(&llm, &plan_store, &state_store, &tools);

        let result = scheduler
            .execute("s1", Input::Mission("say hello".into()))
            .await
            .unwrap();
        assert_eq!(result.status, ExitStatus::Completed);
        assert!(result.events.iter().any(|e| e.kind == EventKind::Complete));
        assert!(result.final_message.as_deref().is_some_and(|m| !m.is_empty()));
    }

    #[tokio::test]
    async fn ask_user_pauses_and_resume_continues() {
        let llm = FakeLlmClient::new();
        llm.push_json(serde_json::json!({
            "items": [{"description": "email someone", "acceptance_criteria": "email sent",
                       "chosen_tool": "shell"}]
        }));
        llm.push_json(serde_json::json!({
            "thought": "need recipient",
            "action": {"type": "ask_user", "question": "who should receive this?", "answer_key": "recipient"}
        }));

        let plan_store = InMemoryPlanStore::new();
        let state_store = InMemoryStateStore::new();
        let tools = registry();
        let scheduler = Scheduler::new(&llm, &plan_store, &state_store, &tools);

        let paused = scheduler
            .execute("s2", Input::Mission("email someone".into()))
            .await
            .unwrap();
        assert_eq!(paused.status, ExitStatus::Paused);

        llm.push_json(serde_json::json!({"thought": "proceed", "action": {"type": "finish_step"}}));
        let resumed = scheduler
            .execute("s2", Input::Answer("a@b.com".into()))
            .await
            .unwrap();
        assert_eq!(resumed.status, ExitStatus::Completed);
    }

    #[tokio::test]
    async fn approval_denied_fails_the_step() {
        let llm = FakeLlmClient::new();
        llm.push_json(serde_json::json!({
            "items": [{"description": "run command", "acceptance_criteria": "ran",
                       "chosen_tool": "shell", "tool_input": {"command": "rm -rf /tmp/x"}}]
        }));
        llm.push_json(serde_json::json!({"thought": "run it", "action": {"type": "tool_call"}}));

        let plan_store = InMemoryPlanStore::new();
        let state_store = InMemoryStateStore::new();
        let tools = registry();
        let scheduler = Scheduler::new(&llm, &plan_store, &state_store, &tools);

        let paused = scheduler
            .execute("s3", Input::Mission("clean up".into()))
            .await
            .unwrap();
        assert_eq!(paused.status, ExitStatus::Paused);

        let result = scheduler.execute("s3", Input::Answer("denied".into())).await.unwrap();
        assert_eq!(result.status, ExitStatus::Failed);
        assert_eq!(result.reason.as_deref(), Some("incomplete"));
    }

    #[tokio::test]
    async fn max_iterations_guard_trips() {
        let llm = FakeLlmClient::new();
        llm.push_json(serde_json::json!({
            "items": [{"description": "loop forever", "acceptance_criteria": "never",
                       "chosen_tool": "shell", "tool_input": {"command": "noop"}}]
        }));
        // An unrecognized action type just logs and loops again, without
        // consuming any further scripted LLM turns (unlike "replan", which now
        // always calls the Replanner and would exhaust the script early).
        for _ in 0..MAX_ITERATIONS + 1 {
            llm.push_json(serde_json::json!({"thought": "again", "action": {"type": "noop"}}));
        }

        let plan_store = InMemoryPlanStore::new();
        let state_store = InMemoryStateStore::new();
        let tools = registry();
        let scheduler = Scheduler::new(&llm, &plan_store, &state_store, &tools);

        // trust_mode sidesteps the approval pause so the loop actually spins.
        let mut state = state_store.load("s4").await.unwrap();
        state.trust_mode = true;
        state_store.save("s4", state).await.unwrap();

        let result = scheduler
            .execute("s4", Input::Mission("loop forever".into()))
            .await
            .unwrap();
        assert_eq!(result.status, ExitStatus::Failed);
        assert_eq!(result.reason.as_deref(), Some("max_iterations"));
        assert!(result
            .final_message
            .as_deref()
            .is_some_and(|m| m.contains("maximum iterations")));
    }
}
