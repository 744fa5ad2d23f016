//! Plan model (§3) — the Todo plan data structure and its in-flight mutation
//! operations.
//!
//! Grounded on `orca::workflow`'s `Task`/`TaskStatus` idiom: a string-backed status
//! enum with `as_str()`/`Display`/`From<&str>`, plus lifecycle predicate methods on
//! the owning struct, generalized here to the richer Step/Plan shape §3 specifies.

pub mod mutator;
pub mod store;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use mutator::{NewStep, PlanMutator};
pub use store::{FilePlanStore, InMemoryPlanStore, PlanStore, SqlPlanStore};

/// Default retry budget for a freshly created step (§3: "cap (default 3)").
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Cap on structural mutations applied to a single step (§3, §8).
pub const MAX_REPLAN_COUNT: u32 = 2;

/// `{PENDING, IN_PROGRESS, COMPLETED, FAILED, SKIPPED}` per spec §3. `IN_PROGRESS`
/// is transient: it is set while a tool call is in flight and never durably
/// observed as a step's terminal state (a persisted Plan never has an
/// `IN_PROGRESS` step when `execute` is not itself running).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Skipped => "SKIPPED",
        }
    }

    /// A step counts towards plan completion once it reaches one of these (§3:
    /// "A plan is complete iff every step is COMPLETED or SKIPPED").
    pub fn is_terminal_for_plan_completion(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for StepStatus {
    fn from(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Self::Pending,
            "IN_PROGRESS" => Self::InProgress,
            "COMPLETED" => Self::Completed,
            "FAILED" => Self::Failed,
            "SKIPPED" => Self::Skipped,
            _ => Self::Pending,
        }
    }
}

/// One per-attempt summary recorded in a step's `execution_history` (§3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttemptSummary {
    pub tool: String,
    pub success: bool,
    pub error: Option<String>,
    pub attempt: u32,
}

/// One actionable unit of a Plan. All ten fields from spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub position: u32,
    pub description: String,
    pub acceptance_criteria: String,
    pub dependencies: HashSet<u32>,
    pub chosen_tool: Option<String>,
    pub tool_input: Option<serde_json::Value>,
    pub status: StepStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub execution_result: Option<serde_json::Value>,
    pub execution_history: Vec<AttemptSummary>,
    pub replan_count: u32,
}

impl Step {
    pub fn new(position: u32, description: impl Into<String>, acceptance_criteria: impl Into<String>) -> Self {
        Self {
            position,
            description: description.into(),
            acceptance_criteria: acceptance_criteria.into(),
            dependencies: HashSet::new(),
            chosen_tool: None,
            tool_input: None,
            status: StepStatus::Pending,
            attempts: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            execution_result: None,
            execution_history: Vec::new(),
            replan_count: 0,
        }
    }

    /// True iff pending and every dependency step is completed (§3: "actionable").
    pub fn is_actionable(&self, plan: &Plan) -> bool {
        if self.status != StepStatus::Pending {
            return false;
        }
        self.dependencies.iter().all(|dep| {
            plan.step(*dep)
                .map(|s| s.status == StepStatus::Completed)
                .unwrap_or(false)
        })
    }

    /// Record one tool-call observation: append to history, bump attempts, and
    /// apply the retry-vs-fail rule from §4.8 ("the step is left PENDING... until
    /// attempts >= max_attempts, at which point it becomes FAILED").
    pub fn record_attempt(&mut self, tool: &str, result: &serde_json::Value) {
        let success = result.get("success").and_then(|v| v.as_bool()).unwrap_or(false);
        let error = result.get("error").and_then(|v| v.as_str()).map(str::to_string);
        self.attempts += 1;
        self.execution_history.push(AttemptSummary {
            tool: tool.to_string(),
            success,
            error,
            attempt: self.attempts,
        });
        self.execution_result = Some(result.clone());
        self.status = if success {
            StepStatus::Pending
        } else if self.attempts >= self.max_attempts {
            StepStatus::Failed
        } else {
            StepStatus::Pending
        };
    }
}

/// An ordered set of Steps that collectively satisfy a mission. Identified by an
/// opaque id (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub steps: Vec<Step>,
    pub open_questions: Vec<String>,
    pub notes: String,
}

impl Plan {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            steps,
            open_questions: Vec::new(),
            notes: String::new(),
        }
    }

    pub fn step(&self, position: u32) -> Option<&Step> {
        self.steps.iter().find(|s| s.position == position)
    }

    pub fn step_mut(&mut self, position: u32) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.position == position)
    }

    /// §3: "A plan is complete iff every step is COMPLETED or SKIPPED."
    pub fn is_complete(&self) -> bool {
        self.steps
            .iter()
            .all(|s| s.status.is_terminal_for_plan_completion())
    }

    /// The next actionable step, selected by ascending position, per §4.8 step 3
    /// ("Select the next actionable step").
    pub fn next_actionable(&self) -> Option<u32> {
        self.steps
            .iter()
            .filter(|s| s.is_actionable(self))
            .map(|s| s.position)
            .min()
    }

    /// Every dependency position must exist, not equal the owning step, and the
    /// dependency graph must be acyclic (§3 invariants, §9 "Cycles in the plan
    /// graph" — DFS colouring).
    pub fn validate(&self) -> std::result::Result<(), String> {
        let positions: HashSet<u32> = self.steps.iter().map(|s| s.position).collect();
        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.position) {
                return Err(format!("duplicate position {}", step.position));
            }
            for dep in &step.dependencies {
                if *dep == step.position {
                    return Err(format!("step {} depends on itself", step.position));
                }
                if !positions.contains(dep) {
                    return Err(format!(
                        "step {} depends on missing position {}",
                        step.position, dep
                    ));
                }
            }
        }
        detect_cycle(&self.steps)
    }

    /// Renumber positions densely starting at 1, preserving relative order, and
    /// rewrite every dependency reference through the old->new position map.
    /// Used by `decompose_step`/`replace_step` after structural surgery (§4.4).
    pub(crate) fn renumber_dense(&mut self) {
        let mapping: HashMap<u32, u32> = self
            .steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.position, (i + 1) as u32))
            .collect();
        for step in &mut self.steps {
            step.position = mapping[&step.position];
            step.dependencies = step
                .dependencies
                .iter()
                .map(|d| mapping.get(d).copied().unwrap_or(*d))
                .collect();
        }
    }
}

#[derive(PartialEq, Eq, Clone, Copy)]
enum Colour {
    White,
    Gray,
    Black,
}

/// Standard DFS-colouring cycle detector over step positions (Design Note §9).
fn detect_cycle(steps: &[Step]) -> std::result::Result<(), String> {
    let mut colour: HashMap<u32, Colour> = steps.iter().map(|s| (s.position, Colour::White)).collect();
    let by_position: HashMap<u32, &Step> = steps.iter().map(|s| (s.position, s)).collect();

    fn visit(
        pos: u32,
        by_position: &HashMap<u32, &Step>,
        colour: &mut HashMap<u32, Colour>,
    ) -> std::result::Result<(), String> {
        colour.insert(pos, Colour::Gray);
        if let Some(step) = by_position.get(&pos) {
            for &dep in &step.dependencies {
                match colour.get(&dep).copied().unwrap_or(Colour::White) {
                    Colour::Gray => return Err(format!("dependency cycle through position {dep}")),
                    Colour::White => visit(dep, by_position, colour)?,
                    Colour::Black => {}
                }
            }
        }
        colour.insert(pos, Colour::Black);
        Ok(())
    }

    for &pos in by_position.keys() {
        if colour.get(&pos).copied() == Some(Colour::White) {
            visit(pos, &by_position, &mut colour)?;
        }
    }
    Ok(())
}
