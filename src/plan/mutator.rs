//! PlanMutator (§4.4) — structural edits to a Plan, each validated and applied
//! atomically against a `PlanStore`.
//!
//! Grounded on `orca::workflow`'s guarded-transition methods (e.g.
//! `cancel_task`'s "only pending/running tasks cancellable, else Err(...)") and on
//! the teacher's `task_repository.rs` load-mutate-save shape, generalized from a
//! single-field status guard to full structural surgery with dependency
//! revalidation.

use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::plan::{MAX_REPLAN_COUNT, Plan, PlanStore, Step, StepStatus};

/// Field-level changes `modify_step` may apply (§4.4: "any of description,
/// acceptance_criteria, dependencies, chosen_tool, tool_input").
#[derive(Debug, Default, Clone)]
pub struct StepChanges {
    pub description: Option<String>,
    pub acceptance_criteria: Option<String>,
    pub dependencies: Option<Vec<u32>>,
    pub chosen_tool: Option<String>,
    pub tool_input: Option<Value>,
}

/// Informational payload returned alongside `ok` from a mutation, per §4.4's
/// `(ok, info)` contract. The concrete shape varies by operation; callers match
/// on the variant they invoked.
#[derive(Debug, Clone)]
pub enum MutationInfo {
    Modified,
    Decomposed { new_positions: Vec<u32> },
    Replaced { new_position: u32 },
}

/// The step `replace_step` creates in place of the skipped original (§4.4
/// item 3). Unlike `modify_step`'s `StepChanges`, every field here starts the
/// new step fresh rather than patching the old one.
#[derive(Debug, Default, Clone)]
pub struct NewStep {
    pub description: String,
    pub acceptance_criteria: String,
    pub chosen_tool: Option<String>,
    pub tool_input: Option<Value>,
}

/// Applies the three mutation operations against a `PlanStore`, enforcing the
/// preconditions and post-mutation validation spec §4.4 requires.
pub struct PlanMutator<'a> {
    store: &'a dyn PlanStore,
}

impl<'a> PlanMutator<'a> {
    pub fn new(store: &'a dyn PlanStore) -> Self {
        Self { store }
    }

    /// modify_step(plan_id, position, changes) — §4.4 item 1.
    pub async fn modify_step(
        &self,
        plan_id: &str,
        position: u32,
        changes: StepChanges,
    ) -> Result<MutationInfo> {
        let mut plan = self.store.load(plan_id).await?;
        let step = plan
            .step_mut(position)
            .ok_or_else(|| EngineError::InvalidMutation(format!("no step at position {position}")))?;

        if step.replan_count >= MAX_REPLAN_COUNT {
            return Err(EngineError::InvalidMutation(format!(
                "step {position} has exhausted its replan budget ({MAX_REPLAN_COUNT})"
            )));
        }

        if let Some(d) = changes.description {
            step.description = d;
        }
        if let Some(ac) = changes.acceptance_criteria {
            step.acceptance_criteria = ac;
        }
        if let Some(deps) = changes.dependencies {
            step.dependencies = deps.into_iter().collect();
        }
        if let Some(tool) = changes.chosen_tool {
            step.chosen_tool = Some(tool);
        }
        if let Some(input) = changes.tool_input {
            step.tool_input = Some(input);
        }

        plan.validate()
            .map_err(|e| EngineError::InvalidMutation(format!("modify_step would violate invariants: {e}")))?;

        let step = plan.step_mut(position).unwrap();
        step.status = StepStatus::Pending;
        step.attempts = 0;
        step.replan_count += 1;

        self.store.update(&plan).await?;
        Ok(MutationInfo::Modified)
    }

    /// decompose_step(plan_id, position, subtasks) — §4.4 item 2.
    pub async fn decompose_step(
        &self,
        plan_id: &str,
        position: u32,
        subtasks: Vec<(String, String)>,
    ) -> Result<MutationInfo> {
        if subtasks.is_empty() {
            return Err(EngineError::InvalidMutation(
                "decompose_step requires at least one subtask".into(),
            ));
        }

        let mut plan = self.store.load(plan_id).await?;
        let original = plan
            .step(position)
            .ok_or_else(|| EngineError::InvalidMutation(format!("no step at position {position}")))?
            .clone();

        if original.replan_count >= MAX_REPLAN_COUNT {
            return Err(EngineError::InvalidMutation(format!(
                "step {position} has exhausted its replan budget ({MAX_REPLAN_COUNT})"
            )));
        }

        // Retarget anything that depended on `position` to the *last* new subtask
        // (§4.4: "any step that previously depended on the decomposed position
        // now depends on the last new subtask").
        let mut max_existing = plan.steps.iter().map(|s| s.position).max().unwrap_or(0);
        let mut new_positions = Vec::with_capacity(subtasks.len());
        let mut new_steps = Vec::with_capacity(subtasks.len());
        let mut previous: Option<u32> = None;
        for (description, acceptance_criteria) in subtasks {
            max_existing += 1;
            let pos = max_existing;
            let mut step = Step::new(pos, description, acceptance_criteria);
            if let Some(prev) = previous {
                step.dependencies.insert(prev);
            }
            previous = Some(pos);
            new_positions.push(pos);
            new_steps.push(step);
        }
        let last_new = *new_positions.last().unwrap();

        for step in &mut plan.steps {
            if step.dependencies.remove(&position) {
                step.dependencies.insert(last_new);
            }
        }

        if let Some(original_mut) = plan.step_mut(position) {
            original_mut.status = StepStatus::Skipped;
        }
        plan.steps.extend(new_steps);

        plan.renumber_dense();
        plan.validate()
            .map_err(|e| EngineError::InvalidMutation(format!("decompose_step would violate invariants: {e}")))?;

        if let Some(original_mut) = plan
            .steps
            .iter_mut()
            .find(|s| s.description == original.description && s.status == StepStatus::Skipped)
        {
            original_mut.replan_count += 1;
        }

        // Map old provisional positions to their post-renumber positions by
        // relative order: the new subtasks were appended last, so they occupy the
        // final `subtasks.len()` positions after dense renumbering.
        let final_new_positions: Vec<u32> = {
            let n = new_positions.len();
            let total = plan.steps.len() as u32;
            ((total - n as u32 + 1)..=total).collect()
        };

        self.store.update(&plan).await?;
        Ok(MutationInfo::Decomposed {
            new_positions: final_new_positions,
        })
    }

    /// replace_step(plan_id, position, new_step) — §4.4 item 3: marks the
    /// existing step SKIPPED and inserts the new step at the same numeric
    /// position, shifting the skipped original and everything after it down
    /// by one to preserve density.
    pub async fn replace_step(
        &self,
        plan_id: &str,
        position: u32,
        new_step: NewStep,
    ) -> Result<MutationInfo> {
        let mut plan = self.store.load(plan_id).await?;
        let original = plan
            .step(position)
            .ok_or_else(|| EngineError::InvalidMutation(format!("no step at position {position}")))?
            .clone();

        if original.replan_count >= MAX_REPLAN_COUNT {
            return Err(EngineError::InvalidMutation(format!(
                "step {position} has exhausted its replan budget ({MAX_REPLAN_COUNT})"
            )));
        }

        let temp_position = plan.steps.iter().map(|s| s.position).max().unwrap_or(0) + 1;
        let mut replacement = Step::new(temp_position, new_step.description, new_step.acceptance_criteria);
        replacement.chosen_tool = new_step.chosen_tool;
        replacement.tool_input = new_step.tool_input;

        for step in &mut plan.steps {
            if step.dependencies.remove(&position) {
                step.dependencies.insert(temp_position);
            }
        }

        if let Some(original_mut) = plan.step_mut(position) {
            original_mut.status = StepStatus::Skipped;
            original_mut.replan_count += 1;
        }

        let idx = plan
            .steps
            .iter()
            .position(|s| s.position == position)
            .unwrap();
        plan.steps.insert(idx, replacement);

        plan.renumber_dense();
        plan.validate()
            .map_err(|e| EngineError::InvalidMutation(format!("replace_step would violate invariants: {e}")))?;

        let final_new_position = plan.steps[idx].position;

        self.store.update(&plan).await?;
        Ok(MutationInfo::Replaced {
            new_position: final_new_position,
        })
    }
}

/// Direct, non-structural write used when the Scheduler marks a step `SKIPPED`
/// as a replan fallback (§4.7), bypassing the mutation preconditions since it is
/// not a structural edit.
pub async fn mark_skipped(store: &dyn PlanStore, plan_id: &str, position: u32) -> Result<()> {
    let mut plan = store.load(plan_id).await?;
    let step = plan
        .step_mut(position)
        .ok_or_else(|| EngineError::NotFound(format!("step {position} in plan {plan_id}")))?;
    step.status = StepStatus::Skipped;
    store.update(&plan).await
}
