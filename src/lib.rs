//! # engine
//!
//! A standalone LLM-driven task execution engine: a ReAct scheduler drives a
//! persisted Plan of Steps through tool calls, pausing for user answers or
//! tool approvals, and replanning when a step exhausts its retry budget.
//!
//! ## Architecture
//!
//! - [`plan`] — the Plan/Step data model and its mutator (modify/decompose/replace).
//! - [`state`] — per-session persisted state, the approval/suspension state machine.
//! - [`tools`] — the tool capability contract and registry.
//! - [`llm`] — the chat capability seam (`ChatClient`), retry policy, model aliasing.
//! - [`planner`] and [`replanner`] — turn a mission into a Plan, and recover a
//!   Plan when a step fails out.
//! - [`scheduler`] — the ReAct loop tying all of the above together.
//! - [`events`] — the typed, ordered event stream a single `execute` call emits.
//! - [`config`] — engine configuration (`engine.toml`, environment expansion).

pub mod config;
pub mod conversation;
pub mod error;
pub mod events;
pub mod llm;
pub mod plan;
pub mod planner;
pub mod replanner;
pub mod scheduler;
pub mod state;
pub mod tools;

pub use config::EngineConfig;
pub use conversation::ConversationLog;
pub use error::{EngineError, Result};
pub use events::{Event, EventKind, EventLog};
pub use llm::{ChatClient, ChatRequest, ChatResponse, FakeLlmClient, LlmError, Message, ModelAlias, RetryPolicy};
pub use plan::{FilePlanStore, InMemoryPlanStore, NewStep, Plan, PlanMutator, PlanStore, SqlPlanStore, Step, StepStatus};
pub use planner::Planner;
pub use replanner::{ReplanOutcome, Replanner};
pub use scheduler::{ExecutionResult, ExitStatus, Input, Scheduler, MAX_ITERATIONS};
pub use state::{ApprovalDecision, InMemoryStateStore, PendingQuestion, RiskLevel, SessionState, SqlStateStore, StateStore};
pub use tools::{Tool, ToolRegistry, ToolResult};
