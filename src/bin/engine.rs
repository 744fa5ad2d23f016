//! Minimal smoke-test binary: loads configuration, wires up a real SQLite-backed
//! plan/state pair and the builtin tools, and drives one `Scheduler::execute`
//! call against a mission string given on the command line.
//!
//! A real LLM provider is an external collaborator (spec §1); this binary uses
//! `FakeLlmClient` seeded with a single "finish immediately" response so the
//! loop is exercisable end to end without network access.

use std::env;

use engine::llm::FakeLlmClient;
use engine::tools::builtin::{FileWriteTool, ShellTool};
use engine::{EngineConfig, ExitStatus, Input, Scheduler, ToolRegistry};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = EngineConfig::load().await?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.level))
        .init();

    let mission = env::args().nth(1).unwrap_or_else(|| "say hello".to_string());
    let session_id = env::args().nth(2).unwrap_or_else(|| "session-1".to_string());

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect("sqlite::memory:")
        .await?;

    let plan_store = engine::plan::store::SqlPlanStore::new(pool.clone());
    plan_store.run_migrations().await?;
    let state_store = engine::state::SqlStateStore::new(pool);
    state_store.run_migrations().await?;

    let tools = ToolRegistry::builder()
        .register(Arc::new(FileWriteTool::new()))
        .register(Arc::new(ShellTool))
        .build();

    // Scripted so the smoke test terminates deterministically: plan the
    // mission as a single file_write step, then finish it.
    let llm = FakeLlmClient::new();
    llm.push_json(serde_json::json!({
        "items": [{
            "description": mission,
            "acceptance_criteria": "a file documenting the mission exists",
            "chosen_tool": "file_write",
            "tool_input": {"path": "mission.txt", "content": mission}
        }]
    }));
    llm.push_json(serde_json::json!({
        "thought": "tool ran successfully, step satisfies its acceptance criteria",
        "action": {"type": "finish_step"}
    }));

    let scheduler = Scheduler::new(&llm, &plan_store, &state_store, &tools);
    let result = scheduler.execute(&session_id, Input::Mission(mission)).await?;

    println!("status: {:?}", result.status);
    if let Some(reason) = &result.reason {
        println!("reason: {reason}");
    }
    if let Some(message) = &result.final_message {
        println!("final message: {message}");
    }
    for event in &result.events {
        println!("event: {} {}", event.kind.as_str(), event.data);
    }

    match result.status {
        ExitStatus::Failed => std::process::exit(1),
        _ => Ok(()),
    }
}
