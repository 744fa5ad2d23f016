//! Session state manager (§3 "Session state", §4.2 StateStore).
//!
//! Grounded on `orca::db::manager::DatabaseManager`'s lazy-init-directory pattern
//! and `orca::repositories::task_repository`'s raw-query CRUD, generalized from a
//! typed row to an opaque, round-trip-preserving JSON blob per session, plus
//! `orca::tools::permission_enforcer`'s approval-decision vocabulary
//! (`approved`/`denied`/`trusted`/`auto_approved`/`auto_denied`) for
//! `approval_history` entries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::sqlite::SqlitePool;
use tokio::sync::Mutex as AsyncMutex;

use crate::error::{EngineError, Result};

/// Risk tier a tool declares for its approval gate (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Outcome recorded for one approval-gate interaction (§6 persisted state shape).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approved,
    Denied,
    Trusted,
    AutoApproved,
    AutoDenied,
}

/// One append-only approval-history entry (§3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub timestamp: String,
    pub tool: String,
    pub step: u32,
    pub risk: RiskLevel,
    pub decision: ApprovalDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
}

/// The suspension record set while the loop is waiting on a user reply (§4.8,
/// §6: `pending_question: {answer_key, question, for_step}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingQuestion {
    pub answer_key: String,
    pub question: String,
    pub for_step: Option<u32>,
}

/// Session state (§3): a mapping from session id to bound plan, answers,
/// pending question, approval cache/trust-mode/history, version, and timestamp,
/// plus free extension fields collaborators may add. Reserved keys are typed
/// fields here; everything else round-trips through `extra` untouched, per
/// Design Note §9 ("Back-compat of persisted state").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub todolist_id: Option<String>,
    #[serde(default)]
    pub answers: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_question: Option<PendingQuestion>,
    #[serde(default)]
    pub approval_cache: HashMap<String, bool>,
    #[serde(default)]
    pub trust_mode: bool,
    #[serde(default)]
    pub approval_history: Vec<ApprovalRecord>,
    #[serde(rename = "_version", default)]
    pub version: u64,
    #[serde(rename = "_updated_at", default)]
    pub updated_at: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            todolist_id: None,
            answers: HashMap::new(),
            pending_question: None,
            approval_cache: HashMap::new(),
            trust_mode: false,
            approval_history: Vec::new(),
            version: 0,
            updated_at: String::new(),
            extra: Map::new(),
        }
    }
}

impl SessionState {
    fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now().to_rfc3339();
    }
}

/// StateStore (§4.2): `load`/`save`/`cleanup`, with per-session mutual exclusion
/// and a monotonic `_version` counter.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<SessionState>;
    async fn save(&self, session_id: &str, state: SessionState) -> Result<SessionState>;
    async fn cleanup(&self, older_than: chrono::Duration) -> Result<u64>;
}

/// Per-session lock table: one `tokio::sync::Mutex<()>` per session id, guarded
/// by a small `std::sync::Mutex` over the map itself, following the teacher's
/// preference for straightforward std/tokio primitives over a concurrent map
/// crate. Distinct sessions never contend with each other (§5: "concurrent calls
/// for distinct sessions may proceed in parallel").
#[derive(Default)]
struct LockTable {
    locks: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl LockTable {
    fn lock_for(&self, session_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

/// SQLite-backed StateStore. Each session's state is one JSON blob row; `save`
/// runs inside a transaction so SQLite enforces exclusivity across processes
/// while the in-process `LockTable` serializes same-session `save`s within this
/// process before they even reach the database.
pub struct SqlStateStore {
    pool: SqlitePool,
    locks: LockTable,
}

impl SqlStateStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            locks: LockTable::default(),
        }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                version INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for SqlStateStore {
    async fn load(&self, session_id: &str) -> Result<SessionState> {
        let row = sqlx::query_as::<_, (String,)>("SELECT data FROM sessions WHERE session_id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some((data,)) => Ok(serde_json::from_str(&data)?),
            None => Ok(SessionState::default()),
        }
    }

    async fn save(&self, session_id: &str, mut state: SessionState) -> Result<SessionState> {
        let lock = self.locks.lock_for(session_id);
        let _guard = lock.lock().await;

        state.touch();
        let data = serde_json::to_string(&state)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO sessions (session_id, data, version, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(session_id) DO UPDATE SET data = excluded.data, version = excluded.version, updated_at = excluded.updated_at",
        )
        .bind(session_id)
        .bind(&data)
        .bind(state.version as i64)
        .bind(&state.updated_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(state)
    }

    async fn cleanup(&self, older_than: chrono::Duration) -> Result<u64> {
        let cutoff = (Utc::now() - older_than).to_rfc3339();
        let result = sqlx::query("DELETE FROM sessions WHERE updated_at < ?")
            .bind(&cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// In-memory StateStore for tests that don't need a database.
#[derive(Default)]
pub struct InMemoryStateStore {
    states: StdMutex<HashMap<String, SessionState>>,
    locks: LockTable,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load(&self, session_id: &str) -> Result<SessionState> {
        Ok(self
            .states
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save(&self, session_id: &str, mut state: SessionState) -> Result<SessionState> {
        let lock = self.locks.lock_for(session_id);
        let _guard = lock.lock().await;
        state.touch();
        self.states
            .lock()
            .unwrap()
            .insert(session_id.to_string(), state.clone());
        Ok(state)
    }

    async fn cleanup(&self, _older_than: chrono::Duration) -> Result<u64> {
        Ok(0)
    }
}

/// Resolve whether a tool call may proceed without an approval prompt: trust
/// mode or a cached prior approval both suffice (§4.8 tool_call dispatch).
pub fn has_standing_approval(state: &SessionState, tool_name: &str) -> bool {
    state.trust_mode || state.approval_cache.get(tool_name).copied().unwrap_or(false)
}

/// A not-found plan/session lookup is reported through `EngineError::NotFound`
/// everywhere in this module; re-exported here only for doc clarity.
pub type StateError = EngineError;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_on_unknown_session_returns_empty_state() {
        let store = InMemoryStateStore::new();
        let state = store.load("unknown").await.unwrap();
        assert_eq!(state.version, 0);
        assert!(state.answers.is_empty());
    }

    #[tokio::test]
    async fn save_increments_version_by_exactly_one() {
        let store = InMemoryStateStore::new();
        let state = store.load("s1").await.unwrap();
        let saved = store.save("s1", state).await.unwrap();
        assert_eq!(saved.version, 1);
        let reloaded = store.load("s1").await.unwrap();
        assert_eq!(reloaded.version, 1);
        let saved_again = store.save("s1", reloaded).await.unwrap();
        assert_eq!(saved_again.version, 2);
    }

    #[tokio::test]
    async fn unknown_extra_keys_round_trip() {
        let mut state = SessionState::default();
        state
            .extra
            .insert("collaborator_field".into(), serde_json::json!("value"));
        let json = serde_json::to_string(&state).unwrap();
        let parsed: SessionState = serde_json::from_str(&json).unwrap();
        assert_eq!(
            parsed.extra.get("collaborator_field"),
            Some(&serde_json::json!("value"))
        );
    }

    #[tokio::test]
    async fn standing_approval_checks_trust_mode_and_cache() {
        let mut state = SessionState::default();
        assert!(!has_standing_approval(&state, "shell"));
        state.approval_cache.insert("shell".into(), true);
        assert!(has_standing_approval(&state, "shell"));

        let mut trusted = SessionState::default();
        trusted.trust_mode = true;
        assert!(has_standing_approval(&trusted, "anything"));
    }

    #[tokio::test]
    async fn sql_store_roundtrips_and_increments_version() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let store = SqlStateStore::new(pool);
        store.run_migrations().await.unwrap();

        let mut state = store.load("s1").await.unwrap();
        state.answers.insert("recipient".into(), "a@b.com".into());
        let saved = store.save("s1", state).await.unwrap();
        assert_eq!(saved.version, 1);

        let reloaded = store.load("s1").await.unwrap();
        assert_eq!(reloaded.answers.get("recipient"), Some(&"a@b.com".to_string()));
    }
}
