//! PlanStore (§4.3) — CRUD for Plans keyed by plan id, with atomic per-plan writes.
//!
//! Two implementations are provided, both grounded on the teacher:
//! - `FilePlanStore` realizes spec's literal "write-then-rename" phrasing: the Plan
//!   is serialized to JSON, written to a sibling temp file, then `rename`d over the
//!   target — atomic on any POSIX filesystem within the same directory.
//! - `SqlPlanStore` follows `orca::repositories::task_repository`'s shape (raw
//!   `sqlx::query` + manual `row.get`, a single table keyed by id, an `UPDATE`
//!   guarded by a preceding existence check so `update()` on a missing id surfaces
//!   `NotFound` rather than silently no-op'ing, the way `TaskRepository::update` does).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::plan::Plan;

/// CRUD keyed by plan id per §4.3. Implementations must make `create`/`update`
/// atomic per plan; missing plans yield `EngineError::NotFound`.
#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn create(&self, plan: &Plan) -> Result<()>;
    async fn load(&self, id: &str) -> Result<Plan>;
    async fn update(&self, plan: &Plan) -> Result<()>;
    async fn delete(&self, id: &str) -> Result<()>;
    /// Returns a storage-specific locator for the plan (a file path for
    /// `FilePlanStore`, a `sqlite://` URI + id for `SqlPlanStore`) — §4.3's
    /// `get_path(id)`.
    fn get_path(&self, id: &str) -> String;
}

/// In-process store used by unit tests that don't need real persistence; also
/// doubles as the reference implementation for the mutator's contract tests.
#[derive(Default)]
pub struct InMemoryPlanStore {
    plans: Mutex<HashMap<String, Plan>>,
}

impl InMemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, plan: Plan) {
        self.plans.lock().unwrap().insert(plan.id.clone(), plan);
    }
}

#[async_trait]
impl PlanStore for InMemoryPlanStore {
    async fn create(&self, plan: &Plan) -> Result<()> {
        self.plans.lock().unwrap().insert(plan.id.clone(), plan.clone());
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Plan> {
        self.plans
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("plan {id}")))
    }

    async fn update(&self, plan: &Plan) -> Result<()> {
        let mut plans = self.plans.lock().unwrap();
        if !plans.contains_key(&plan.id) {
            return Err(EngineError::NotFound(format!("plan {}", plan.id)));
        }
        plans.insert(plan.id.clone(), plan.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.plans
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| EngineError::NotFound(format!("plan {id}")))
    }

    fn get_path(&self, id: &str) -> String {
        format!("memory://plans/{id}")
    }
}

/// File-backed PlanStore: one `<id>.json` file per plan under `dir`, written via
/// temp-file-then-rename.
pub struct FilePlanStore {
    dir: PathBuf,
}

impl FilePlanStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let tmp_path = path.with_extension(format!("json.tmp-{}", Uuid::new_v4()));
        std::fs::write(&tmp_path, contents)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

#[async_trait]
impl PlanStore for FilePlanStore {
    async fn create(&self, plan: &Plan) -> Result<()> {
        let path = self.path_for(&plan.id);
        let json = serde_json::to_vec_pretty(plan)?;
        self.write_atomic(&path, &json)
    }

    async fn load(&self, id: &str) -> Result<Plan> {
        let path = self.path_for(id);
        if !path.exists() {
            return Err(EngineError::NotFound(format!("plan {id}")));
        }
        let bytes = std::fs::read(&path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn update(&self, plan: &Plan) -> Result<()> {
        let path = self.path_for(&plan.id);
        if !path.exists() {
            return Err(EngineError::NotFound(format!("plan {}", plan.id)));
        }
        let json = serde_json::to_vec_pretty(plan)?;
        self.write_atomic(&path, &json)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let path = self.path_for(id);
        if !path.exists() {
            return Err(EngineError::NotFound(format!("plan {id}")));
        }
        std::fs::remove_file(&path)?;
        Ok(())
    }

    fn get_path(&self, id: &str) -> String {
        self.path_for(id).display().to_string()
    }
}

/// SQLite-backed PlanStore storing the serialized Plan JSON in a `plans` table,
/// following `task_repository.rs`'s raw-query + manual-mapping idiom.
pub struct SqlPlanStore {
    pool: SqlitePool,
}

impl SqlPlanStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS plans (
                id TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl PlanStore for SqlPlanStore {
    async fn create(&self, plan: &Plan) -> Result<()> {
        let data = serde_json::to_string(plan)?;
        sqlx::query("INSERT INTO plans (id, data, updated_at) VALUES (?, ?, datetime('now'))")
            .bind(&plan.id)
            .bind(&data)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Plan> {
        let row = sqlx::query_as::<_, (String,)>("SELECT data FROM plans WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("plan {id}")))?;
        Ok(serde_json::from_str(&row.0)?)
    }

    async fn update(&self, plan: &Plan) -> Result<()> {
        let data = serde_json::to_string(plan)?;
        let result = sqlx::query("UPDATE plans SET data = ?, updated_at = datetime('now') WHERE id = ?")
            .bind(&data)
            .bind(&plan.id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(EngineError::NotFound(format!("plan {}", plan.id)));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM plans WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(EngineError::NotFound(format!("plan {id}")));
        }
        Ok(())
    }

    fn get_path(&self, id: &str) -> String {
        format!("sqlite://plans/{id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Step;

    fn sample_plan() -> Plan {
        Plan::new(vec![Step::new(1, "do a thing", "thing done")])
    }

    #[tokio::test]
    async fn in_memory_store_roundtrips() {
        let store = InMemoryPlanStore::new();
        let plan = sample_plan();
        store.create(&plan).await.unwrap();
        let loaded = store.load(&plan.id).await.unwrap();
        assert_eq!(loaded.id, plan.id);
        assert_eq!(loaded.steps.len(), 1);
    }

    #[tokio::test]
    async fn in_memory_store_missing_plan_is_not_found() {
        let store = InMemoryPlanStore::new();
        let result = store.load("does-not-exist").await;
        assert!(matches!(result, Err(EngineError::NotFound(_))));
    }

    #[tokio::test]
    async fn file_store_roundtrips_via_rename() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePlanStore::new(dir.path()).unwrap();
        let plan = sample_plan();
        store.create(&plan).await.unwrap();
        assert!(Path::new(&store.get_path(&plan.id)).exists());

        let mut loaded = store.load(&plan.id).await.unwrap();
        loaded.notes = "updated".into();
        store.update(&loaded).await.unwrap();

        let reloaded = store.load(&plan.id).await.unwrap();
        assert_eq!(reloaded.notes, "updated");
    }

    #[tokio::test]
    async fn file_store_update_on_missing_plan_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePlanStore::new(dir.path()).unwrap();
        let plan = sample_plan();
        let result = store.update(&plan).await;
        assert!(matches!(result, Err(EngineError::NotFound(_))));
    }

    #[tokio::test]
    async fn sql_store_roundtrips() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let store = SqlPlanStore::new(pool);
        store.run_migrations().await.unwrap();
        let plan = sample_plan();
        store.create(&plan).await.unwrap();
        let loaded = store.load(&plan.id).await.unwrap();
        assert_eq!(loaded.id, plan.id);
        store.delete(&plan.id).await.unwrap();
        assert!(store.load(&plan.id).await.is_err());
    }
}
