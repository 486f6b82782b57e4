use std::collections::{BTreeMap, HashMap, VecDeque};
use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use crate::engine::errors::EngineError;
use crate::engine::types::{History, Quest, QuestError, QuestStatus, RunRecord, Snapshot, SnapshotReason, Step};
use crate::storage::{QuestStats, QuestSummary, StateStore, WorkerStats};

/// `sqlx`-backed `StateStore` against SQLite. Schema creation is idempotent
/// and runs at store-open time, mirroring the source system's
/// `QuestRepository._init_database`. Queries use the runtime `query`/
/// `query_as` API rather than the compile-time `query!` macros, so the
/// crate builds without a live `DATABASE_URL`.
pub struct SqlStateStore {
    pool: SqlitePool,
}

const SCHEMA_VERSION: i64 = 1;

impl SqlStateStore {
    pub async fn connect(database_path: &str) -> Result<Self, EngineError> {
        let url = if database_path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite://{database_path}")
        };
        let options = SqliteConnectOptions::from_str(&url).map_err(EngineError::StoreError)?.create_if_missing(true);
        // A shared :memory: database only stays coherent across one
        // connection; an in-memory pool with >1 connection would hand out
        // independently-empty databases.
        let max_connections = if database_path == ":memory:" { 1 } else { 8 };
        let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
        let store = SqlStateStore { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        SqlStateStore { pool }
    }

    async fn init_schema(&self) -> Result<(), EngineError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS quests (
                id TEXT PRIMARY KEY,
                type TEXT NOT NULL,
                status TEXT NOT NULL,
                start_time REAL,
                end_time REAL,
                duration REAL,
                input_json TEXT NOT NULL,
                output_json TEXT,
                plan_json TEXT NOT NULL,
                original_plan_json TEXT NOT NULL,
                last_worker TEXT,
                error_worker TEXT,
                error_tool TEXT,
                error_message TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                schema_version INTEGER NOT NULL DEFAULT 1
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                run_id TEXT PRIMARY KEY,
                quest_id TEXT NOT NULL REFERENCES quests(id),
                worker_name TEXT NOT NULL,
                tool_name TEXT NOT NULL,
                run_index INTEGER NOT NULL,
                status TEXT NOT NULL,
                start_time REAL NOT NULL,
                end_time REAL NOT NULL,
                duration REAL NOT NULL,
                input_json TEXT NOT NULL,
                output_json TEXT,
                error_message TEXT,
                attempt_number INTEGER NOT NULL,
                max_attempts INTEGER NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                snapshot_id INTEGER PRIMARY KEY AUTOINCREMENT,
                quest_id TEXT NOT NULL REFERENCES quests(id),
                history_json TEXT NOT NULL,
                plan_json TEXT NOT NULL,
                reason TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_quests_status ON quests(status)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_quests_created_at ON quests(created_at DESC)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_runs_quest_run_index ON runs(quest_id, run_index)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_runs_worker_created_at ON runs(worker_name, created_at DESC)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

async fn quest_row_exists(conn: &mut sqlx::SqliteConnection, id: &str) -> Result<bool, EngineError> {
    let row = sqlx::query("SELECT 1 FROM quests WHERE id = ?").bind(id).fetch_optional(conn).await?;
    Ok(row.is_some())
}

async fn upsert_quest_row(executor: &mut sqlx::SqliteConnection, quest: &Quest) -> Result<(), EngineError> {
    let plan_json = serde_json::to_string(&quest.plan).expect("plan serializes");
    let original_plan_json = serde_json::to_string(&quest.original_plan).expect("original plan serializes");
    let input_json = serde_json::to_string(&quest.input).expect("input serializes");
    let output_json = quest.output.as_ref().map(|v| serde_json::to_string(v).expect("output serializes"));
    let duration = match (quest.start_time, quest.end_time) {
        (Some(s), Some(e)) => Some(e - s),
        _ => None,
    };
    let (error_worker, error_tool, error_message) = match &quest.error {
        Some(e) => (Some(e.worker.clone()), Some(e.tool.clone()), Some(e.message.clone())),
        None => (None, None, None),
    };
    let updated_at = now_rfc3339();

    if quest_row_exists(executor, &quest.id).await? {
        sqlx::query(
            r#"
            UPDATE quests SET
                type = ?, status = ?, start_time = ?, end_time = ?, duration = ?,
                input_json = ?, output_json = ?, plan_json = ?, original_plan_json = ?, last_worker = ?,
                error_worker = ?, error_tool = ?, error_message = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&quest.quest_type)
        .bind(quest.status.to_string())
        .bind(quest.start_time)
        .bind(quest.end_time)
        .bind(duration)
        .bind(&input_json)
        .bind(&output_json)
        .bind(&plan_json)
        .bind(&original_plan_json)
        .bind(&quest.last_worker)
        .bind(&error_worker)
        .bind(&error_tool)
        .bind(&error_message)
        .bind(&updated_at)
        .bind(&quest.id)
        .execute(executor)
        .await?;
    } else {
        let created_at = now_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO quests
                (id, type, status, start_time, end_time, duration, input_json, output_json,
                 plan_json, original_plan_json, last_worker, error_worker, error_tool, error_message,
                 created_at, updated_at, schema_version)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&quest.id)
        .bind(&quest.quest_type)
        .bind(quest.status.to_string())
        .bind(quest.start_time)
        .bind(quest.end_time)
        .bind(duration)
        .bind(&input_json)
        .bind(&output_json)
        .bind(&plan_json)
        .bind(&original_plan_json)
        .bind(&quest.last_worker)
        .bind(&error_worker)
        .bind(&error_tool)
        .bind(&error_message)
        .bind(&created_at)
        .bind(&updated_at)
        .bind(SCHEMA_VERSION)
        .execute(executor)
        .await?;
    }
    Ok(())
}

async fn insert_run_row(
    executor: &mut sqlx::SqliteConnection,
    quest_id: &str,
    worker_name: &str,
    tool_name: &str,
    run_index: u32,
    record: &RunRecord,
    max_attempts: u32,
) -> Result<(), EngineError> {
    let run_id = format!("{quest_id}:{worker_name}:{run_index}");
    let input_json = serde_json::to_string(&record.input).expect("input serializes");
    let output_json = record.output.as_ref().map(|v| serde_json::to_string(v).expect("output serializes"));
    let end_time = record.start_time + record.execution_time;
    let created_at = now_rfc3339();

    sqlx::query(
        r#"
        INSERT OR REPLACE INTO runs
            (run_id, quest_id, worker_name, tool_name, run_index, status, start_time, end_time,
             duration, input_json, output_json, error_message, attempt_number, max_attempts, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&run_id)
    .bind(quest_id)
    .bind(worker_name)
    .bind(tool_name)
    .bind(run_index)
    .bind(record.status.to_string())
    .bind(record.start_time)
    .bind(end_time)
    .bind(record.execution_time)
    .bind(&input_json)
    .bind(&output_json)
    .bind(&record.error)
    .bind(record.attempts)
    .bind(max_attempts)
    .bind(&created_at)
    .execute(executor)
    .await?;
    Ok(())
}

fn run_record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<RunRecord, EngineError> {
    let status_str: String = row.try_get("status")?;
    let status = QuestStatus::from_str(&status_str).map_err(EngineError::InvalidState)?;
    let input_json: String = row.try_get("input_json")?;
    let output_json: Option<String> = row.try_get("output_json")?;
    Ok(RunRecord {
        status,
        start_time: row.try_get("start_time")?,
        execution_time: row.try_get("duration")?,
        input: serde_json::from_str(&input_json).unwrap_or(Value::Null),
        output: output_json.and_then(|s| serde_json::from_str(&s).ok()),
        error: row.try_get("error_message")?,
        attempts: {
            let n: i64 = row.try_get("attempt_number")?;
            n as u32
        },
    })
}

#[async_trait]
impl StateStore for SqlStateStore {
    async fn save_quest(&self, quest: &Quest) -> Result<(), EngineError> {
        let mut conn = self.pool.acquire().await?;
        upsert_quest_row(&mut conn, quest).await
    }

    async fn load_quest(&self, id: &str) -> Result<Option<Quest>, EngineError> {
        let row = sqlx::query("SELECT * FROM quests WHERE id = ?").bind(id).fetch_optional(&self.pool).await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let status_str: String = row.try_get("status")?;
        let status = QuestStatus::from_str(&status_str).map_err(EngineError::InvalidState)?;
        let plan_json: String = row.try_get("plan_json")?;
        let plan: VecDeque<Step> = serde_json::from_str(&plan_json).unwrap_or_default();
        let original_plan_json: String = row.try_get("original_plan_json")?;
        let original_plan: Vec<Step> = serde_json::from_str(&original_plan_json).unwrap_or_default();
        let input_json: String = row.try_get("input_json")?;
        let output_json: Option<String> = row.try_get("output_json")?;
        let error_worker: Option<String> = row.try_get("error_worker")?;
        let error_tool: Option<String> = row.try_get("error_tool")?;
        let error_message: Option<String> = row.try_get("error_message")?;
        let error = match (error_worker, error_tool, error_message) {
            (Some(worker), Some(tool), Some(message)) => Some(QuestError { worker, tool, message }),
            _ => None,
        };

        let run_rows = sqlx::query("SELECT * FROM runs WHERE quest_id = ? ORDER BY run_index ASC")
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        let mut history: History = History::new();
        for run_row in &run_rows {
            let worker_name: String = run_row.try_get("worker_name")?;
            let run_index: i64 = run_row.try_get("run_index")?;
            let record = run_record_from_row(run_row)?;
            history.entry(worker_name).or_insert_with(BTreeMap::new).insert(run_index as u32, record);
        }

        Ok(Some(Quest {
            id: id.to_string(),
            quest_type: row.try_get("type")?,
            input: serde_json::from_str(&input_json).unwrap_or(Value::Null),
            plan,
            original_plan,
            history,
            status,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            last_worker: row.try_get("last_worker")?,
            output: output_json.and_then(|s| serde_json::from_str(&s).ok()),
            error,
        }))
    }

    async fn delete_quest(&self, id: &str) -> Result<bool, EngineError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM snapshots WHERE quest_id = ?").bind(id).execute(&mut *tx).await?;
        sqlx::query("DELETE FROM runs WHERE quest_id = ?").bind(id).execute(&mut *tx).await?;
        let result = sqlx::query("DELETE FROM quests WHERE id = ?").bind(id).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn save_run(
        &self,
        quest_id: &str,
        worker_name: &str,
        tool_name: &str,
        run_index: u32,
        record: &RunRecord,
        max_attempts: u32,
    ) -> Result<(), EngineError> {
        let mut conn = self.pool.acquire().await?;
        insert_run_row(&mut conn, quest_id, worker_name, tool_name, run_index, record, max_attempts).await
    }

    async fn record_step_completion(
        &self,
        quest: &Quest,
        worker_name: &str,
        tool_name: &str,
        run_index: u32,
        record: &RunRecord,
        max_attempts: u32,
    ) -> Result<(), EngineError> {
        let mut tx = self.pool.begin().await?;
        insert_run_row(&mut *tx, &quest.id, worker_name, tool_name, run_index, record, max_attempts).await?;
        upsert_quest_row(&mut *tx, quest).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn save_snapshot(
        &self,
        quest_id: &str,
        history: &History,
        plan: &VecDeque<Step>,
        reason: SnapshotReason,
    ) -> Result<i64, EngineError> {
        let history_json = serde_json::to_string(history).expect("history serializes");
        let plan_json = serde_json::to_string(plan).expect("plan serializes");
        let reason_json = serde_json::to_string(&reason).expect("reason serializes");
        let reason_str = reason_json.trim_matches('"').to_string();
        let created_at = now_rfc3339();

        let result = sqlx::query(
            "INSERT INTO snapshots (quest_id, history_json, plan_json, reason, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(quest_id)
        .bind(&history_json)
        .bind(&plan_json)
        .bind(&reason_str)
        .bind(&created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn load_latest_snapshot(&self, quest_id: &str) -> Result<Option<Snapshot>, EngineError> {
        let row = sqlx::query(
            "SELECT * FROM snapshots WHERE quest_id = ? ORDER BY snapshot_id DESC, created_at DESC LIMIT 1",
        )
        .bind(quest_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let history_json: String = row.try_get("history_json")?;
        let plan_json: String = row.try_get("plan_json")?;
        let reason_str: String = row.try_get("reason")?;
        Ok(Some(Snapshot {
            quest_id: quest_id.to_string(),
            history: serde_json::from_str(&history_json).unwrap_or_default(),
            plan: serde_json::from_str(&plan_json).unwrap_or_default(),
            reason: serde_json::from_str(&format!("\"{reason_str}\"")).unwrap_or(SnapshotReason::Checkpoint),
            created_at: row.try_get("created_at")?,
        }))
    }

    async fn list_quests(&self, status: Option<QuestStatus>, limit: i64, offset: i64) -> Result<Vec<QuestSummary>, EngineError> {
        let rows = if let Some(status) = status {
            sqlx::query("SELECT * FROM quests WHERE status = ? ORDER BY created_at DESC LIMIT ? OFFSET ?")
                .bind(status.to_string())
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query("SELECT * FROM quests ORDER BY created_at DESC LIMIT ? OFFSET ?")
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
        };

        rows.iter()
            .map(|row| {
                let status_str: String = row.try_get("status")?;
                Ok(QuestSummary {
                    id: row.try_get("id")?,
                    quest_type: row.try_get("type")?,
                    status: QuestStatus::from_str(&status_str).map_err(EngineError::InvalidState)?,
                    start_time: row.try_get("start_time")?,
                    end_time: row.try_get("end_time")?,
                    duration: row.try_get("duration")?,
                    created_at: row.try_get("created_at")?,
                    updated_at: row.try_get("updated_at")?,
                })
            })
            .collect()
    }

    async fn quest_stats(&self) -> Result<QuestStats, EngineError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM quests").fetch_one(&self.pool).await?;

        let status_rows = sqlx::query("SELECT status, COUNT(*) as n FROM quests GROUP BY status").fetch_all(&self.pool).await?;
        let mut by_status = HashMap::new();
        for row in &status_rows {
            let status: String = row.try_get("status")?;
            let n: i64 = row.try_get("n")?;
            by_status.insert(status, n);
        }

        let duration_row = sqlx::query(
            "SELECT AVG(duration) as avg_d, MAX(duration) as max_d, MIN(duration) as min_d FROM quests WHERE duration IS NOT NULL",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(QuestStats {
            total,
            by_status,
            avg_duration_seconds: duration_row.try_get("avg_d")?,
            max_duration_seconds: duration_row.try_get("max_d")?,
            min_duration_seconds: duration_row.try_get("min_d")?,
        })
    }

    async fn worker_stats(&self, worker_name: Option<&str>) -> Result<Vec<WorkerStats>, EngineError> {
        let rows = if let Some(worker_name) = worker_name {
            sqlx::query(
                r#"
                SELECT worker_name, tool_name,
                       COUNT(*) as total_runs,
                       SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END) as successful,
                       SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END) as errors,
                       AVG(duration) as avg_d, MAX(duration) as max_d, MIN(duration) as min_d
                FROM runs WHERE worker_name = ?
                GROUP BY worker_name, tool_name
                "#,
            )
            .bind(worker_name)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(
                r#"
                SELECT worker_name, tool_name,
                       COUNT(*) as total_runs,
                       SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END) as successful,
                       SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END) as errors,
                       AVG(duration) as avg_d, MAX(duration) as max_d, MIN(duration) as min_d
                FROM runs
                GROUP BY worker_name, tool_name
                "#,
            )
            .fetch_all(&self.pool)
            .await?
        };

        rows.iter()
            .map(|row| {
                let total_runs: i64 = row.try_get("total_runs")?;
                let successful: i64 = row.try_get("successful")?;
                let errors: i64 = row.try_get("errors")?;
                let success_rate = if total_runs > 0 { successful as f64 / total_runs as f64 } else { 0.0 };
                Ok(WorkerStats {
                    worker_name: row.try_get("worker_name")?,
                    tool_name: row.try_get("tool_name")?,
                    total_runs,
                    successful,
                    errors,
                    success_rate,
                    avg_duration_seconds: row.try_get("avg_d")?,
                    max_duration_seconds: row.try_get("max_d")?,
                    min_duration_seconds: row.try_get("min_d")?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::RetryPolicy;

    async fn store() -> SqlStateStore {
        SqlStateStore::connect(":memory:").await.unwrap()
    }

    fn sample_quest() -> Quest {
        let mut step = Step::new("architect", "design_system");
        step.run_index = 0;
        Quest::new("q1", "design_microservice", serde_json::json!({"req": "auth"}), vec![step])
    }

    #[tokio::test]
    async fn save_and_load_round_trips_public_fields() {
        let store = store().await;
        let mut quest = sample_quest();
        quest.status = QuestStatus::Running;
        quest.start_time = Some(1000.0);
        store.save_quest(&quest).await.unwrap();

        let loaded = store.load_quest("q1").await.unwrap().unwrap();
        assert_eq!(loaded.id, quest.id);
        assert_eq!(loaded.quest_type, quest.quest_type);
        assert_eq!(loaded.status, quest.status);
        assert_eq!(loaded.plan.len(), 1);
    }

    #[tokio::test]
    async fn save_quest_is_idempotent() {
        let store = store().await;
        let quest = sample_quest();
        store.save_quest(&quest).await.unwrap();
        store.save_quest(&quest).await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM quests").fetch_one(&store.pool).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn record_step_completion_persists_both_atomically() {
        let store = store().await;
        let mut quest = sample_quest();
        quest.plan.pop_front();
        quest.status = QuestStatus::Completed;
        let record = RunRecord {
            status: QuestStatus::Completed,
            start_time: 1.0,
            execution_time: 0.5,
            input: serde_json::json!({}),
            output: Some(serde_json::json!({"ok": true})),
            error: None,
            attempts: 1,
        };
        store.record_step_completion(&quest, "architect", "design_system", 0, &record, 3).await.unwrap();

        let loaded = store.load_quest("q1").await.unwrap().unwrap();
        assert!(loaded.plan.is_empty());
        assert_eq!(loaded.history["architect"][&0].output, Some(serde_json::json!({"ok": true})));
    }

    #[tokio::test]
    async fn load_missing_quest_returns_none() {
        let store = store().await;
        assert!(store.load_quest("absent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_quest_cascades() {
        let store = store().await;
        let quest = sample_quest();
        store.save_quest(&quest).await.unwrap();
        let record = RunRecord {
            status: QuestStatus::Completed,
            start_time: 0.0,
            execution_time: 0.1,
            input: serde_json::json!({}),
            output: None,
            error: None,
            attempts: 1,
        };
        store.save_run("q1", "architect", "design_system", 0, &record, 1).await.unwrap();
        store.save_snapshot("q1", &History::new(), &quest.plan, SnapshotReason::Checkpoint).await.unwrap();

        assert!(store.delete_quest("q1").await.unwrap());
        assert!(store.load_quest("q1").await.unwrap().is_none());
        let run_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM runs").fetch_one(&store.pool).await.unwrap();
        assert_eq!(run_count, 0);
    }

    #[tokio::test]
    async fn snapshot_round_trips_reason() {
        let store = store().await;
        let quest = sample_quest();
        store.save_quest(&quest).await.unwrap();
        store.save_snapshot("q1", &quest.history, &quest.plan, SnapshotReason::Pause).await.unwrap();
        let snap = store.load_latest_snapshot("q1").await.unwrap().unwrap();
        assert_eq!(snap.reason, SnapshotReason::Pause);
        assert_eq!(snap.plan.len(), 1);
    }

    #[tokio::test]
    async fn list_quests_filters_by_status() {
        let store = store().await;
        let mut running = sample_quest();
        running.id = "q-running".into();
        running.status = QuestStatus::Running;
        store.save_quest(&running).await.unwrap();

        let mut done = sample_quest();
        done.id = "q-done".into();
        done.status = QuestStatus::Completed;
        store.save_quest(&done).await.unwrap();

        let listed = store.list_quests(Some(QuestStatus::Completed), 10, 0).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "q-done");
    }

    #[tokio::test]
    async fn quest_stats_counts_by_status() {
        let store = store().await;
        let quest = sample_quest();
        store.save_quest(&quest).await.unwrap();
        let stats = store.quest_stats().await.unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.by_status.get("new"), Some(&1));
    }

    #[tokio::test]
    async fn worker_stats_computes_success_rate() {
        let store = store().await;
        let quest = sample_quest();
        store.save_quest(&quest).await.unwrap();
        let ok = RunRecord {
            status: QuestStatus::Completed,
            start_time: 0.0,
            execution_time: 1.0,
            input: serde_json::json!({}),
            output: Some(serde_json::json!({})),
            error: None,
            attempts: 1,
        };
        store.save_run("q1", "architect", "design_system", 0, &ok, RetryPolicy::default().max_tries).await.unwrap();
        let stats = store.worker_stats(Some("architect")).await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].success_rate, 1.0);
    }
}
