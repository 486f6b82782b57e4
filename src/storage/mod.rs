pub mod sqlite_store;

use async_trait::async_trait;

use crate::engine::errors::EngineError;
use crate::engine::types::{History, Quest, QuestStatus, RunRecord, Snapshot, SnapshotReason, Step};

/// One row of `list_quests`.
#[derive(Debug, Clone)]
pub struct QuestSummary {
    pub id: String,
    pub quest_type: String,
    pub status: QuestStatus,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub duration: Option<f64>,
    pub created_at: String,
    pub updated_at: String,
}

/// Aggregate counts and duration stats across all quests.
#[derive(Debug, Clone, Default)]
pub struct QuestStats {
    pub total: i64,
    pub by_status: std::collections::HashMap<String, i64>,
    pub avg_duration_seconds: Option<f64>,
    pub max_duration_seconds: Option<f64>,
    pub min_duration_seconds: Option<f64>,
}

/// Per `(worker, tool)` aggregate counts and duration stats.
#[derive(Debug, Clone)]
pub struct WorkerStats {
    pub worker_name: String,
    pub tool_name: String,
    pub total_runs: i64,
    pub successful: i64,
    pub errors: i64,
    pub success_rate: f64,
    pub avg_duration_seconds: Option<f64>,
    pub max_duration_seconds: Option<f64>,
    pub min_duration_seconds: Option<f64>,
}

/// Durable repository for quest records, per-step runs, and snapshots. Each
/// operation is a single transaction; `record_step_completion` wraps
/// `save_run` and `save_quest` in one transaction so a crash never leaves
/// the plan and the run set inconsistent (§4.E atomicity requirement).
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Upsert the quest row by id: status, timings, output, plan, updated_at.
    async fn save_quest(&self, quest: &Quest) -> Result<(), EngineError>;

    /// Rebuild a `Quest` from its row plus all matching run rows aggregated
    /// into `history`.
    async fn load_quest(&self, id: &str) -> Result<Option<Quest>, EngineError>;

    /// Cascade delete: quest row, its runs, and its snapshots.
    async fn delete_quest(&self, id: &str) -> Result<bool, EngineError>;

    /// Append-only insert. One row per completed step (including terminal
    /// failure).
    #[allow(clippy::too_many_arguments)]
    async fn save_run(
        &self,
        quest_id: &str,
        worker_name: &str,
        tool_name: &str,
        run_index: u32,
        record: &RunRecord,
        max_attempts: u32,
    ) -> Result<(), EngineError>;

    /// `save_run` and `save_quest` in one transaction, for the executor's
    /// per-step persistence point.
    #[allow(clippy::too_many_arguments)]
    async fn record_step_completion(
        &self,
        quest: &Quest,
        worker_name: &str,
        tool_name: &str,
        run_index: u32,
        record: &RunRecord,
        max_attempts: u32,
    ) -> Result<(), EngineError>;

    /// Append-only snapshot insert.
    async fn save_snapshot(
        &self,
        quest_id: &str,
        history: &History,
        plan: &std::collections::VecDeque<Step>,
        reason: SnapshotReason,
    ) -> Result<i64, EngineError>;

    /// Most recent snapshot by `created_at`.
    async fn load_latest_snapshot(&self, quest_id: &str) -> Result<Option<Snapshot>, EngineError>;

    /// Paginated listing, newest first.
    async fn list_quests(&self, status: Option<QuestStatus>, limit: i64, offset: i64) -> Result<Vec<QuestSummary>, EngineError>;

    /// Aggregate counts by status and min/avg/max duration.
    async fn quest_stats(&self) -> Result<QuestStats, EngineError>;

    /// Per `(worker, tool)` counts, success rate, duration stats.
    async fn worker_stats(&self, worker_name: Option<&str>) -> Result<Vec<WorkerStats>, EngineError>;
}
