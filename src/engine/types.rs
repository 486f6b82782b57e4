use std::collections::{BTreeMap, HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status vocabulary drift (source uses both `success/completed` and
/// `error/failed`): `Completed`/`Failed` are canonical on write, but the
/// `success`/`error` spellings are accepted on read for backwards
/// compatibility with legacy records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestStatus {
    New,
    Running,
    #[serde(alias = "success")]
    Completed,
    #[serde(alias = "error")]
    Failed,
    Waiting,
    Canceled,
    Paused,
}

impl std::fmt::Display for QuestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            QuestStatus::New => "new",
            QuestStatus::Running => "running",
            QuestStatus::Completed => "completed",
            QuestStatus::Failed => "failed",
            QuestStatus::Waiting => "waiting",
            QuestStatus::Canceled => "canceled",
            QuestStatus::Paused => "paused",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for QuestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new" => Ok(QuestStatus::New),
            "running" => Ok(QuestStatus::Running),
            "completed" | "success" => Ok(QuestStatus::Completed),
            "failed" | "error" => Ok(QuestStatus::Failed),
            "waiting" => Ok(QuestStatus::Waiting),
            "canceled" | "cancelled" => Ok(QuestStatus::Canceled),
            "paused" => Ok(QuestStatus::Paused),
            other => Err(format!("unknown quest status: {other}")),
        }
    }
}

/// Per-step status. Reuses the quest vocabulary but only `New`, `Running`,
/// `Completed` (success) and `Failed` (error) are meaningful at step scope.
pub type StepStatus = QuestStatus;

impl Default for StepStatus {
    fn default() -> Self {
        QuestStatus::New
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorMode {
    Stop,
    Continue,
    ContinueWithInput,
}

impl Default for ErrorMode {
    fn default() -> Self {
        ErrorMode::Stop
    }
}

/// `{max_tries, wait_ms}`, clamped at construction into `[1,5]` / `[0,5000]`
/// by default, or into caller-supplied caps (see `RetryCaps`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_tries: u32,
    pub wait_ms: u64,
}

/// Hard ceilings applied when clamping a `RetryPolicy`. Overridable via
/// configuration (`retry.max_tries_cap`, `retry.wait_ms_cap`).
#[derive(Debug, Clone, Copy)]
pub struct RetryCaps {
    pub min_tries: u32,
    pub max_tries_cap: u32,
    pub min_wait_ms: u64,
    pub max_wait_ms_cap: u64,
}

impl Default for RetryCaps {
    fn default() -> Self {
        RetryCaps {
            min_tries: 1,
            max_tries_cap: 5,
            min_wait_ms: 0,
            max_wait_ms_cap: 5000,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_tries: u32, wait_ms: u64) -> Self {
        Self::clamped(max_tries, wait_ms, RetryCaps::default())
    }

    pub fn clamped(max_tries: u32, wait_ms: u64, caps: RetryCaps) -> Self {
        RetryPolicy {
            max_tries: max_tries.clamp(caps.min_tries, caps.max_tries_cap),
            wait_ms: wait_ms.clamp(caps.min_wait_ms, caps.max_wait_ms_cap),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(1, 0)
    }
}

/// One entry in a quest's plan (execution stack). Only the routing/policy
/// fields are persisted (see `Step`'s `Serialize` output); the remaining
/// fields are execution-time shadow state the executor fills in while the
/// step is in flight and are never part of `plan_json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub worker_name: String,
    pub tool_name: String,
    #[serde(default)]
    pub on_error: ErrorMode,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub run_index: u32,

    #[serde(skip, default)]
    pub status: StepStatus,
    #[serde(skip, default)]
    pub start_time: Option<f64>,
    #[serde(skip, default)]
    pub execution_time: Option<f64>,
    #[serde(skip, default)]
    pub data: Option<Value>,
    #[serde(skip, default)]
    pub error: Option<String>,
}

impl Step {
    pub fn new(worker_name: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Step {
            worker_name: worker_name.into(),
            tool_name: tool_name.into(),
            on_error: ErrorMode::default(),
            retry: RetryPolicy::default(),
            run_index: 0,
            status: QuestStatus::New,
            start_time: None,
            execution_time: None,
            data: None,
            error: None,
        }
    }
}

/// A single attempt-group for one plan entry: the retry loop collapses to
/// one record per step, holding the final attempt's outcome plus the total
/// elapsed time across all attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub status: StepStatus,
    pub start_time: f64,
    #[serde(alias = "end_time")]
    pub execution_time: f64,
    pub input: Value,
    pub output: Option<Value>,
    pub error: Option<String>,
    #[serde(default = "default_attempts")]
    pub attempts: u32,
}

fn default_attempts() -> u32 {
    1
}

/// `worker_name -> (run_index -> run_record)`.
pub type History = HashMap<String, BTreeMap<u32, RunRecord>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestError {
    pub worker: String,
    pub tool: String,
    pub message: String,
}

/// A point-in-time capture of `{history, plan}`, tagged with the reason it
/// was taken. Snapshots accumulate; the most recent is the resume target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotReason {
    Pause,
    Checkpoint,
    Error,
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub quest_id: String,
    pub history: History,
    pub plan: VecDeque<Step>,
    pub reason: SnapshotReason,
    pub created_at: String,
}

/// A persisted unit of work: an ordered plan drained front-to-back, with a
/// growing history of completed runs.
#[derive(Debug, Clone)]
pub struct Quest {
    pub id: String,
    pub quest_type: String,
    pub input: Value,
    /// Remaining steps (the execution stack). Shrinks as steps complete.
    pub plan: VecDeque<Step>,
    /// The full plan as submitted at creation, never mutated. Kept
    /// separately from `plan` so `replay(id, from_worker)` can locate a
    /// step and recover its `on_error`/`retry` policy even after the quest
    /// has drained its execution stack to empty.
    pub original_plan: Vec<Step>,
    pub history: History,
    pub status: QuestStatus,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub last_worker: Option<String>,
    pub output: Option<Value>,
    pub error: Option<QuestError>,
}

impl Quest {
    pub fn new(id: impl Into<String>, quest_type: impl Into<String>, input: Value, plan: Vec<Step>) -> Self {
        Quest {
            id: id.into(),
            quest_type: quest_type.into(),
            input,
            original_plan: plan.clone(),
            plan: plan.into(),
            history: History::new(),
            status: QuestStatus::New,
            start_time: None,
            end_time: None,
            last_worker: None,
            output: None,
            error: None,
        }
    }

    /// `history[last_worker][max run_index].data`, or `None` if no step has
    /// run yet. Only the immediately previous output is threaded forward —
    /// a step never implicitly sees earlier outputs.
    pub fn previous_output(&self) -> Option<Value> {
        let worker = self.last_worker.as_ref()?;
        let runs = self.history.get(worker)?;
        let (_, latest) = runs.iter().next_back()?;
        latest.output.clone()
    }
}
