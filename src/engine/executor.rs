use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::engine::client::ToolClient;
use crate::engine::errors::EngineError;
use crate::engine::hooks::{HookBus, HookKind, HookPayload};
use crate::engine::retry::run_with_retry;
use crate::engine::types::{ErrorMode, Quest, QuestError, QuestStatus, RunRecord, SnapshotReason, Step};
use crate::storage::StateStore;

fn now_unix() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Drives a quest's plan to completion: pops one step at a time, resolves
/// its worker through a `ToolClient`, retries per the step's policy, and
/// persists after every step. No intra-quest parallelism — see the
/// concurrency notes on `StateStore`.
pub struct QuestExecutor {
    client: Arc<ToolClient>,
    store: Arc<dyn StateStore>,
    hooks: Arc<HookBus>,
    non_retryable_codes: HashSet<i64>,
    pause_requested: Mutex<HashSet<String>>,
}

impl QuestExecutor {
    pub fn new(client: Arc<ToolClient>, store: Arc<dyn StateStore>, hooks: Arc<HookBus>, non_retryable_codes: HashSet<i64>) -> Self {
        QuestExecutor {
            client,
            store,
            hooks,
            non_retryable_codes,
            pause_requested: Mutex::new(HashSet::new()),
        }
    }

    /// Runs `quest` to completion (or until paused). Mutates `quest` in
    /// place and returns it once the plan is drained, a step fails with
    /// `on_error: stop`, or a pause is observed between steps.
    pub async fn execute(&self, mut quest: Quest) -> Result<Quest, EngineError> {
        quest.status = QuestStatus::Running;
        quest.start_time = Some(now_unix());
        self.store.save_quest(&quest).await?;
        self.emit(&quest, HookKind::QuestStarted, None, None, None, None).await;

        while !quest.plan.is_empty() {
            if self.take_pause_request(&quest.id).await {
                self.store.save_snapshot(&quest.id, &quest.history, &quest.plan, SnapshotReason::Pause).await?;
                quest.status = QuestStatus::Paused;
                self.store.save_quest(&quest).await?;
                return Ok(quest);
            }

            let mut step = quest.plan.pop_front().expect("plan checked non-empty above");
            let worker_name = step.worker_name.clone();
            let tool_name = step.tool_name.clone();
            let run_index = step.run_index;
            let on_error = step.on_error;

            let outcome = self.run_step(&mut step, &quest).await;

            match outcome {
                Ok(record) => {
                    quest.history.entry(worker_name.clone()).or_default().insert(run_index, record);
                    quest.last_worker = Some(worker_name.clone());
                    self.persist_step(&quest, &worker_name, &tool_name, run_index, step.retry.max_tries).await?;
                }
                Err(err) => {
                    let record = RunRecord {
                        status: QuestStatus::Failed,
                        start_time: step.start_time.unwrap_or_else(now_unix),
                        execution_time: step.execution_time.unwrap_or(0.0),
                        input: step.data.clone().unwrap_or(serde_json::Value::Null),
                        output: None,
                        error: Some(err.to_string()),
                        attempts: step.retry.max_tries,
                    };

                    match on_error {
                        ErrorMode::Stop => {
                            quest.history.entry(worker_name.clone()).or_default().insert(run_index, record);
                            quest.status = QuestStatus::Failed;
                            quest.error = Some(QuestError {
                                worker: err.worker().unwrap_or(&worker_name).to_string(),
                                tool: err.tool().unwrap_or(&tool_name).to_string(),
                                message: err.to_string(),
                            });
                            quest.end_time = Some(now_unix());
                            quest.output = quest.previous_output();
                            self.persist_step(&quest, &worker_name, &tool_name, run_index, step.retry.max_tries).await?;
                            self.emit(&quest, HookKind::QuestFinished, None, None, None, None).await;
                            return Ok(quest);
                        }
                        ErrorMode::Continue => {
                            // Recorded, but the failed step never becomes `last_worker` —
                            // downstream steps keep seeing the last *successful* output.
                            quest.history.entry(worker_name.clone()).or_default().insert(run_index, record);
                            self.persist_step(&quest, &worker_name, &tool_name, run_index, step.retry.max_tries).await?;
                        }
                        ErrorMode::ContinueWithInput => {
                            let mut record = record;
                            record.output = quest.previous_output();
                            quest.history.entry(worker_name.clone()).or_default().insert(run_index, record);
                            quest.last_worker = Some(worker_name.clone());
                            self.persist_step(&quest, &worker_name, &tool_name, run_index, step.retry.max_tries).await?;
                        }
                    }
                }
            }
        }

        if quest.status == QuestStatus::Running {
            quest.status = QuestStatus::Completed;
        }
        quest.end_time = Some(now_unix());
        quest.output = quest.previous_output();
        self.store.save_quest(&quest).await?;
        self.emit(&quest, HookKind::QuestFinished, None, None, None, None).await;
        Ok(quest)
    }

    /// Runs one step's retry loop against the tool client, emitting
    /// `lord_invoked`/`lord_completed`/`lord_error` around the attempts.
    async fn run_step(&self, step: &mut Step, quest: &Quest) -> Result<RunRecord, EngineError> {
        let input = step.data.clone().unwrap_or_else(|| quest.previous_output().unwrap_or_else(|| quest.input.clone()));
        step.start_time = Some(now_unix());
        step.status = QuestStatus::Running;
        step.data = Some(input.clone());

        self.emit(quest, HookKind::LordInvoked, Some(step.worker_name.clone()), Some(step.tool_name.clone()), Some(input.clone()), None)
            .await;

        let client = self.client.clone();
        let worker_name = step.worker_name.clone();
        let tool_name = step.tool_name.clone();
        let policy = step.retry;

        let result = run_with_retry(&worker_name, &tool_name, policy, &self.non_retryable_codes, |_attempt| {
            let client = client.clone();
            let worker_name = worker_name.clone();
            let tool_name = tool_name.clone();
            let input = input.clone();
            async move { client.call(&worker_name, &tool_name, input).await }
        })
        .await;

        let start_time = step.start_time.unwrap_or_else(now_unix);

        match result {
            Ok(outcome) => {
                let execution_time = outcome.elapsed.as_secs_f64();
                step.status = QuestStatus::Completed;
                step.execution_time = Some(execution_time);
                step.data = Some(outcome.value.clone());

                self.emit(
                    quest,
                    HookKind::LordCompleted,
                    Some(worker_name),
                    Some(tool_name),
                    Some(outcome.value.clone()),
                    None,
                )
                .await;

                Ok(RunRecord {
                    status: QuestStatus::Completed,
                    start_time,
                    execution_time,
                    input,
                    output: Some(outcome.value),
                    error: None,
                    attempts: outcome.attempts,
                })
            }
            Err(failure) => {
                step.status = QuestStatus::Failed;
                step.execution_time = Some(failure.elapsed.as_secs_f64());
                step.error = Some(failure.error.to_string());

                self.emit(
                    quest,
                    HookKind::LordError,
                    Some(worker_name),
                    Some(tool_name),
                    None,
                    Some(failure.error.to_string()),
                )
                .await;

                Err(failure.error)
            }
        }
    }

    async fn persist_step(
        &self,
        quest: &Quest,
        worker_name: &str,
        tool_name: &str,
        run_index: u32,
        max_attempts: u32,
    ) -> Result<(), EngineError> {
        let record = quest.history.get(worker_name).and_then(|runs| runs.get(&run_index)).expect("just inserted");
        self.store.record_step_completion(quest, worker_name, tool_name, run_index, record, max_attempts).await
    }

    async fn take_pause_request(&self, quest_id: &str) -> bool {
        self.pause_requested.lock().await.remove(quest_id)
    }

    async fn emit(
        &self,
        quest: &Quest,
        kind: HookKind,
        worker_name: Option<String>,
        tool_name: Option<String>,
        data: Option<serde_json::Value>,
        error: Option<String>,
    ) {
        self.hooks
            .emit(
                kind,
                HookPayload {
                    quest_id: quest.id.clone(),
                    quest_type: quest.quest_type.clone(),
                    status: quest.status,
                    worker_name,
                    tool_name,
                    data,
                    error,
                },
            )
            .await;
    }

    /// Marks `quest_id` to stop before its next step. Cooperative: a step
    /// already in flight runs to completion first. Returns `false` if the
    /// quest isn't known to this executor's in-process flag set (the caller
    /// should still check store state — this only affects a concurrently
    /// running `execute` loop in this process).
    pub async fn request_pause(&self, quest_id: &str) -> bool {
        self.pause_requested.lock().await.insert(quest_id.to_string());
        true
    }

    /// Pauses `quest_id` directly against the store: writes a
    /// `pause`-reason snapshot of its current `history`/`plan` and flips its
    /// status to `Paused`. Returns `false` if no such quest exists. Errors
    /// if the quest is known but isn't currently `Running`.
    pub async fn pause(&self, quest_id: &str) -> Result<bool, EngineError> {
        let Some(mut quest) = self.store.load_quest(quest_id).await? else {
            return Ok(false);
        };

        if quest.status != QuestStatus::Running {
            return Err(EngineError::InvalidState(format!(
                "quest '{quest_id}' is not running (status: {})",
                quest.status
            )));
        }

        self.store.save_snapshot(quest_id, &quest.history, &quest.plan, SnapshotReason::Pause).await?;
        quest.status = QuestStatus::Paused;
        self.store.save_quest(&quest).await?;
        Ok(true)
    }

    /// Loads `quest_id`, requires it to be running or paused already, then
    /// (re)enters `execute`. If the stored status is `Paused`, the latest
    /// snapshot's `history`/`plan` are restored first.
    pub async fn resume(&self, quest_id: &str) -> Result<Quest, EngineError> {
        let mut quest = self
            .store
            .load_quest(quest_id)
            .await?
            .ok_or_else(|| EngineError::InvalidState(format!("quest '{quest_id}' not found")))?;

        if quest.status != QuestStatus::Paused {
            return Err(EngineError::InvalidState(format!(
                "quest '{quest_id}' is not paused (status: {})",
                quest.status
            )));
        }

        if let Some(snapshot) = self.store.load_latest_snapshot(quest_id).await? {
            quest.history = snapshot.history;
            quest.plan = snapshot.plan;
        }

        quest.end_time = None;
        quest.status = QuestStatus::Running;
        self.execute(quest).await
    }

    /// Builds a fresh quest (`<id>-replay-<unix_seconds>`) that starts from
    /// `from_worker` in the *original* plan (or from the very start if
    /// `None`), with a history cleared from that point on. Never mutates
    /// the source quest.
    pub async fn replay(&self, quest_id: &str, from_worker: Option<&str>) -> Result<Quest, EngineError> {
        let source = self
            .store
            .load_quest(quest_id)
            .await?
            .ok_or_else(|| EngineError::InvalidState(format!("quest '{quest_id}' not found")))?;

        let start_index = match from_worker {
            Some(worker) => source
                .original_plan
                .iter()
                .position(|step| step.worker_name == worker)
                .ok_or_else(|| EngineError::UnknownReplayPoint(worker.to_string()))?,
            None => 0,
        };

        let replay_plan: Vec<Step> = source.original_plan[start_index..]
            .iter()
            .cloned()
            .map(|mut step| {
                step.status = QuestStatus::New;
                step.start_time = None;
                step.execution_time = None;
                step.data = None;
                step.error = None;
                step
            })
            .collect();

        let mut history = source.history.clone();
        if let Some(worker) = from_worker {
            history.remove(worker);
        }

        let new_id = format!("{quest_id}-replay-{}", Utc::now().timestamp());
        let mut replayed = Quest::new(new_id, source.quest_type.clone(), source.input.clone(), replay_plan);
        replayed.history = history;
        replayed.plan = VecDeque::from(replayed.original_plan.clone());

        self.store.save_quest(&replayed).await?;
        Ok(replayed)
    }

    /// Loads a quest by id, if it exists.
    pub async fn load_quest(&self, quest_id: &str) -> Result<Option<Quest>, EngineError> {
        self.store.load_quest(quest_id).await
    }
}
