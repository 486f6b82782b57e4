use std::collections::HashMap;

use anyhow::{Context as _, Result};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::engine::types::{ErrorMode, Quest, RetryCaps, RetryPolicy, Step};

/// Wire shape of one plan entry, mirroring `Step`'s persisted fields minus
/// `run_index` (assigned by the loader, not the caller).
#[derive(Debug, Deserialize)]
struct PlanStep {
    worker_name: String,
    tool_name: String,
    #[serde(default)]
    on_error: ErrorMode,
    #[serde(default)]
    retry: Option<PlanRetry>,
}

#[derive(Debug, Deserialize)]
struct PlanRetry {
    #[serde(default = "default_max_tries")]
    max_tries: u32,
    #[serde(default)]
    wait_ms: u64,
}

fn default_max_tries() -> u32 {
    1
}

/// Wire shape of an entire quest submission (§3.1).
#[derive(Debug, Deserialize)]
struct PlanDocument {
    #[serde(default)]
    id: Option<String>,
    quest_type: String,
    #[serde(default = "default_input")]
    input: Value,
    steps: Vec<PlanStep>,
}

fn default_input() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Parses a quest plan document into a `Quest`, assigning `run_index` as
/// the count of same-`worker_name` steps already seen in the plan and
/// generating a UUID v4 id when the document omits one. Each step's retry
/// policy is clamped against `caps` (from `EngineConfig::retry_caps`),
/// not the hardcoded default.
pub fn parse_plan(document: &str, caps: RetryCaps) -> Result<Quest> {
    let parsed: PlanDocument = serde_json::from_str(document).context("failed to parse quest plan JSON")?;

    let mut seen_per_worker: HashMap<String, u32> = HashMap::new();
    let steps: Vec<Step> = parsed
        .steps
        .into_iter()
        .map(|plan_step| {
            let run_index = seen_per_worker.entry(plan_step.worker_name.clone()).or_insert(0);
            let index = *run_index;
            *run_index += 1;

            let retry = match plan_step.retry {
                Some(r) => RetryPolicy::clamped(r.max_tries, r.wait_ms, caps),
                None => RetryPolicy::clamped(1, 0, caps),
            };

            Step {
                worker_name: plan_step.worker_name,
                tool_name: plan_step.tool_name,
                on_error: plan_step.on_error,
                retry,
                run_index: index,
                status: Default::default(),
                start_time: None,
                execution_time: None,
                data: None,
                error: None,
            }
        })
        .collect();

    let id = parsed.id.unwrap_or_else(|| Uuid::new_v4().to_string());
    Ok(Quest::new(id, parsed.quest_type, parsed.input, steps))
}
