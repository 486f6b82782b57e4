pub mod config;
pub mod plan;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use crate::cli::config::EngineConfig;
use crate::engine::client::ToolClient;
use crate::engine::directory::InMemoryWorkerDirectory;
use crate::engine::executor::QuestExecutor;
use crate::engine::hooks::HookBus;
use crate::engine::types::QuestStatus;
use crate::storage::StateStore;
use crate::storage::sqlite_store::SqlStateStore;

#[derive(Parser)]
#[command(name = "quester", version, about = "Quest execution engine")]
pub struct Cli {
    /// Path to a .env file to load (default: auto-detect .env in cwd)
    #[arg(long, global = true)]
    dotenv: Option<PathBuf>,

    /// Path to a quester.yaml config file (default: auto-detect in cwd)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a quest plan from a JSON file
    Run {
        /// Path to the quest plan JSON file
        plan: PathBuf,

        /// Override the plan's input with a JSON string
        #[arg(long)]
        input: Option<String>,
    },

    /// Cooperatively pause a running quest
    Pause {
        /// Quest ID
        quest_id: String,
    },

    /// Resume a paused quest from its latest snapshot
    Resume {
        /// Quest ID
        quest_id: String,
    },

    /// Replay a quest, optionally from a specific worker onward
    Replay {
        /// Quest ID to replay
        quest_id: String,

        /// Replay from the first plan entry for this worker (default: from the start)
        #[arg(long)]
        from_worker: Option<String>,
    },

    /// List quests, optionally filtered by status
    List {
        /// Filter by status (new, running, completed, failed, waiting, canceled, paused)
        #[arg(long)]
        status: Option<String>,

        #[arg(long, default_value_t = 20)]
        limit: i64,

        #[arg(long, default_value_t = 0)]
        offset: i64,

        /// Output format (table, json)
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Show full detail for a quest
    Inspect {
        /// Quest ID
        quest_id: String,
    },

    /// Aggregate quest statistics
    Stats,

    /// Per-(worker, tool) statistics
    WorkerStats {
        /// Restrict to a single worker
        #[arg(long)]
        worker: Option<String>,
    },
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    load_dotenv(cli.dotenv.as_deref());
    let config = EngineConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { plan, input } => cmd_run(&config, plan, input).await,
        Commands::Pause { quest_id } => cmd_pause(&config, quest_id).await,
        Commands::Resume { quest_id } => cmd_resume(&config, quest_id).await,
        Commands::Replay { quest_id, from_worker } => cmd_replay(&config, quest_id, from_worker).await,
        Commands::List { status, limit, offset, format } => cmd_list(&config, status, limit, offset, format).await,
        Commands::Inspect { quest_id } => cmd_inspect(&config, quest_id).await,
        Commands::Stats => cmd_stats(&config).await,
        Commands::WorkerStats { worker } => cmd_worker_stats(&config, worker).await,
    }
}

/// Load environment variables from a .env file.
/// If an explicit path is given, load from that path (error if missing).
/// Otherwise, auto-detect .env in the current working directory (silently skip if absent).
fn load_dotenv(explicit_path: Option<&std::path::Path>) {
    match explicit_path {
        Some(path) => match dotenvy::from_path(path) {
            Ok(()) => info!("Loaded env from {}", path.display()),
            Err(e) => {
                eprintln!("Warning: Failed to load dotenv file '{}': {}", path.display(), e);
            }
        },
        None => match dotenvy::dotenv() {
            Ok(path) => info!("Loaded env from {}", path.display()),
            Err(dotenvy::Error::Io(_)) => {}
            Err(e) => {
                eprintln!("Warning: Failed to parse .env file: {}", e);
            }
        },
    }
}

async fn open_store(config: &EngineConfig) -> Result<Arc<dyn StateStore>> {
    let store = SqlStateStore::connect(config.store_path()).await.context("failed to open state store")?;
    Ok(Arc::new(store))
}

fn build_executor(config: &EngineConfig, store: Arc<dyn StateStore>) -> QuestExecutor {
    let mut directory = InMemoryWorkerDirectory::default();
    for (worker, endpoint) in config.worker_endpoints() {
        directory.insert(worker, endpoint);
    }
    let client = Arc::new(ToolClient::new(
        Arc::new(directory),
        std::time::Duration::from_millis(config.default_tool_timeout_ms()),
    ));
    let hooks = Arc::new(HookBus::new());
    QuestExecutor::new(client, store, hooks, HashSet::new())
}

async fn cmd_run(config: &EngineConfig, plan_path: PathBuf, input_override: Option<String>) -> Result<()> {
    let document = std::fs::read_to_string(&plan_path).with_context(|| format!("failed to read plan file: {}", plan_path.display()))?;
    let mut quest = plan::parse_plan(&document, config.retry_caps())?;

    if let Some(input_json) = input_override {
        quest.input = serde_json::from_str(&input_json).context("failed to parse --input JSON")?;
    }

    let store = open_store(config).await?;
    let executor = build_executor(config, store);

    println!("Quest: {} ({} steps)", quest.id, quest.plan.len());
    let result = executor.execute(quest).await?;

    println!("\nQuest ID: {}", result.id);
    println!("Status: {}", result.status);
    if let Some(output) = &result.output {
        println!("Output: {}", serde_json::to_string_pretty(output)?);
    }
    if let Some(error) = &result.error {
        println!("Error: {}/{}: {}", error.worker, error.tool, error.message);
    }

    Ok(())
}

async fn cmd_pause(config: &EngineConfig, quest_id: String) -> Result<()> {
    let store = open_store(config).await?;
    let executor = build_executor(config, store);
    if !executor.pause(&quest_id).await? {
        anyhow::bail!("quest '{quest_id}' not found");
    }
    println!("Quest '{quest_id}' paused.");
    Ok(())
}

async fn cmd_resume(config: &EngineConfig, quest_id: String) -> Result<()> {
    let store = open_store(config).await?;
    let executor = build_executor(config, store);
    let result = executor.resume(&quest_id).await?;
    println!("Quest ID: {}", result.id);
    println!("Status: {}", result.status);
    Ok(())
}

async fn cmd_replay(config: &EngineConfig, quest_id: String, from_worker: Option<String>) -> Result<()> {
    let store = open_store(config).await?;
    let executor = build_executor(config, store);
    let replayed = executor.replay(&quest_id, from_worker.as_deref()).await?;
    let result = executor.execute(replayed).await?;
    println!("Replay ID: {}", result.id);
    println!("Status: {}", result.status);
    Ok(())
}

async fn cmd_list(config: &EngineConfig, status_filter: Option<String>, limit: i64, offset: i64, format: String) -> Result<()> {
    let store = open_store(config).await?;
    let status = status_filter.as_deref().map(|s| s.parse::<QuestStatus>()).transpose().map_err(anyhow::Error::msg)?;
    let quests = store.list_quests(status, limit, offset).await?;

    if quests.is_empty() {
        println!("No quests found.");
        return Ok(());
    }

    if format == "json" {
        let rows: Vec<_> = quests
            .iter()
            .map(|q| {
                serde_json::json!({
                    "id": q.id,
                    "quest_type": q.quest_type,
                    "status": q.status.to_string(),
                    "created_at": q.created_at,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{:<38} {:<20} {:<10} {:<24}", "QUEST ID", "TYPE", "STATUS", "CREATED");
    println!("{}", "-".repeat(92));
    for quest in &quests {
        println!("{:<38} {:<20} {:<10} {:<24}", quest.id, quest.quest_type, quest.status, quest.created_at);
    }
    println!("\nTotal: {} quest(s)", quests.len());
    Ok(())
}

async fn cmd_inspect(config: &EngineConfig, quest_id: String) -> Result<()> {
    let store = open_store(config).await?;
    let quest = store.load_quest(&quest_id).await?.with_context(|| format!("quest '{quest_id}' not found"))?;
    let rendered = serde_json::json!({
        "id": quest.id,
        "quest_type": quest.quest_type,
        "status": quest.status.to_string(),
        "input": quest.input,
        "output": quest.output,
        "plan_remaining": quest.plan,
        "history": quest.history,
        "last_worker": quest.last_worker,
        "error": quest.error,
    });
    println!("{}", serde_json::to_string_pretty(&rendered)?);
    Ok(())
}

async fn cmd_stats(config: &EngineConfig) -> Result<()> {
    let store = open_store(config).await?;
    let stats = store.quest_stats().await?;
    println!("Total quests: {}", stats.total);
    for (status, count) in &stats.by_status {
        println!("  {status}: {count}");
    }
    if let Some(avg) = stats.avg_duration_seconds {
        println!("Avg duration: {avg:.3}s");
    }
    if let Some(max) = stats.max_duration_seconds {
        println!("Max duration: {max:.3}s");
    }
    if let Some(min) = stats.min_duration_seconds {
        println!("Min duration: {min:.3}s");
    }
    Ok(())
}

async fn cmd_worker_stats(config: &EngineConfig, worker: Option<String>) -> Result<()> {
    let store = open_store(config).await?;
    let stats = store.worker_stats(worker.as_deref()).await?;
    if stats.is_empty() {
        println!("No worker runs recorded.");
        return Ok(());
    }
    println!("{:<20} {:<20} {:<10} {:<10} {:<12}", "WORKER", "TOOL", "RUNS", "ERRORS", "SUCCESS RATE");
    println!("{}", "-".repeat(80));
    for s in &stats {
        println!(
            "{:<20} {:<20} {:<10} {:<10} {:<12.1}%",
            s.worker_name,
            s.tool_name,
            s.total_runs,
            s.errors,
            s.success_rate * 100.0
        );
    }
    Ok(())
}
