//! Roundtable CLI
//!
//! Runs the bundled scenarios (research collaboration, schedule
//! optimization) or a JSON run config, and prints a scenario's history.

mod report;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

use roundtable_core::agents::{AgentBackend, AgentRole};
use roundtable_core::config::{ConfigOverrides, RunConfig, DEFAULT_CONFIG_PATH};
use roundtable_core::history::db::DEFAULT_HISTORY_PATH;
use roundtable_core::history::{HistoryStore, InMemoryHistoryStore, SqliteHistoryStore};
use roundtable_core::models::{LlmProvider, ModelConfig};
use roundtable_core::moderator::{ApprovalRule, ModeratorConfig};
use roundtable_core::orchestration::{Orchestrator, RunEvent, TaskStatus, TerminalResult};
use roundtable_core::tools::{standard_registry, SimulatedCalendar, ToolParams, ToolRegistry};

#[derive(Parser)]
#[command(author, version, about = "Roundtable - Moderated multi-agent refinement runs")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Args, Clone)]
struct BackendArgs {
    /// Use a live model instead of the scripted agents
    #[arg(long)]
    live: bool,
    /// LLM provider for --live (anthropic, openai, gemini, openrouter, grok, deepseek)
    #[arg(long, requires = "live")]
    provider: Option<String>,
    /// Model name for --live (defaults to the provider's default)
    #[arg(long, requires = "live")]
    model: Option<String>,
    /// Base URL override for OpenAI-compatible endpoints
    #[arg(long, requires = "live")]
    base_url: Option<String>,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Research collaboration: three agents refine an answer until the moderator concludes
    Research {
        /// Topic or question to research
        topic: String,
        /// Maximum number of rounds
        #[arg(short, long, default_value = "3")]
        rounds: u32,
        #[command(flatten)]
        backend: BackendArgs,
        /// History database path
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Schedule optimization: summarize a meeting and book its follow-up
    Schedule {
        /// Meeting to fetch the transcript for
        meeting_id: String,
        #[command(flatten)]
        backend: BackendArgs,
        /// History database path
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Run a JSON run configuration
    Run {
        /// Path to the run config
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
        /// Write the default config to --config first if it does not exist
        #[arg(long)]
        init: bool,
        /// History database path (overrides the config)
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Print a scenario's history in append order
    History {
        scenario: String,
        /// History database path
        #[arg(long)]
        db: Option<PathBuf>,
        /// Only the last N records
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Provider API keys
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roundtable_core=warn,roundtable_cli=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        CliCommand::Research {
            topic,
            rounds,
            backend,
            db,
        } => run_research(topic, rounds, &backend, db).await,
        CliCommand::Schedule {
            meeting_id,
            backend,
            db,
        } => run_schedule(&meeting_id, &backend, db).await,
        CliCommand::Run { config, init, db } => run_config(&config, init, db).await,
        CliCommand::History {
            scenario,
            db,
            limit,
        } => show_history(&scenario, db.as_deref(), limit),
    }
}

fn resolve_backend(args: &BackendArgs) -> Result<AgentBackend> {
    if !args.live {
        return Ok(AgentBackend::Scripted);
    }

    let provider = match &args.provider {
        Some(name) => {
            LlmProvider::parse(name).ok_or_else(|| anyhow!("Unknown provider '{}'", name))?
        }
        None => LlmProvider::default(),
    };
    let mut config = ModelConfig::for_provider(provider);
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if let Some(url) = &args.base_url {
        config = config.with_base_url(url);
    }
    tracing::info!(provider = provider.display_name(), model = %config.model, "Using live backend");
    Ok(AgentBackend::Live(config))
}

fn open_history(db: Option<&Path>) -> Result<Arc<SqliteHistoryStore>> {
    let path = db.unwrap_or_else(|| Path::new(DEFAULT_HISTORY_PATH));
    let store = SqliteHistoryStore::open_at(path)
        .with_context(|| format!("Failed to open history database {}", path.display()))?;
    Ok(Arc::new(store))
}

async fn run_research(
    topic: String,
    rounds: u32,
    backend: &BackendArgs,
    db: Option<PathBuf>,
) -> Result<()> {
    let mut config = RunConfig::default();
    config.merge(ConfigOverrides {
        goal: Some(topic),
        max_rounds: Some(rounds),
        backend: Some(resolve_backend(backend)?),
        history_path: db,
        ..ConfigOverrides::default()
    });
    config.validate()?;

    report::header(&format!("SCENARIO 1: Research Collaboration on '{}'", config.goal));
    let history = open_history(config.history_path.as_deref())?;
    let result = execute(&config, history, ToolRegistry::new(), false).await?;
    finish(result)
}

async fn run_schedule(meeting_id: &str, backend: &BackendArgs, db: Option<PathBuf>) -> Result<()> {
    let calendar = Arc::new(SimulatedCalendar::starting_now());
    let tools = standard_registry(calendar);

    let mut params = ToolParams::new();
    params.insert("meeting_id".to_string(), json!(meeting_id));
    let transcript = tools
        .try_invoke("get_meeting_transcript", &params)
        .await
        .with_context(|| format!("Failed to fetch transcript for {}", meeting_id))?;
    let transcript = transcript.as_str().unwrap_or_default().to_string();

    let config = RunConfig {
        scenario: "schedule".to_string(),
        goal: format!(
            "Analyze the following transcript and summarize it, keeping every decision \
             and open action item.\n\nTranscript:\n{}",
            transcript
        ),
        criteria: Some("The summary names the follow-up action items.".to_string()),
        max_rounds: 1,
        tools: vec![
            "find_calendar_slot".to_string(),
            "book_calendar_event".to_string(),
        ],
        roster: vec![AgentRole::TranscriptSummarizer],
        extractor: Some(AgentRole::ActionItemExtractor),
        backend: resolve_backend(backend)?,
        moderator: ModeratorConfig::Rule {
            rule: ApprovalRule::Always,
        },
        history_path: db,
        ..RunConfig::default()
    };
    config.validate()?;

    report::header("SCENARIO 2: Schedule Optimization");
    println!("Meeting: {}", meeting_id);
    let history = open_history(config.history_path.as_deref())?;
    let result = execute(&config, history, tools, true).await?;
    finish(result)
}

async fn run_config(path: &Path, init: bool, db: Option<PathBuf>) -> Result<()> {
    if init && !path.exists() {
        RunConfig::default().save(path)?;
        println!("Wrote default config to {}", path.display());
    }

    let mut config = RunConfig::load(path)?;
    config.merge(ConfigOverrides {
        history_path: db,
        ..ConfigOverrides::default()
    });

    report::header(&format!("RUN: {}", config.scenario));
    let history: Arc<dyn HistoryStore> = match &config.history_path {
        Some(path) => open_history(Some(path))?,
        None => Arc::new(InMemoryHistoryStore::new()),
    };
    let tools = standard_registry(Arc::new(SimulatedCalendar::starting_now()));
    let with_tools = config.extractor.is_some();
    let result = execute(&config, history, tools, with_tools).await?;
    finish(result)
}

async fn execute(
    config: &RunConfig,
    history: Arc<dyn HistoryStore>,
    tools: ToolRegistry,
    with_tools: bool,
) -> Result<TerminalResult> {
    let (tx, rx) = mpsc::channel::<RunEvent>(64);
    let printer = tokio::spawn(report::print_events(rx));

    let orchestrator = Orchestrator::from_config(config, history, tools).with_event_channel(tx);
    let task = config.task()?;
    let result = if with_tools {
        orchestrator.run_with_tools(task).await
    } else {
        orchestrator.run(task).await
    };

    // Closing the channel lets the printer drain and exit
    drop(orchestrator);
    printer.await.ok();

    Ok(result?)
}

fn finish(result: TerminalResult) -> Result<()> {
    report::terminal(&result);
    if result.status == TaskStatus::Failed {
        anyhow::bail!("Run '{}' failed", result.scenario);
    }
    Ok(())
}

fn show_history(scenario: &str, db: Option<&Path>, limit: Option<usize>) -> Result<()> {
    let store = open_history(db)?;
    let records = match limit {
        Some(limit) => store.latest(scenario, limit)?,
        None => store.query(scenario)?,
    };

    if records.is_empty() {
        println!("No history recorded for '{}'", scenario);
        return Ok(());
    }

    report::header(&format!("HISTORY: {}", scenario));
    for record in &records {
        report::record(record);
    }
    Ok(())
}
